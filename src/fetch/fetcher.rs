//! HTTP GET with bounded retries and a coarse linear backoff.

use crate::config::RetryPolicy;
use crate::error::{AppError, FetchError};
use reqwest::Client;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fetches a URL body, retrying every kind of failure until `max_attempts` is spent.
///
/// Each attempt has its own timeout. The only error produced is
/// [`FetchError::SourceUnavailable`]; callers decide how to log and interpret it.
#[derive(Clone, Debug)]
pub struct RetryingFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {}", e)))?;
        Ok(Self::with_client(client, policy))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        RetryingFetcher { client, policy }
    }

    /// GET `url` and return the response body of the first 2xx attempt.
    pub async fn fetch(&self, source_name: &'static str, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(reason) => match self.policy.delay_after(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            source = source_name,
                            attempt,
                            max_attempts = self.policy.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            %reason,
                            "upstream request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(FetchError::SourceUnavailable {
                            source_name,
                            host: host_of(url),
                            reason: format!("{} (after {} attempts)", reason, attempt),
                        })
                    }
                },
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.policy.timeout)
            .send()
            .await
            .map_err(|e| self.describe(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response.text().await.map_err(|e| self.describe(e))
    }

    fn describe(&self, e: reqwest::Error) -> String {
        if e.is_timeout() {
            format!("timed out after {}s", self.policy.timeout.as_secs_f64())
        } else {
            e.to_string()
        }
    }
}

/// Host part of `url` for diagnostics; the raw string when it does not parse.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_policy, serve};
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn host_of_extracts_host() {
        assert_eq!(host_of("https://restcountries.com/v3.1/all"), "restcountries.com");
        assert_eq!(host_of("not a url"), "not a url");
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/flaky",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::BAD_GATEWAY, "down".to_string())
                    } else {
                        (StatusCode::OK, "ok".to_string())
                    }
                }
            }),
        );
        let base = serve(app).await;
        let fetcher = RetryingFetcher::new(fast_policy(3)).unwrap();
        let body = fetcher.fetch("test", &format!("{}/flaky", base)).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_reports_host() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/down",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let base = serve(app).await;
        let fetcher = RetryingFetcher::new(fast_policy(2)).unwrap();
        let err = fetcher.fetch("test", &format!("{}/down", base)).await.unwrap_err();
        assert_eq!(err.host(), "127.0.0.1");
        assert_eq!(err.source_name(), "test");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn each_attempt_times_out_independently() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let mut policy = fast_policy(2);
        policy.timeout = Duration::from_millis(50);
        let fetcher = RetryingFetcher::new(policy).unwrap();
        let err = fetcher.fetch("test", &format!("{}/slow", base)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
