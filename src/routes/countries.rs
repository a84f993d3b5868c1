//! Country routes. `/countries/image` and `/countries/refresh` are static segments and win over `/countries/:name`.

use crate::handlers::countries::{delete as delete_handler, list, read, refresh, status, summary_image};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn country_routes(state: AppState) -> Router {
    Router::new()
        .route("/countries", get(list))
        .route("/countries/refresh", post(refresh))
        .route("/countries/image", get(summary_image))
        .route("/countries/:name", get(read).delete(delete_handler))
        .route("/status", get(status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SummaryArtifactGenerator;
    use crate::fetch::{CountryDirectorySource, ExchangeRateSource, RetryingFetcher};
    use crate::model::{ReconciledCountry, RunStatus};
    use crate::reconcile::Reconciler;
    use crate::service::{CountryService, RefreshOrchestrator};
    use crate::store::CountryRepository;
    use crate::test_support::{fast_policy, serve, MemoryCountryStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Json;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<MemoryCountryStore>, tempfile::TempDir) {
        let upstream = serve(Router::new().route("/*rest", get(|| async { StatusCode::BAD_GATEWAY }))).await;
        let store = Arc::new(MemoryCountryStore::default());
        store
            .upsert_batch(
                &[ReconciledCountry {
                    name: "Ruritania".into(),
                    capital: Some("Strelsau".into()),
                    region: Some("Europe".into()),
                    population: 1_000_000,
                    currency_code: Some("XYZ".into()),
                    exchange_rate: Some(100.0),
                    estimated_gdp: Some(15_000_000.0),
                    flag_url: None,
                }],
                Utc::now(),
            )
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&upstream, store.clone(), &dir);
        (country_routes(state), store, dir)
    }

    fn state_for(upstream: &str, store: Arc<MemoryCountryStore>, dir: &tempfile::TempDir) -> AppState {
        let artifact = Arc::new(SummaryArtifactGenerator::new(store.clone(), dir.path().join("summary.svg")));
        let fetcher = RetryingFetcher::new(fast_policy(1)).unwrap();
        let refresher = RefreshOrchestrator::new(
            CountryDirectorySource::new(fetcher.clone(), format!("{}/v3", upstream), format!("{}/v2", upstream)),
            ExchangeRateSource::new(fetcher, format!("{}/rates", upstream)),
            Reconciler::default(),
            store.clone(),
            artifact.clone(),
        );
        AppState {
            countries: Arc::new(CountryService::new(store, artifact)),
            refresher: Arc::new(refresher),
        }
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn get_is_case_insensitive() {
        let (app, _, _dir) = app().await;
        let (status, body) = send(app, "GET", "/countries/ruritania").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ruritania");
        assert_eq!(body["data"]["estimated_gdp"], 15_000_000.0);
    }

    #[tokio::test]
    async fn delete_then_not_found() {
        let (app, store, _dir) = app().await;
        let (status, _) = send(app.clone(), "DELETE", "/countries/RURITANIA").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(store.countries().is_empty());
        let (status, body) = send(app, "DELETE", "/countries/ruritania").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn list_rejects_unknown_sort() {
        let (app, _, _dir) = app().await;
        let (status, body) = send(app.clone(), "GET", "/countries?sort=capital_asc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        let (status, body) = send(app, "GET", "/countries?region=europe&sort=gdp_desc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["count"], 1);
    }

    #[tokio::test]
    async fn status_before_refresh() {
        let (app, _, _dir) = app().await;
        let (status, body) = send(app, "GET", "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "never_refreshed");
        assert!(body["data"]["last_refreshed_at"].is_null());
    }

    #[tokio::test]
    async fn image_is_not_found_until_generated() {
        let (app, _, _dir) = app().await;
        let (status, _) = send(app, "GET", "/countries/image").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_with_upstream_down_is_service_unavailable() {
        let (app, store, _dir) = app().await;
        let (status, body) = send(app, "POST", "/countries/refresh").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["details"]["source"], "country directory");
        assert_eq!(store.countries().len(), 1);
        assert_eq!(store.runs().len(), 1);
    }

    #[tokio::test]
    async fn refresh_survives_caller_going_away() {
        let upstream = serve(
            Router::new()
                .route(
                    "/v3",
                    get(|| async {
                        tokio::time::sleep(Duration::from_millis(400)).await;
                        Json(json!([{"name": {"common": "Ruritania"}, "population": 1000000, "currencies": {"XYZ": {}}}]))
                    }),
                )
                .route("/rates", get(|| async { Json(json!({"rates": {"XYZ": 100}})) })),
        )
        .await;
        let store = Arc::new(MemoryCountryStore::default());
        let dir = tempfile::tempdir().unwrap();
        let base = serve(country_routes(state_for(&upstream, store.clone(), &dir))).await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let result = client.post(format!("{}/countries/refresh", base)).send().await;
        assert!(result.is_err());

        for _ in 0..75 {
            if !store.runs().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(store.countries().len(), 1);
    }
}
