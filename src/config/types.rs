//! Runtime settings for the refresh pipeline, the store and the server.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/countries";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_COUNTRIES_API_URL: &str =
    "https://restcountries.com/v3.1/all?fields=name,capital,region,population,flags,currencies";
pub const DEFAULT_COUNTRIES_FALLBACK_API_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_EXCHANGE_RATE_API_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_SUMMARY_IMAGE_PATH: &str = "cache/summary.svg";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Retry schedule for one upstream call.
///
/// The wait after failed attempt `n` (1-based) is `n * short_step` for `n <= 2`
/// and `n * long_step` afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub short_step: Duration,
    pub long_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            timeout: Duration::from_secs(15),
            short_step: Duration::from_secs(2),
            long_step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` failed, or `None` if it was the last one.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let step = if attempt <= 2 { self.short_step } else { self.long_step };
        Some(step * attempt)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamUrls {
    pub countries: String,
    pub countries_fallback: String,
    pub exchange_rates: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        UpstreamUrls {
            countries: DEFAULT_COUNTRIES_API_URL.into(),
            countries_fallback: DEFAULT_COUNTRIES_FALLBACK_API_URL.into(),
            exchange_rates: DEFAULT_EXCHANGE_RATE_API_URL.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Schema holding `countries` and `refresh_runs`.
    pub schema: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub upstream: UpstreamUrls,
    pub retry: RetryPolicy,
    pub summary_image_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            schema: DEFAULT_SCHEMA.into(),
            db_max_connections: 5,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            upstream: UpstreamUrls::default(),
            retry: RetryPolicy::default(),
            summary_image_path: PathBuf::from(DEFAULT_SUMMARY_IMAGE_PATH),
        }
    }
}
