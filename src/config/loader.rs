//! Load settings from the process environment (call `dotenvy::dotenv()` first if a `.env` is used).

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Read settings from `std::env`, falling back to defaults for unset keys.
pub fn load_from_env() -> Result<Settings, ConfigError> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    load_from_map(&vars)
}

/// Same as [`load_from_env`] over an explicit key/value map.
pub fn load_from_map(vars: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    let defaults = Settings::default();
    let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let retry = RetryPolicy {
        max_attempts: parse_or(get("FETCH_MAX_ATTEMPTS"), "FETCH_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
        timeout: Duration::from_secs(parse_or(
            get("FETCH_TIMEOUT_SECS"),
            "FETCH_TIMEOUT_SECS",
            defaults.retry.timeout.as_secs(),
        )?),
        ..defaults.retry
    };

    let settings = Settings {
        database_url: get("DATABASE_URL").map(str::to_string).unwrap_or(defaults.database_url),
        schema: get("COUNTRIES_SCHEMA").map(str::to_string).unwrap_or(defaults.schema),
        db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
        bind_addr: get("BIND_ADDR").map(str::to_string).unwrap_or(defaults.bind_addr),
        upstream: UpstreamUrls {
            countries: get("COUNTRIES_API_URL")
                .map(str::to_string)
                .unwrap_or(defaults.upstream.countries),
            countries_fallback: get("COUNTRIES_FALLBACK_API_URL")
                .map(str::to_string)
                .unwrap_or(defaults.upstream.countries_fallback),
            exchange_rates: get("EXCHANGE_RATE_API_URL")
                .map(str::to_string)
                .unwrap_or(defaults.upstream.exchange_rates),
        },
        retry,
        summary_image_path: get("SUMMARY_IMAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.summary_image_path),
    };
    validate(&settings)?;
    Ok(settings)
}

fn parse_or<T: FromStr>(raw: Option<&str>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: v.to_string(),
        }),
    }
}
