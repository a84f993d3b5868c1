//! Settings validation: upstream URLs, retry bounds and SQL identifiers.

use crate::config::Settings;
use crate::error::ConfigError;
use regex::Regex;

pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    for (key, value) in [
        ("COUNTRIES_API_URL", &settings.upstream.countries),
        ("COUNTRIES_FALLBACK_API_URL", &settings.upstream.countries_fallback),
        ("EXCHANGE_RATE_API_URL", &settings.upstream.exchange_rates),
    ] {
        validate_http_url(key, value)?;
    }
    if settings.retry.max_attempts == 0 {
        return Err(ConfigError::Validation("FETCH_MAX_ATTEMPTS must be at least 1".into()));
    }
    if settings.retry.timeout.is_zero() {
        return Err(ConfigError::Validation("FETCH_TIMEOUT_SECS must be positive".into()));
    }
    if settings.db_max_connections == 0 {
        return Err(ConfigError::Validation("DB_MAX_CONNECTIONS must be at least 1".into()));
    }
    if !is_plain_identifier(&settings.schema) {
        return Err(ConfigError::InvalidValue {
            key: "COUNTRIES_SCHEMA",
            value: settings.schema.clone(),
        });
    }
    Ok(())
}

fn validate_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            key,
            value: value.to_string(),
        }),
    }
}

/// Lowercase PostgreSQL identifier safe to interpolate unquoted.
pub fn is_plain_identifier(s: &str) -> bool {
    Regex::new(r"^[a-z_][a-z0-9_]{0,62}$")
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}
