//! Domain records shared by the fetchers, the reconciler, the store and the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Persisted country row.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Directory entry normalized from either upstream schema version.
///
/// Fields stay loose here; the reconciler decides what is acceptable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCountry {
    pub name: Option<String>,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: Option<serde_json::Value>,
    pub flag_url: Option<String>,
    /// Ordered by code, so the primary currency is the lexicographically smallest code.
    pub currencies: BTreeMap<String, CurrencyInfo>,
}

impl RawCountry {
    pub fn primary_currency(&self) -> Option<&str> {
        self.currencies.keys().next().map(String::as_str)
    }
}

/// Validated record ready for upsert.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciledCountry {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed-directory-unavailable")]
    FailedDirectoryUnavailable,
    #[serde(rename = "failed-rates-unavailable")]
    FailedRatesUnavailable,
    #[serde(rename = "failed-validation")]
    FailedValidation,
    #[serde(rename = "failed-persistence")]
    FailedPersistence,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::FailedDirectoryUnavailable => "failed-directory-unavailable",
            RunStatus::FailedRatesUnavailable => "failed-rates-unavailable",
            RunStatus::FailedValidation => "failed-validation",
            RunStatus::FailedPersistence => "failed-persistence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "completed" => RunStatus::Completed,
            "failed-directory-unavailable" => RunStatus::FailedDirectoryUnavailable,
            "failed-rates-unavailable" => RunStatus::FailedRatesUnavailable,
            "failed-validation" => RunStatus::FailedValidation,
            "failed-persistence" => RunStatus::FailedPersistence,
            _ => return None,
        })
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run metadata to append; `created_at` is assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRefreshRun {
    pub processed_count: i64,
    pub rejected_count: i64,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub status: RunStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefreshRun {
    pub id: i64,
    pub processed_count: i64,
    pub rejected_count: i64,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}
