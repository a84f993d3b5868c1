//! Exchange-rate source: one upstream, structural validation, no schema fallback.

use crate::error::FetchError;
use crate::fetch::fetcher::{host_of, RetryingFetcher};
use serde_json::Value;
use std::collections::HashMap;

pub const SOURCE_NAME: &str = "exchange rates";

/// Currency code to units of that currency per one reference unit. Lives for one run.
pub type ExchangeRateTable = HashMap<String, f64>;

pub struct ExchangeRateSource {
    fetcher: RetryingFetcher,
    url: String,
}

impl ExchangeRateSource {
    pub fn new(fetcher: RetryingFetcher, url: impl Into<String>) -> Self {
        ExchangeRateSource { fetcher, url: url.into() }
    }

    pub async fn fetch_rates(&self) -> Result<ExchangeRateTable, FetchError> {
        let body = self.fetcher.fetch(SOURCE_NAME, &self.url).await?;
        let rates = parse_rates(&body).map_err(|reason| FetchError::SourceUnavailable {
            source_name: SOURCE_NAME,
            host: host_of(&self.url),
            reason,
        })?;
        tracing::debug!(count = rates.len(), "exchange rates fetched");
        Ok(rates)
    }
}

/// Accepts either `{"rates": {...}}` (with an optional `"result"` marker) or a bare code map.
///
/// Every value must be numeric. Non-positive rates are dropped; an empty table is invalid.
pub fn parse_rates(body: &str) -> Result<ExchangeRateTable, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid json: {}", e))?;
    let Value::Object(mut top) = value else {
        return Err("rates response is not an object".into());
    };
    if let Some(result) = top.get("result").and_then(Value::as_str) {
        if result != "success" {
            return Err(format!("upstream result: {}", result));
        }
    }
    let map = match top.remove("rates") {
        Some(Value::Object(rates)) => rates,
        Some(_) => return Err("rates field is not an object".into()),
        None => top,
    };

    let mut table = ExchangeRateTable::with_capacity(map.len());
    for (code, raw) in map {
        let rate = raw
            .as_f64()
            .ok_or_else(|| format!("rate for {} is not numeric", code))?;
        if rate > 0.0 && rate.is_finite() {
            table.insert(code.trim().to_ascii_uppercase(), rate);
        } else {
            tracing::warn!(%code, rate, "dropping non-positive exchange rate");
        }
    }
    if table.is_empty() {
        return Err("empty rate table".into());
    }
    Ok(table)
}
