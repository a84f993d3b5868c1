//! Per-record validation and currency/GDP resolution.

use crate::error::ValidationError;
use crate::fetch::ExchangeRateTable;
use crate::model::{RawCountry, ReconciledCountry};
use rand::distributions::Open01;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

pub const MULTIPLIER_MIN: f64 = 1000.0;
pub const MULTIPLIER_MAX: f64 = 2000.0;

/// Source of the per-record GDP multiplier. Must return values in `(1000, 2000)`.
pub trait GdpMultiplier: Send + Sync {
    fn draw(&self) -> f64;
}

/// Independent uniform draw per record from the thread RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomMultiplier;

impl GdpMultiplier for RandomMultiplier {
    fn draw(&self) -> f64 {
        let unit: f64 = rand::thread_rng().sample(Open01);
        MULTIPLIER_MIN + unit * (MULTIPLIER_MAX - MULTIPLIER_MIN)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub country: ReconciledCountry,
    /// Set when a currency code had no usable rate.
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct Reconciler {
    multiplier: Arc<dyn GdpMultiplier>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Reconciler::new(Arc::new(RandomMultiplier))
    }
}

impl Reconciler {
    pub fn new(multiplier: Arc<dyn GdpMultiplier>) -> Self {
        Reconciler { multiplier }
    }

    pub fn reconcile(&self, raw: &RawCountry, rates: &ExchangeRateTable) -> Result<Reconciled, ValidationError> {
        let (name, population) = validate(raw)?;
        let mut warning = None;

        let (currency_code, exchange_rate, estimated_gdp) = match raw.primary_currency() {
            None => (None, None, Some(0.0)),
            Some(code) => match rates.get(code).copied().filter(|r| *r > 0.0) {
                Some(rate) => {
                    let gdp = population as f64 * self.multiplier.draw() / rate;
                    (Some(code.to_string()), Some(rate), Some(gdp))
                }
                None => {
                    tracing::warn!(country = %name, currency = %code, "no exchange rate for currency");
                    warning = Some(format!("{}: no exchange rate for currency {}", name, code));
                    (Some(code.to_string()), None, None)
                }
            },
        };

        Ok(Reconciled {
            country: ReconciledCountry {
                name,
                capital: non_blank(raw.capital.as_deref()),
                region: non_blank(raw.region.as_deref()),
                population,
                currency_code,
                exchange_rate,
                estimated_gdp,
                flag_url: non_blank(raw.flag_url.as_deref()),
            },
            warning,
        })
    }
}

/// Required fields: non-blank name, non-negative integral population.
pub fn validate(raw: &RawCountry) -> Result<(String, i64), ValidationError> {
    let mut fields = Vec::new();
    let name = raw.name.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() {
        fields.push("name".to_string());
    }
    let population = raw.population.as_ref().and_then(population_value);
    if population.is_none() {
        fields.push("population".to_string());
    }
    match population {
        Some(p) if fields.is_empty() => Ok((name.to_string(), p)),
        _ => Err(ValidationError { fields }),
    }
}

fn population_value(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return (n >= 0).then_some(n);
    }
    let f = v.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64).then_some(f as i64)
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
