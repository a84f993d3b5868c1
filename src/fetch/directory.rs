//! Country directory source: primary v3 schema with a single fallback to the legacy v2 schema.

use crate::error::FetchError;
use crate::fetch::fetcher::{host_of, RetryingFetcher};
use crate::model::{CurrencyInfo, RawCountry};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const SOURCE_NAME: &str = "country directory";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryVersion {
    V3,
    V2,
}

#[derive(Debug, Default, Deserialize)]
pub struct V3Name {
    #[serde(default)]
    pub common: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Flags {
    #[serde(default)]
    pub png: Option<String>,
    #[serde(default)]
    pub svg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawCountryV3 {
    #[serde(default)]
    pub name: Option<V3Name>,
    #[serde(default)]
    pub capital: Option<Vec<String>>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<serde_json::Value>,
    #[serde(default)]
    pub flags: Option<Flags>,
    #[serde(default)]
    pub currencies: Option<BTreeMap<String, CurrencyInfo>>,
}

#[derive(Debug, Deserialize)]
pub struct V2Currency {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawCountryV2 {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<serde_json::Value>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub flags: Option<Flags>,
    #[serde(default)]
    pub currencies: Option<Vec<V2Currency>>,
}

/// One directory response, tagged by the schema version it was parsed as.
#[derive(Debug)]
pub enum DirectoryPayload {
    V3(Vec<RawCountryV3>),
    V2(Vec<RawCountryV2>),
}

impl DirectoryPayload {
    /// Parse `body` strictly as `version`. Empty lists are a schema mismatch too.
    pub fn parse(version: DirectoryVersion, body: &str) -> Result<Self, String> {
        let payload = match version {
            DirectoryVersion::V3 => DirectoryPayload::V3(serde_json::from_str(body).map_err(|e| e.to_string())?),
            DirectoryVersion::V2 => DirectoryPayload::V2(serde_json::from_str(body).map_err(|e| e.to_string())?),
        };
        if payload.is_empty() {
            return Err("empty country list".into());
        }
        Ok(payload)
    }

    pub fn len(&self) -> usize {
        match self {
            DirectoryPayload::V3(v) => v.len(),
            DirectoryPayload::V2(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_raw(self) -> Vec<RawCountry> {
        match self {
            DirectoryPayload::V3(v) => v.into_iter().map(from_v3).collect(),
            DirectoryPayload::V2(v) => v.into_iter().map(from_v2).collect(),
        }
    }
}

pub fn from_v3(c: RawCountryV3) -> RawCountry {
    let mut currencies = BTreeMap::new();
    for (code, info) in c.currencies.unwrap_or_default() {
        insert_currency(&mut currencies, &code, info);
    }
    RawCountry {
        name: c.name.and_then(|n| n.common),
        capital: c.capital.and_then(|caps| caps.into_iter().next()),
        region: c.region,
        population: c.population,
        flag_url: c.flags.and_then(best_flag),
        currencies,
    }
}

pub fn from_v2(c: RawCountryV2) -> RawCountry {
    let mut currencies = BTreeMap::new();
    for cur in c.currencies.unwrap_or_default() {
        if let Some(code) = cur.code.as_deref() {
            let info = CurrencyInfo {
                name: cur.name.clone(),
                symbol: cur.symbol.clone(),
            };
            insert_currency(&mut currencies, code, info);
        }
    }
    RawCountry {
        name: c.name,
        capital: c.capital.filter(|s| !s.trim().is_empty()),
        region: c.region,
        population: c.population,
        flag_url: c.flags.and_then(best_flag).or(c.flag),
        currencies,
    }
}

fn best_flag(flags: Flags) -> Option<String> {
    flags.png.or(flags.svg)
}

/// Keep only ISO-4217 shaped codes; legacy entries such as "(none)" are dropped.
fn insert_currency(map: &mut BTreeMap<String, CurrencyInfo>, code: &str, info: CurrencyInfo) {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        map.entry(code).or_insert(info);
    }
}

pub struct CountryDirectorySource {
    fetcher: RetryingFetcher,
    primary_url: String,
    fallback_url: String,
}

impl CountryDirectorySource {
    pub fn new(fetcher: RetryingFetcher, primary_url: impl Into<String>, fallback_url: impl Into<String>) -> Self {
        CountryDirectorySource {
            fetcher,
            primary_url: primary_url.into(),
            fallback_url: fallback_url.into(),
        }
    }

    /// Whole directory, normalized. Never returns a partial or empty list.
    pub async fn fetch_all(&self) -> Result<Vec<RawCountry>, FetchError> {
        let primary = match self.fetch_version(DirectoryVersion::V3, &self.primary_url).await {
            Ok(countries) => return Ok(countries),
            Err(e) => e,
        };
        tracing::warn!(error = %primary, fallback = %self.fallback_url, "primary country directory failed, trying legacy schema");
        self.fetch_version(DirectoryVersion::V2, &self.fallback_url)
            .await
            .map_err(|fallback| match fallback {
                FetchError::SourceUnavailable { source_name, host, reason } => FetchError::SourceUnavailable {
                    source_name,
                    host,
                    reason: format!("{}; primary: {}", reason, primary),
                },
            })
    }

    async fn fetch_version(&self, version: DirectoryVersion, url: &str) -> Result<Vec<RawCountry>, FetchError> {
        let body = self.fetcher.fetch(SOURCE_NAME, url).await?;
        let payload = DirectoryPayload::parse(version, &body).map_err(|reason| FetchError::SourceUnavailable {
            source_name: SOURCE_NAME,
            host: host_of(url),
            reason: format!("{:?} schema mismatch: {}", version, reason),
        })?;
        tracing::debug!(?version, count = payload.len(), "country directory fetched");
        Ok(payload.into_raw())
    }
}
