//! Typed list filter and the fixed set of sort keys.

use crate::error::AppError;
use std::collections::HashMap;

pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    NameAsc,
    NameDesc,
    PopulationAsc,
    PopulationDesc,
    GdpAsc,
    GdpDesc,
    RegionAsc,
    RegionDesc,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "name_asc" => SortKey::NameAsc,
            "name_desc" => SortKey::NameDesc,
            "population_asc" => SortKey::PopulationAsc,
            "population_desc" => SortKey::PopulationDesc,
            "gdp_asc" => SortKey::GdpAsc,
            "gdp_desc" => SortKey::GdpDesc,
            "region_asc" => SortKey::RegionAsc,
            "region_desc" => SortKey::RegionDesc,
            _ => return None,
        })
    }

    /// ORDER BY clause body. Null estimates and regions always sort last; id keeps ties stable.
    pub fn order_by(&self) -> &'static str {
        match self {
            SortKey::NameAsc => "lower(name) ASC, id ASC",
            SortKey::NameDesc => "lower(name) DESC, id ASC",
            SortKey::PopulationAsc => "population ASC, id ASC",
            SortKey::PopulationDesc => "population DESC, id ASC",
            SortKey::GdpAsc => "estimated_gdp ASC NULLS LAST, id ASC",
            SortKey::GdpDesc => "estimated_gdp DESC NULLS LAST, id ASC",
            SortKey::RegionAsc => "region ASC NULLS LAST, lower(name) ASC, id ASC",
            SortKey::RegionDesc => "region DESC NULLS LAST, lower(name) ASC, id ASC",
        }
    }
}

/// Conjunctive filter for listing countries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountryFilter {
    /// Case-insensitive exact region.
    pub region: Option<String>,
    /// Case-insensitive exact currency code.
    pub currency: Option<String>,
    /// Case-insensitive substring of name or capital.
    pub search: Option<String>,
    pub sort: SortKey,
    pub limit: Option<u32>,
    /// Ignored unless `limit` is set.
    pub offset: Option<u32>,
}

impl CountryFilter {
    /// Build from query-string pairs. Unknown keys are ignored; malformed known keys are a bad request.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let text = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |key: &str| -> Result<Option<u32>, AppError> {
            match text(key) {
                None => Ok(None),
                Some(v) => v
                    .parse()
                    .map(Some)
                    .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
            }
        };
        let sort = match text("sort") {
            None => SortKey::default(),
            Some(s) => SortKey::parse(&s).ok_or_else(|| AppError::BadRequest(format!("unknown sort key: {}", s)))?,
        };
        Ok(CountryFilter {
            region: text("region"),
            currency: text("currency"),
            search: text("search"),
            sort,
            limit: number("limit")?,
            offset: number("offset")?,
        })
    }

    /// (limit, offset) to apply, capped; `None` when no limit was requested.
    pub fn page(&self) -> Option<(u32, u32)> {
        self.limit.map(|l| (l.min(MAX_LIMIT), self.offset.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_known_keys() {
        let f = CountryFilter::from_query(&query(&[
            ("region", "Africa"),
            ("currency", "ngn"),
            ("sort", "gdp_desc"),
            ("limit", "10"),
            ("offset", "20"),
            ("other", "x"),
        ]))
        .unwrap();
        assert_eq!(f.region.as_deref(), Some("Africa"));
        assert_eq!(f.currency.as_deref(), Some("ngn"));
        assert_eq!(f.sort, SortKey::GdpDesc);
        assert_eq!(f.page(), Some((10, 20)));
    }

    #[test]
    fn offset_without_limit_is_not_paginated() {
        let f = CountryFilter::from_query(&query(&[("offset", "5")])).unwrap();
        assert_eq!(f.page(), None);
    }

    #[test]
    fn limit_is_capped() {
        let f = CountryFilter::from_query(&query(&[("limit", "50000")])).unwrap();
        assert_eq!(f.page(), Some((MAX_LIMIT, 0)));
    }

    #[test]
    fn rejects_bad_sort_and_numbers() {
        assert!(matches!(
            CountryFilter::from_query(&query(&[("sort", "capital_asc")])),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            CountryFilter::from_query(&query(&[("limit", "-1")])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn blank_values_are_absent() {
        let f = CountryFilter::from_query(&query(&[("region", "  "), ("sort", "")])).unwrap();
        assert_eq!(f, CountryFilter::default());
    }
}
