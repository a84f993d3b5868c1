//! Builds the parameterized statements for the countries and refresh_runs tables.
//! Identifiers come from validated settings only; every value is a bind parameter.

use crate::sql::CountryFilter;

pub const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, exchange_rate, \
     estimated_gdp, flag_url, last_refreshed_at, created_at, updated_at";

pub const RUN_COLUMNS: &str =
    "id, processed_count, rejected_count, started_at, duration_seconds, status, created_at";

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<String>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: String) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }
}

/// Schema-qualified table name; `schema` must already be a validated identifier.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

/// Escape LIKE wildcards so user search text matches literally.
fn like_pattern(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// SELECT with conjunctive filters, fixed sort, LIMIT/OFFSET only when a limit was requested.
pub fn select_list(schema: &str, filter: &CountryFilter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, "countries");
    let mut where_parts = Vec::new();

    if let Some(region) = &filter.region {
        let n = q.push_param(region.clone());
        where_parts.push(format!("lower(region) = lower(${})", n));
    }
    if let Some(currency) = &filter.currency {
        let n = q.push_param(currency.clone());
        where_parts.push(format!("upper(currency_code) = upper(${})", n));
    }
    if let Some(search) = &filter.search {
        let n = q.push_param(like_pattern(search));
        where_parts.push(format!("(name ILIKE ${0} OR capital ILIKE ${0})", n));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let page_clause = filter
        .page()
        .map(|(limit, offset)| format!(" LIMIT {} OFFSET {}", limit, offset))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}",
        COUNTRY_COLUMNS,
        table,
        where_clause,
        filter.sort.order_by(),
        page_clause
    );
    q
}

/// Binds: $1 name.
pub fn select_by_name(schema: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE lower(name) = lower($1)",
        COUNTRY_COLUMNS,
        qualified_table(schema, "countries")
    )
}

/// Binds: $1 name.
pub fn delete_by_name(schema: &str) -> String {
    format!(
        "DELETE FROM {} WHERE lower(name) = lower($1) RETURNING {}",
        qualified_table(schema, "countries"),
        COUNTRY_COLUMNS
    )
}

/// Binds: $1 limit. Null estimates are excluded.
pub fn select_top_by_gdp(schema: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE estimated_gdp IS NOT NULL ORDER BY estimated_gdp DESC, id ASC LIMIT $1",
        COUNTRY_COLUMNS,
        qualified_table(schema, "countries")
    )
}

pub fn count_countries(schema: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified_table(schema, "countries"))
}

/// Insert-or-update keyed by lower(name); created_at is never touched on conflict.
/// Binds: $1 name, $2 capital, $3 region, $4 population, $5 currency_code,
/// $6 exchange_rate, $7 estimated_gdp, $8 flag_url, $9 refreshed_at.
pub fn upsert_country(schema: &str) -> String {
    format!(
        r#"INSERT INTO {} (name, capital, region, population, currency_code, exchange_rate, estimated_gdp, flag_url, last_refreshed_at, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $9)
ON CONFLICT ((lower(name))) DO UPDATE SET
    name = EXCLUDED.name,
    capital = EXCLUDED.capital,
    region = EXCLUDED.region,
    population = EXCLUDED.population,
    currency_code = EXCLUDED.currency_code,
    exchange_rate = EXCLUDED.exchange_rate,
    estimated_gdp = EXCLUDED.estimated_gdp,
    flag_url = EXCLUDED.flag_url,
    last_refreshed_at = EXCLUDED.last_refreshed_at,
    updated_at = EXCLUDED.updated_at"#,
        qualified_table(schema, "countries")
    )
}

/// Binds: $1 processed_count, $2 rejected_count, $3 started_at, $4 duration_seconds, $5 status.
pub fn insert_run(schema: &str) -> String {
    format!(
        "INSERT INTO {} (processed_count, rejected_count, started_at, duration_seconds, status) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        qualified_table(schema, "refresh_runs"),
        RUN_COLUMNS
    )
}

pub fn select_latest_run(schema: &str) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY created_at DESC, id DESC LIMIT 1",
        RUN_COLUMNS,
        qualified_table(schema, "refresh_runs")
    )
}
