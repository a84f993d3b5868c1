//! Country and refresh-run persistence. Tables live in the schema named by `COUNTRIES_SCHEMA` (default `public`).

use crate::error::AppError;
use crate::model::{Country, NewRefreshRun, ReconciledCountry, RefreshRun, RunStatus};
use crate::sql::{self, CountryFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Storage seam used by the refresh pipeline and the read accessors.
#[async_trait]
pub trait CountryRepository: Send + Sync {
    /// Upsert every record in one transaction; any failure rolls back the whole batch.
    async fn upsert_batch(&self, records: &[ReconciledCountry], refreshed_at: DateTime<Utc>) -> Result<u64, AppError>;
    /// Append a run row, committed on its own.
    async fn record_run(&self, run: &NewRefreshRun) -> Result<RefreshRun, AppError>;
    async fn latest_run(&self) -> Result<Option<RefreshRun>, AppError>;
    async fn top_by_estimate(&self, n: u32) -> Result<Vec<Country>, AppError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Country>, AppError>;
    async fn delete_by_name(&self, name: &str) -> Result<Option<Country>, AppError>;
    async fn list(&self, filter: &CountryFilter) -> Result<Vec<Country>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: i64,
    processed_count: i64,
    rejected_count: i64,
    started_at: DateTime<Utc>,
    duration_seconds: f64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RunRow> for RefreshRun {
    type Error = AppError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status = RunStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown run status in store: {}", row.status)))?;
        Ok(RefreshRun {
            id: row.id,
            processed_count: row.processed_count,
            rejected_count: row.rejected_count,
            started_at: row.started_at,
            duration_seconds: row.duration_seconds,
            status,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed repository over an injected pool.
#[derive(Clone)]
pub struct PgCountryStore {
    pool: PgPool,
    schema: String,
}

impl PgCountryStore {
    /// `schema` must be a validated plain identifier (see `config::is_plain_identifier`).
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgCountryStore {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl CountryRepository for PgCountryStore {
    async fn upsert_batch(&self, records: &[ReconciledCountry], refreshed_at: DateTime<Utc>) -> Result<u64, AppError> {
        let sql = sql::upsert_country(&self.schema);
        let mut tx = self.pool.begin().await?;
        for c in records {
            sqlx::query(&sql)
                .bind(&c.name)
                .bind(&c.capital)
                .bind(&c.region)
                .bind(c.population)
                .bind(&c.currency_code)
                .bind(c.exchange_rate)
                .bind(c.estimated_gdp)
                .bind(&c.flag_url)
                .bind(refreshed_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::debug!(count = records.len(), "country batch committed");
        Ok(records.len() as u64)
    }

    async fn record_run(&self, run: &NewRefreshRun) -> Result<RefreshRun, AppError> {
        let row: RunRow = sqlx::query_as(&sql::insert_run(&self.schema))
            .bind(run.processed_count)
            .bind(run.rejected_count)
            .bind(run.started_at)
            .bind(run.duration_seconds)
            .bind(run.status.as_str())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn latest_run(&self) -> Result<Option<RefreshRun>, AppError> {
        let row: Option<RunRow> = sqlx::query_as(&sql::select_latest_run(&self.schema))
            .fetch_optional(&self.pool)
            .await?;
        row.map(RefreshRun::try_from).transpose()
    }

    async fn top_by_estimate(&self, n: u32) -> Result<Vec<Country>, AppError> {
        let rows = sqlx::query_as::<_, Country>(&sql::select_top_by_gdp(&self.schema))
            .bind(i64::from(n))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Country>, AppError> {
        let row = sqlx::query_as::<_, Country>(&sql::select_by_name(&self.schema))
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_by_name(&self, name: &str) -> Result<Option<Country>, AppError> {
        let row = sqlx::query_as::<_, Country>(&sql::delete_by_name(&self.schema))
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list(&self, filter: &CountryFilter) -> Result<Vec<Country>, AppError> {
        let q = sql::select_list(&self.schema, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_as::<_, Country>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let (n,): (i64,) = sqlx::query_as(&sql::count_countries(&self.schema))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Create `schema`, `countries` (unique on lower(name)) and `refresh_runs` if missing.
pub async fn ensure_country_tables(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;

    let countries = sql::qualified_table(schema, "countries");
    let countries_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            capital TEXT,
            region TEXT,
            population BIGINT NOT NULL CHECK (population >= 0),
            currency_code TEXT,
            exchange_rate DOUBLE PRECISION CHECK (exchange_rate > 0),
            estimated_gdp DOUBLE PRECISION,
            flag_url TEXT,
            last_refreshed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        countries
    );
    sqlx::query(&countries_ddl).execute(pool).await?;
    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS countries_name_lower_key ON {} (lower(name))",
        countries
    ))
    .execute(pool)
    .await?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS countries_estimated_gdp_idx ON {} (estimated_gdp DESC)",
        countries
    ))
    .execute(pool)
    .await?;

    let runs_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            processed_count BIGINT NOT NULL CHECK (processed_count >= 0),
            rejected_count BIGINT NOT NULL DEFAULT 0,
            started_at TIMESTAMPTZ NOT NULL,
            duration_seconds DOUBLE PRECISION NOT NULL,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
        )
        "#,
        sql::qualified_table(schema, "refresh_runs")
    );
    sqlx::query(&runs_ddl).execute(pool).await?;
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Split `database_url` into an admin URL on the `postgres` database and the target
/// database name. The name is empty when the URL has no path after the authority.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let authority_start = url
        .find("://")
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: missing scheme".into()))?
        + 3;
    let rest = url.get(authority_start..).unwrap_or("");
    let Some(slash) = rest.find('/').map(|i| authority_start + i) else {
        return Ok((url.to_string(), String::new()));
    };
    let path_and_query = url.get(slash + 1..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..=slash).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
