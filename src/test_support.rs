//! Test helpers: local upstream servers, a fast retry policy, a fixed multiplier and an in-memory store.

use crate::config::RetryPolicy;
use crate::error::AppError;
use crate::model::{Country, NewRefreshRun, ReconciledCountry, RefreshRun};
use crate::reconcile::GdpMultiplier;
use crate::sql::{CountryFilter, SortKey};
use crate::store::CountryRepository;
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral local port; returns the base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        timeout: Duration::from_secs(2),
        short_step: Duration::from_millis(5),
        long_step: Duration::from_millis(10),
    }
}

pub struct FixedMultiplier(pub f64);

impl GdpMultiplier for FixedMultiplier {
    fn draw(&self) -> f64 {
        self.0
    }
}

#[derive(Default)]
struct Inner {
    countries: Vec<Country>,
    runs: Vec<RefreshRun>,
    next_id: i64,
    next_run_id: i64,
    fail_upserts: bool,
    fail_runs: bool,
    fail_top: bool,
}

/// Repository with the same observable semantics as the PostgreSQL store.
#[derive(Default)]
pub struct MemoryCountryStore {
    inner: Mutex<Inner>,
}

impl MemoryCountryStore {
    /// Make the next batches fail after partially applying, to check rollback.
    pub fn fail_upserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_upserts = fail;
    }

    pub fn fail_runs(&self, fail: bool) {
        self.inner.lock().unwrap().fail_runs = fail;
    }

    pub fn fail_top(&self, fail: bool) {
        self.inner.lock().unwrap().fail_top = fail;
    }

    pub fn runs(&self) -> Vec<RefreshRun> {
        self.inner.lock().unwrap().runs.clone()
    }

    pub fn countries(&self) -> Vec<Country> {
        self.inner.lock().unwrap().countries.clone()
    }
}

fn cmp_opt<T: PartialOrd>(a: &Option<T>, b: &Option<T>, desc: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let o = x.partial_cmp(y).unwrap_or(Ordering::Equal);
            if desc {
                o.reverse()
            } else {
                o
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sort_countries(rows: &mut [Country], sort: SortKey) {
    rows.sort_by(|a, b| {
        let name = || a.name.to_lowercase().cmp(&b.name.to_lowercase());
        let primary = match sort {
            SortKey::NameAsc => name(),
            SortKey::NameDesc => name().reverse(),
            SortKey::PopulationAsc => a.population.cmp(&b.population),
            SortKey::PopulationDesc => b.population.cmp(&a.population),
            SortKey::GdpAsc => cmp_opt(&a.estimated_gdp, &b.estimated_gdp, false),
            SortKey::GdpDesc => cmp_opt(&a.estimated_gdp, &b.estimated_gdp, true),
            SortKey::RegionAsc => cmp_opt(&a.region, &b.region, false).then_with(name),
            SortKey::RegionDesc => cmp_opt(&a.region, &b.region, true).then_with(name),
        };
        primary.then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl CountryRepository for MemoryCountryStore {
    async fn upsert_batch(&self, records: &[ReconciledCountry], refreshed_at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let mut staged = inner.countries.clone();
        let mut next_id = inner.next_id;
        for (i, r) in records.iter().enumerate() {
            if inner.fail_upserts && i == records.len() - 1 {
                return Err(AppError::Db(sqlx::Error::PoolTimedOut));
            }
            let key = r.name.to_lowercase();
            match staged.iter_mut().find(|c| c.name.to_lowercase() == key) {
                Some(c) => {
                    c.name = r.name.clone();
                    c.capital = r.capital.clone();
                    c.region = r.region.clone();
                    c.population = r.population;
                    c.currency_code = r.currency_code.clone();
                    c.exchange_rate = r.exchange_rate;
                    c.estimated_gdp = r.estimated_gdp;
                    c.flag_url = r.flag_url.clone();
                    c.last_refreshed_at = refreshed_at;
                    c.updated_at = refreshed_at;
                }
                None => {
                    next_id += 1;
                    staged.push(Country {
                        id: next_id,
                        name: r.name.clone(),
                        capital: r.capital.clone(),
                        region: r.region.clone(),
                        population: r.population,
                        currency_code: r.currency_code.clone(),
                        exchange_rate: r.exchange_rate,
                        estimated_gdp: r.estimated_gdp,
                        flag_url: r.flag_url.clone(),
                        last_refreshed_at: refreshed_at,
                        created_at: refreshed_at,
                        updated_at: refreshed_at,
                    });
                }
            }
        }
        inner.countries = staged;
        inner.next_id = next_id;
        Ok(records.len() as u64)
    }

    async fn record_run(&self, run: &NewRefreshRun) -> Result<RefreshRun, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_runs {
            return Err(AppError::Db(sqlx::Error::PoolTimedOut));
        }
        inner.next_run_id += 1;
        let row = RefreshRun {
            id: inner.next_run_id,
            processed_count: run.processed_count,
            rejected_count: run.rejected_count,
            started_at: run.started_at,
            duration_seconds: run.duration_seconds,
            status: run.status,
            created_at: Utc::now(),
        };
        inner.runs.push(row.clone());
        Ok(row)
    }

    async fn latest_run(&self) -> Result<Option<RefreshRun>, AppError> {
        Ok(self.inner.lock().unwrap().runs.last().cloned())
    }

    async fn top_by_estimate(&self, n: u32) -> Result<Vec<Country>, AppError> {
        if self.inner.lock().unwrap().fail_top {
            return Err(AppError::Db(sqlx::Error::PoolTimedOut));
        }
        let mut rows: Vec<Country> = self
            .countries()
            .into_iter()
            .filter(|c| c.estimated_gdp.is_some())
            .collect();
        sort_countries(&mut rows, SortKey::GdpDesc);
        rows.truncate(n as usize);
        Ok(rows)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Country>, AppError> {
        let key = name.trim().to_lowercase();
        Ok(self.countries().into_iter().find(|c| c.name.to_lowercase() == key))
    }

    async fn delete_by_name(&self, name: &str) -> Result<Option<Country>, AppError> {
        let key = name.trim().to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.countries.iter().position(|c| c.name.to_lowercase() == key);
        Ok(pos.map(|i| inner.countries.remove(i)))
    }

    async fn list(&self, filter: &CountryFilter) -> Result<Vec<Country>, AppError> {
        let eq = |a: &Option<String>, b: &Option<String>| match b {
            None => true,
            Some(b) => a.as_deref().map(|a| a.eq_ignore_ascii_case(b)).unwrap_or(false),
        };
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut rows: Vec<Country> = self
            .countries()
            .into_iter()
            .filter(|c| eq(&c.region, &filter.region))
            .filter(|c| eq(&c.currency_code, &filter.currency))
            .filter(|c| match &search {
                None => true,
                Some(s) => {
                    c.name.to_lowercase().contains(s)
                        || c.capital.as_deref().map(|cap| cap.to_lowercase().contains(s)).unwrap_or(false)
                }
            })
            .collect();
        sort_countries(&mut rows, filter.sort);
        if let Some((limit, offset)) = filter.page() {
            rows = rows.into_iter().skip(offset as usize).take(limit as usize).collect();
        }
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.inner.lock().unwrap().countries.len() as i64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
