//! Country refresh: pulls a country directory and exchange rates, reconciles them into
//! GDP estimates, persists them idempotently in PostgreSQL and serves them over REST.

pub mod artifact;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod reconcile;
pub mod response;
pub mod sql;
pub mod state;
pub mod store;
pub mod service;
pub mod handlers;
pub mod routes;

#[cfg(test)]
mod test_support;

pub use artifact::SummaryArtifactGenerator;
pub use config::{load_from_env, RetryPolicy, Settings};
pub use error::{AppError, ConfigError, FetchError};
pub use model::{Country, RefreshRun, RunStatus};
pub use reconcile::{GdpMultiplier, RandomMultiplier, Reconciler};
pub use state::AppState;
pub use store::{ensure_country_tables, ensure_database_exists, CountryRepository, PgCountryStore};
pub use routes::{common_routes, country_routes};
pub use service::{CountryService, RefreshOrchestrator, RefreshReport};
