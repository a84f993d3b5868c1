//! Services: the refresh pipeline and the read accessors over the store.

mod countries;
mod refresh;
pub use countries::{CountryService, StatusReport, NEVER_REFRESHED};
pub use refresh::{RefreshOrchestrator, RefreshReport};
