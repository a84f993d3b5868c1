//! Shared application state for all routes.

use crate::service::{CountryService, RefreshOrchestrator};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub countries: Arc<CountryService>,
    pub refresher: Arc<RefreshOrchestrator>,
}
