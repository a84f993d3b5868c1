//! HTTP handlers for the country routes.

pub mod countries;
pub use countries::*;
