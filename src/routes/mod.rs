mod common;
mod countries;

pub use common::common_routes;
pub use countries::country_routes;
