//! Upstream acquisition: retrying HTTP fetcher, country directory and exchange rates.

pub mod directory;
mod fetcher;
pub mod rates;

pub use directory::{CountryDirectorySource, DirectoryPayload, DirectoryVersion};
pub use fetcher::{host_of, RetryingFetcher};
pub use rates::{ExchangeRateSource, ExchangeRateTable};
