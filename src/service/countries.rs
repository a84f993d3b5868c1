//! Read and delete accessors behind the country routes.

use crate::artifact::SummaryArtifactGenerator;
use crate::error::AppError;
use crate::model::Country;
use crate::sql::CountryFilter;
use crate::store::CountryRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const NEVER_REFRESHED: &str = "never_refreshed";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub processed_count: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub total_countries: i64,
}

pub struct CountryService {
    store: Arc<dyn CountryRepository>,
    artifact: Arc<SummaryArtifactGenerator>,
}

impl CountryService {
    pub fn new(store: Arc<dyn CountryRepository>, artifact: Arc<SummaryArtifactGenerator>) -> Self {
        CountryService { store, artifact }
    }

    pub async fn list(&self, filter: &CountryFilter) -> Result<Vec<Country>, AppError> {
        self.store.list(filter).await
    }

    pub async fn get(&self, name: &str) -> Result<Country, AppError> {
        self.store
            .get_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("country '{}'", name)))
    }

    pub async fn delete(&self, name: &str) -> Result<Country, AppError> {
        let deleted = self
            .store
            .delete_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("country '{}'", name)))?;
        tracing::info!(country = %deleted.name, "country deleted");
        Ok(deleted)
    }

    /// Latest run wins; before any run the status is `never_refreshed`.
    pub async fn status(&self) -> Result<StatusReport, AppError> {
        let total_countries = self.store.count().await?;
        Ok(match self.store.latest_run().await? {
            Some(run) => StatusReport {
                status: run.status.to_string(),
                processed_count: run.processed_count,
                last_refreshed_at: Some(run.created_at),
                duration_seconds: Some(run.duration_seconds),
                total_countries,
            },
            None => StatusReport {
                status: NEVER_REFRESHED.into(),
                processed_count: 0,
                last_refreshed_at: None,
                duration_seconds: None,
                total_countries,
            },
        })
    }

    pub async fn summary_image(&self) -> Result<Vec<u8>, AppError> {
        self.artifact
            .read()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("summary image".into()))
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await
    }
}
