//! Refresh pipeline: directory -> rates -> reconcile + persist -> run record -> summary image.

use crate::artifact::{SummaryArtifactGenerator, TOP_N};
use crate::config::Settings;
use crate::error::AppError;
use crate::fetch::{CountryDirectorySource, ExchangeRateSource, RetryingFetcher};
use crate::model::{Country, NewRefreshRun, RawCountry, ReconciledCountry, RunStatus};
use crate::reconcile::Reconciler;
use crate::store::CountryRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a completed refresh.
#[derive(Clone, Debug, Serialize)]
pub struct RefreshReport {
    pub processed_count: u64,
    pub rejected_count: u64,
    pub duration_seconds: f64,
    pub refreshed_at: DateTime<Utc>,
    pub top: Vec<Country>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Reconciled batch plus everything that was skipped or flagged on the way.
#[derive(Debug, Default)]
struct Partition {
    accepted: Vec<ReconciledCountry>,
    rejected: u64,
    warnings: Vec<String>,
}

pub struct RefreshOrchestrator {
    directory: CountryDirectorySource,
    rates: ExchangeRateSource,
    reconciler: Reconciler,
    store: Arc<dyn CountryRepository>,
    artifact: Arc<SummaryArtifactGenerator>,
}

impl RefreshOrchestrator {
    pub fn new(
        directory: CountryDirectorySource,
        rates: ExchangeRateSource,
        reconciler: Reconciler,
        store: Arc<dyn CountryRepository>,
        artifact: Arc<SummaryArtifactGenerator>,
    ) -> Self {
        RefreshOrchestrator {
            directory,
            rates,
            reconciler,
            store,
            artifact,
        }
    }

    /// Wire the sources from settings with the default random multiplier.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn CountryRepository>,
        artifact: Arc<SummaryArtifactGenerator>,
    ) -> Result<Self, AppError> {
        let fetcher = RetryingFetcher::new(settings.retry.clone())?;
        let directory = CountryDirectorySource::new(
            fetcher.clone(),
            settings.upstream.countries.clone(),
            settings.upstream.countries_fallback.clone(),
        );
        let rates = ExchangeRateSource::new(fetcher, settings.upstream.exchange_rates.clone());
        Ok(Self::new(directory, rates, Reconciler::default(), store, artifact))
    }

    /// Run the pipeline on its own task. Dropping the returned future does not
    /// stop the refresh, so the run row is still written.
    pub async fn refresh_detached(self: Arc<Self>) -> Result<RefreshReport, AppError> {
        tokio::spawn(async move { self.refresh().await })
            .await
            .map_err(|e| AppError::Internal(format!("refresh task: {}", e)))?
    }

    /// Run the whole pipeline once. Exactly one run row is recorded per call.
    pub async fn refresh(&self) -> Result<RefreshReport, AppError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!("country refresh started");

        let raw = match self.directory.fetch_all().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "country directory unavailable");
                self.record_failure(started_at, clock, 0, RunStatus::FailedDirectoryUnavailable).await;
                return Err(e.into());
            }
        };

        let rates = match self.rates.fetch_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::error!(error = %e, "exchange rates unavailable");
                self.record_failure(started_at, clock, 0, RunStatus::FailedRatesUnavailable).await;
                return Err(e.into());
            }
        };

        let partition = self.partition(&raw, &rates);
        if partition.accepted.is_empty() {
            tracing::error!(rejected = partition.rejected, "every fetched country failed validation");
            self.record_failure(started_at, clock, partition.rejected, RunStatus::FailedValidation).await;
            return Err(AppError::Validation {
                message: format!("all {} fetched countries failed validation", raw.len()),
                details: Some(serde_json::json!({ "warnings": partition.warnings })),
            });
        }

        let refreshed_at = Utc::now();
        let processed = match self.store.upsert_batch(&partition.accepted, refreshed_at).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "country batch rolled back");
                self.record_failure(started_at, clock, partition.rejected, RunStatus::FailedPersistence).await;
                return Err(e);
            }
        };

        // The batch is committed from here on; later store errors are logged, not returned.
        let duration_seconds = clock.elapsed().as_secs_f64();
        let run = NewRefreshRun {
            processed_count: processed as i64,
            rejected_count: partition.rejected as i64,
            started_at,
            duration_seconds,
            status: RunStatus::Completed,
        };
        if let Err(e) = self.store.record_run(&run).await {
            tracing::error!(error = %e, "failed to record completed refresh run");
        }

        let top = match self.store.top_by_estimate(TOP_N).await {
            Ok(top) => top,
            Err(e) => {
                tracing::error!(error = %e, "failed to read top countries after refresh");
                Vec::new()
            }
        };

        let artifact = self.artifact.clone();
        tokio::spawn(async move {
            artifact.regenerate().await;
        });

        tracing::info!(
            processed,
            rejected = partition.rejected,
            warnings = partition.warnings.len(),
            duration_seconds,
            "country refresh completed"
        );
        Ok(RefreshReport {
            processed_count: processed,
            rejected_count: partition.rejected,
            duration_seconds,
            refreshed_at,
            top,
            warnings: partition.warnings,
        })
    }

    fn partition(&self, raw: &[RawCountry], rates: &crate::fetch::ExchangeRateTable) -> Partition {
        let mut out = Partition::default();
        // Warnings are held as slots so a replaced duplicate can take its warning with it.
        let mut notes: Vec<Option<String>> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut slot_note: HashMap<usize, usize> = HashMap::new();
        for (i, entry) in raw.iter().enumerate() {
            match self.reconciler.reconcile(entry, rates) {
                Ok(r) => {
                    let key = r.country.name.to_lowercase();
                    let slot = match seen.get(&key) {
                        Some(&slot) => {
                            if let Some(idx) = slot_note.remove(&slot) {
                                notes[idx] = None;
                            }
                            notes.push(Some(format!("{}: duplicate entry, later one kept", r.country.name)));
                            out.accepted[slot] = r.country;
                            slot
                        }
                        None => {
                            let slot = out.accepted.len();
                            seen.insert(key, slot);
                            out.accepted.push(r.country);
                            slot
                        }
                    };
                    if let Some(w) = r.warning {
                        slot_note.insert(slot, notes.len());
                        notes.push(Some(w));
                    }
                }
                Err(e) => {
                    let label = entry
                        .name
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("entry #{}", i));
                    tracing::warn!(country = %label, error = %e, "skipping country");
                    out.rejected += 1;
                    notes.push(Some(format!("{}: {}", label, e)));
                }
            }
        }
        out.warnings = notes.into_iter().flatten().collect();
        out
    }

    /// Failure runs are best effort: a store error here is logged, the original error wins.
    async fn record_failure(&self, started_at: DateTime<Utc>, clock: Instant, rejected: u64, status: RunStatus) {
        let run = NewRefreshRun {
            processed_count: 0,
            rejected_count: rejected as i64,
            started_at,
            duration_seconds: clock.elapsed().as_secs_f64(),
            status,
        };
        if let Err(e) = self.store.record_run(&run).await {
            tracing::error!(error = %e, %status, "failed to record refresh run");
        }
    }
}
