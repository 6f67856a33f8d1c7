use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{
    AcquireOutcome, Cohort, DbError, DistributionLock, DistributionLockStore, RunCounts, Surfer,
    SurferDirectory,
};
use crate::services::{ReportOutcome, ReportService};

/// Lock tallies are flushed (and `last_run` refreshed) every this many surfers
pub const PROGRESS_INTERVAL: usize = 25;

/// Errors that prevent the coordinator from owning or closing a lock
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("Lock store error: {0}")]
    LockStore(#[from] DbError),
    #[error("Lock for {cohort} on {run_date} was not running at close")]
    LockLost { cohort: Cohort, run_date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunCounts),
    /// Batch-fatal failure; the lock was moved to `failed`
    Failed { counts: RunCounts, message: String },
    /// A lock already existed for the date; nothing was sent
    AlreadyRan(DistributionLock),
    /// A stale `running` lock was closed as failed; nothing was sent
    Abandoned(DistributionLock),
}

/// Daily batch for one cohort
///
/// Each run claims the (cohort, date) lock atomically, walks the eligible
/// surfers one at a time and closes the lock exactly once. Per-surfer failures
/// (including panics) are counted and recorded on the surfer; only failures
/// outside the per-surfer loop fail the batch.
pub struct DistributionCoordinator {
    cohort: Cohort,
    locks: Arc<dyn DistributionLockStore>,
    directory: Arc<dyn SurferDirectory>,
    reports: ReportService,
    max_run: chrono::Duration,
    cohort_retry: ExponentialBuilder,
}

impl DistributionCoordinator {
    pub fn new(
        cohort: Cohort,
        locks: Arc<dyn DistributionLockStore>,
        directory: Arc<dyn SurferDirectory>,
        reports: ReportService,
        max_run: chrono::Duration,
    ) -> Self {
        Self {
            cohort,
            locks,
            directory,
            reports,
            max_run,
            cohort_retry: ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(2))
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(3)
                .with_jitter(),
        }
    }

    /// Override the retry schedule used when loading the cohort
    pub fn with_cohort_retry(mut self, min_delay: Duration, max_times: usize) -> Self {
        self.cohort_retry = ExponentialBuilder::default()
            .with_min_delay(min_delay)
            .with_max_times(max_times);
        self
    }

    pub fn cohort(&self) -> Cohort {
        self.cohort
    }

    #[instrument(skip(self), fields(cohort = %self.cohort, run_date = %run_date))]
    pub async fn run_for_date(
        &self,
        run_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, DistributionError> {
        match self
            .locks
            .try_acquire(self.cohort, run_date, now, self.max_run)
            .await?
        {
            AcquireOutcome::Acquired(_) => {}
            AcquireOutcome::AlreadyExists(lock) => {
                info!(
                    state = lock.state.as_str(),
                    "Distribution already ran for this date, skipping"
                );
                return Ok(RunOutcome::AlreadyRan(lock));
            }
            AcquireOutcome::Abandoned(lock) => {
                warn!(
                    last_run = %lock.last_run,
                    "Closed abandoned run as failed, skipping this invocation"
                );
                return Ok(RunOutcome::Abandoned(lock));
            }
        }

        info!("Distribution lock acquired, starting run");

        let surfers = match self.load_cohort().await {
            Ok(surfers) => surfers,
            Err(e) => {
                let message = format!("Failed to load cohort: {}", e);
                error!(error = %e, "Batch-fatal failure, marking run failed");
                return self.fail(run_date, RunCounts::default(), message).await;
            }
        };

        info!(surfers = surfers.len(), "Loaded eligible surfers");

        let mut counts = RunCounts::default();
        for (i, surfer) in surfers.iter().enumerate() {
            self.process_surfer(surfer, run_date, &mut counts).await;

            if (i + 1) % PROGRESS_INTERVAL == 0 {
                if let Err(e) = self
                    .locks
                    .record_progress(self.cohort, run_date, counts, Utc::now())
                    .await
                {
                    warn!(error = %e, "Failed to record progress");
                }
            }
        }

        if !self
            .locks
            .mark_completed(self.cohort, run_date, counts, Utc::now())
            .await?
        {
            return Err(DistributionError::LockLost {
                cohort: self.cohort,
                run_date,
            });
        }

        info!(
            success_count = counts.success_count,
            error_count = counts.error_count,
            skipped_count = counts.skipped_count,
            "Distribution run completed"
        );
        Ok(RunOutcome::Completed(counts))
    }

    async fn load_cohort(&self) -> Result<Vec<Surfer>, DbError> {
        let cohort = self.cohort;
        (|| async { self.directory.eligible_surfers(cohort).await })
            .retry(self.cohort_retry.clone())
            .notify(|e: &DbError, delay: Duration| {
                warn!(error = %e, retry_in = ?delay, "Cohort load failed, retrying");
            })
            .await
    }

    async fn fail(
        &self,
        run_date: NaiveDate,
        counts: RunCounts,
        message: String,
    ) -> Result<RunOutcome, DistributionError> {
        if !self
            .locks
            .mark_failed(self.cohort, run_date, counts, &message, Utc::now())
            .await?
        {
            return Err(DistributionError::LockLost {
                cohort: self.cohort,
                run_date,
            });
        }
        Ok(RunOutcome::Failed { counts, message })
    }

    #[instrument(skip(self, surfer, counts), fields(user_id = surfer.id))]
    async fn process_surfer(&self, surfer: &Surfer, run_date: NaiveDate, counts: &mut RunCounts) {
        let result = AssertUnwindSafe(self.reports.send_report(
            surfer,
            self.cohort,
            run_date,
            Utc::now(),
        ))
        .catch_unwind()
        .await;

        let failure = match result {
            Ok(Ok(ReportOutcome::Sent { featured, .. })) => {
                counts.success_count += 1;
                debug!(featured = %featured, "Surfer report delivered");
                if let Err(e) = self
                    .directory
                    .record_report_sent(surfer.id, Utc::now())
                    .await
                {
                    warn!(error = %e, "Failed to record report delivery");
                }
                return;
            }
            Ok(Ok(ReportOutcome::Skipped(reason))) => {
                counts.skipped_count += 1;
                debug!(reason = reason.as_str(), "Surfer skipped");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("report panicked: {}", panic_message(panic.as_ref())),
        };

        counts.error_count += 1;
        warn!(error = %failure, "Surfer report failed");
        if let Err(e) = self
            .directory
            .record_report_error(surfer.id, &failure, Utc::now())
            .await
        {
            warn!(error = %e, "Failed to record report error");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
