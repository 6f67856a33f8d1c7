use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::db::{AcquireOutcome, Cohort, DbError, DistributionLock, DistributionLockRow, RunCounts};

/// Linearizable compare-and-swap over the lock record keyed by (cohort, date)
#[async_trait]
pub trait DistributionLockStore: Send + Sync {
    /// Create a `running` lock unless one already exists for the date.
    /// Read, decide and write happen as one indivisible step.
    async fn try_acquire(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        now: DateTime<Utc>,
        max_run: Duration,
    ) -> Result<AcquireOutcome, DbError>;

    /// Refresh `last_run` and tallies of a running lock
    async fn record_progress(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// `running -> completed`; returns false if the lock was not running
    async fn mark_completed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError>;

    /// `running -> failed`; returns false if the lock was not running
    async fn mark_failed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError>;

    async fn get(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
    ) -> Result<Option<DistributionLock>, DbError>;

    async fn list_recent(
        &self,
        cohort: Cohort,
        limit: i64,
    ) -> Result<Vec<DistributionLock>, DbError>;
}

const LOCK_COLUMNS: &str = "cohort, run_date, state, success_count, error_count, skipped_count, \
                            error_message, last_run, completed_at";

pub const ABANDONED_MESSAGE: &str = "abandoned: run exceeded maximum duration without completing";

#[derive(Clone)]
pub struct DistributionLockRepository {
    pool: PgPool,
}

impl DistributionLockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributionLockStore for DistributionLockRepository {
    #[instrument(skip(self), fields(cohort = %cohort, run_date = %run_date))]
    async fn try_acquire(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        now: DateTime<Utc>,
        max_run: Duration,
    ) -> Result<AcquireOutcome, DbError> {
        debug!("Beginning lock acquisition transaction");
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, DistributionLockRow>(&format!(
            "SELECT {} FROM distribution_locks WHERE cohort = $1 AND run_date = $2 FOR UPDATE",
            LOCK_COLUMNS
        ))
        .bind(cohort.as_str())
        .bind(run_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let lock = DistributionLock::try_from(row)?;

            if lock.is_stale(now, max_run) {
                let row = sqlx::query_as::<_, DistributionLockRow>(&format!(
                    r#"
                    UPDATE distribution_locks
                    SET state = 'failed', error_message = $3, completed_at = $4
                    WHERE cohort = $1 AND run_date = $2 AND state = 'running'
                    RETURNING {}
                    "#,
                    LOCK_COLUMNS
                ))
                .bind(cohort.as_str())
                .bind(run_date)
                .bind(ABANDONED_MESSAGE)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;

                warn!(last_run = %lock.last_run, "Stale running lock marked failed");
                return Ok(AcquireOutcome::Abandoned(DistributionLock::try_from(row)?));
            }

            tx.commit().await?;
            debug!(state = lock.state.as_str(), "Lock already exists");
            return Ok(AcquireOutcome::AlreadyExists(lock));
        }

        let inserted = sqlx::query_as::<_, DistributionLockRow>(&format!(
            r#"
            INSERT INTO distribution_locks (
                cohort, run_date, state, success_count, error_count, skipped_count, last_run
            )
            VALUES ($1, $2, 'running', 0, 0, 0, $3)
            ON CONFLICT (cohort, run_date) DO NOTHING
            RETURNING {}
            "#,
            LOCK_COLUMNS
        ))
        .bind(cohort.as_str())
        .bind(run_date)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        match inserted {
            Some(row) => {
                info!("Acquired distribution lock");
                Ok(AcquireOutcome::Acquired(DistributionLock::try_from(row)?))
            }
            None => {
                // A concurrent invocation inserted first
                debug!("Lost insert race, reading winner's lock");
                let lock = self
                    .get(cohort, run_date)
                    .await?
                    .ok_or_else(|| DbError::Corrupt("lock vanished after conflict".to_string()))?;
                Ok(AcquireOutcome::AlreadyExists(lock))
            }
        }
    }

    #[instrument(skip(self), fields(cohort = %cohort, run_date = %run_date))]
    async fn record_progress(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE distribution_locks
            SET success_count = $3, error_count = $4, skipped_count = $5, last_run = $6
            WHERE cohort = $1 AND run_date = $2 AND state = 'running'
            "#,
        )
        .bind(cohort.as_str())
        .bind(run_date)
        .bind(counts.success_count)
        .bind(counts.error_count)
        .bind(counts.skipped_count)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cohort = %cohort, run_date = %run_date))]
    async fn mark_completed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE distribution_locks
            SET state = 'completed',
                success_count = $3, error_count = $4, skipped_count = $5,
                error_message = NULL, last_run = $6, completed_at = $6
            WHERE cohort = $1 AND run_date = $2 AND state = 'running'
            "#,
        )
        .bind(cohort.as_str())
        .bind(run_date)
        .bind(counts.success_count)
        .bind(counts.error_count)
        .bind(counts.skipped_count)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let transitioned = result.rows_affected() == 1;
        if !transitioned {
            warn!("Lock was not running, completion not recorded");
        }
        Ok(transitioned)
    }

    #[instrument(skip(self, message), fields(cohort = %cohort, run_date = %run_date))]
    async fn mark_failed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE distribution_locks
            SET state = 'failed',
                success_count = $3, error_count = $4, skipped_count = $5,
                error_message = $6, last_run = $7, completed_at = $7
            WHERE cohort = $1 AND run_date = $2 AND state = 'running'
            "#,
        )
        .bind(cohort.as_str())
        .bind(run_date)
        .bind(counts.success_count)
        .bind(counts.error_count)
        .bind(counts.skipped_count)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
    ) -> Result<Option<DistributionLock>, DbError> {
        let row = sqlx::query_as::<_, DistributionLockRow>(&format!(
            "SELECT {} FROM distribution_locks WHERE cohort = $1 AND run_date = $2",
            LOCK_COLUMNS
        ))
        .bind(cohort.as_str())
        .bind(run_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DistributionLock::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_recent(
        &self,
        cohort: Cohort,
        limit: i64,
    ) -> Result<Vec<DistributionLock>, DbError> {
        let rows = sqlx::query_as::<_, DistributionLockRow>(&format!(
            "SELECT {} FROM distribution_locks WHERE cohort = $1 ORDER BY run_date DESC LIMIT $2",
            LOCK_COLUMNS
        ))
        .bind(cohort.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DistributionLock::try_from).collect()
    }
}
