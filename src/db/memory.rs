//! Process-local implementations of the storage traits. Coordinator tests
//! run against these instead of Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::db::distribution_lock_repository::ABANDONED_MESSAGE;
use crate::db::{
    AcquireOutcome, Cohort, DbError, DistributionLock, DistributionLockStore, LockState,
    RunCounts, SurfPreferences, Surfer, SurferDirectory,
};

/// Lock store where every operation runs under a single mutex
#[derive(Default)]
pub struct InMemoryLockStore {
    locks: Mutex<BTreeMap<(Cohort, NaiveDate), DistributionLock>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, e.g. a lock left behind by a crashed process
    pub async fn insert(&self, lock: DistributionLock) {
        self.locks
            .lock()
            .await
            .insert((lock.cohort, lock.run_date), lock);
    }

    fn transition(
        lock: Option<&mut DistributionLock>,
        state: LockState,
        counts: RunCounts,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        match lock {
            Some(lock) if lock.state == LockState::Running => {
                lock.state = state;
                lock.success_count = counts.success_count;
                lock.error_count = counts.error_count;
                lock.skipped_count = counts.skipped_count;
                lock.error_message = message.map(str::to_string);
                lock.last_run = now;
                lock.completed_at = Some(now);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DistributionLockStore for InMemoryLockStore {
    async fn try_acquire(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        now: DateTime<Utc>,
        max_run: Duration,
    ) -> Result<AcquireOutcome, DbError> {
        let mut locks = self.locks.lock().await;

        if let Some(lock) = locks.get_mut(&(cohort, run_date)) {
            if lock.is_stale(now, max_run) {
                lock.state = LockState::Failed;
                lock.error_message = Some(ABANDONED_MESSAGE.to_string());
                lock.completed_at = Some(now);
                return Ok(AcquireOutcome::Abandoned(lock.clone()));
            }
            return Ok(AcquireOutcome::AlreadyExists(lock.clone()));
        }

        let lock = DistributionLock::running(cohort, run_date, now);
        locks.insert((cohort, run_date), lock.clone());
        Ok(AcquireOutcome::Acquired(lock))
    }

    async fn record_progress(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get_mut(&(cohort, run_date)) {
            if lock.state == LockState::Running {
                lock.success_count = counts.success_count;
                lock.error_count = counts.error_count;
                lock.skipped_count = counts.skipped_count;
                lock.last_run = now;
            }
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let mut locks = self.locks.lock().await;
        Ok(Self::transition(
            locks.get_mut(&(cohort, run_date)),
            LockState::Completed,
            counts,
            None,
            now,
        ))
    }

    async fn mark_failed(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
        counts: RunCounts,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let mut locks = self.locks.lock().await;
        Ok(Self::transition(
            locks.get_mut(&(cohort, run_date)),
            LockState::Failed,
            counts,
            Some(message),
            now,
        ))
    }

    async fn get(
        &self,
        cohort: Cohort,
        run_date: NaiveDate,
    ) -> Result<Option<DistributionLock>, DbError> {
        Ok(self.locks.lock().await.get(&(cohort, run_date)).cloned())
    }

    async fn list_recent(
        &self,
        cohort: Cohort,
        limit: i64,
    ) -> Result<Vec<DistributionLock>, DbError> {
        let locks = self.locks.lock().await;
        Ok(locks
            .values()
            .rev()
            .filter(|l| l.cohort == cohort)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct StoredSurfer {
    surfer: Surfer,
    premium: bool,
    email_verified: bool,
    preferences: Option<SurfPreferences>,
}

/// Surfer directory backed by a fixed list
#[derive(Default)]
pub struct InMemorySurferDirectory {
    surfers: Vec<StoredSurfer>,
    unavailable: bool,
    errors: Mutex<HashMap<i64, (String, DateTime<Utc>)>>,
    sent: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl InMemorySurferDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surfer(
        mut self,
        surfer: Surfer,
        premium: bool,
        email_verified: bool,
        preferences: Option<SurfPreferences>,
    ) -> Self {
        self.surfers.push(StoredSurfer {
            surfer,
            premium,
            email_verified,
            preferences,
        });
        self
    }

    /// Make cohort listing fail, as when the account store is down
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub async fn report_errors(&self) -> HashMap<i64, (String, DateTime<Utc>)> {
        self.errors.lock().await.clone()
    }

    pub async fn reports_sent(&self) -> HashMap<i64, DateTime<Utc>> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl SurferDirectory for InMemorySurferDirectory {
    async fn eligible_surfers(&self, cohort: Cohort) -> Result<Vec<Surfer>, DbError> {
        if self.unavailable {
            return Err(DbError::SqlxError(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .surfers
            .iter()
            .filter(|s| s.email_verified && s.premium == cohort.is_premium())
            .map(|s| s.surfer.clone())
            .collect())
    }

    async fn preferences(&self, surfer_id: i64) -> Result<Option<SurfPreferences>, DbError> {
        Ok(self
            .surfers
            .iter()
            .find(|s| s.surfer.id == surfer_id)
            .and_then(|s| s.preferences.clone()))
    }

    async fn record_report_error(
        &self,
        surfer_id: i64,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.errors
            .lock()
            .await
            .insert(surfer_id, (message.to_string(), at));
        Ok(())
    }

    async fn record_report_sent(&self, surfer_id: i64, at: DateTime<Utc>) -> Result<(), DbError> {
        self.sent.lock().await.insert(surfer_id, at);
        Ok(())
    }
}
