use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::db::DbError;

/// User cohort processed by one coordinator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    Regular,
    Premium,
}

impl Cohort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cohort::Regular => "regular",
            Cohort::Premium => "premium",
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, Cohort::Premium)
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cohort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Cohort::Regular),
            "premium" => Ok(Cohort::Premium),
            other => Err(format!("unknown cohort '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Running,
    Completed,
    Failed,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Running => "running",
            LockState::Completed => "completed",
            LockState::Failed => "failed",
        }
    }
}

impl FromStr for LockState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(LockState::Running),
            "completed" => Ok(LockState::Completed),
            "failed" => Ok(LockState::Failed),
            other => Err(format!("unknown lock state '{}'", other)),
        }
    }
}

/// Per-run tallies written to the lock record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunCounts {
    pub success_count: i32,
    pub error_count: i32,
    pub skipped_count: i32,
}

/// Lock document for one (cohort, business date). Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DistributionLock {
    pub cohort: Cohort,
    pub run_date: NaiveDate,
    pub state: LockState,
    pub success_count: i32,
    pub error_count: i32,
    pub skipped_count: i32,
    pub error_message: Option<String>,
    pub last_run: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DistributionLock {
    pub fn running(cohort: Cohort, run_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            cohort,
            run_date,
            state: LockState::Running,
            success_count: 0,
            error_count: 0,
            skipped_count: 0,
            error_message: None,
            last_run: now,
            completed_at: None,
        }
    }

    /// A `running` lock with no activity for longer than `max_run` is abandoned
    pub fn is_stale(&self, now: DateTime<Utc>, max_run: Duration) -> bool {
        self.state == LockState::Running && now - self.last_run > max_run
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            success_count: self.success_count,
            error_count: self.error_count,
            skipped_count: self.skipped_count,
        }
    }
}

/// Raw row; state and cohort are stored as text
#[derive(Debug, Clone, FromRow)]
pub struct DistributionLockRow {
    pub cohort: String,
    pub run_date: NaiveDate,
    pub state: String,
    pub success_count: i32,
    pub error_count: i32,
    pub skipped_count: i32,
    pub error_message: Option<String>,
    pub last_run: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DistributionLockRow> for DistributionLock {
    type Error = DbError;

    fn try_from(row: DistributionLockRow) -> Result<Self, Self::Error> {
        Ok(Self {
            cohort: row.cohort.parse().map_err(DbError::Corrupt)?,
            run_date: row.run_date,
            state: row.state.parse().map_err(DbError::Corrupt)?,
            success_count: row.success_count,
            error_count: row.error_count,
            skipped_count: row.skipped_count,
            error_message: row.error_message,
            last_run: row.last_run,
            completed_at: row.completed_at,
        })
    }
}

/// Result of the atomic check-and-create on the lock record
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// No lock existed; a `running` lock now belongs to this invocation
    Acquired(DistributionLock),
    /// A lock already exists for the date, in any state
    AlreadyExists(DistributionLock),
    /// A stale `running` lock was moved to `failed`; this invocation still skips
    Abandoned(DistributionLock),
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Surfer {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfPreferences {
    /// Spot names in order of preference; the first one is the home break
    #[serde(default)]
    pub spots: Vec<String>,
    #[serde(default)]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub board_type: Option<String>,
    #[serde(default)]
    pub preferred_wave_height_ft: Option<f64>,
}
