use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{Cohort, DbError, SurfPreferences, Surfer};

/// Account storage as seen by the distribution engine
#[async_trait]
pub trait SurferDirectory: Send + Sync {
    /// Email-verified surfers whose tier matches the cohort
    async fn eligible_surfers(&self, cohort: Cohort) -> Result<Vec<Surfer>, DbError>;

    async fn preferences(&self, surfer_id: i64) -> Result<Option<SurfPreferences>, DbError>;

    async fn record_report_error(
        &self,
        surfer_id: i64,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn record_report_sent(&self, surfer_id: i64, at: DateTime<Utc>) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct SurferRepository {
    pool: PgPool,
}

impl SurferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SurferDirectory for SurferRepository {
    #[instrument(skip(self), fields(cohort = %cohort))]
    async fn eligible_surfers(&self, cohort: Cohort) -> Result<Vec<Surfer>, DbError> {
        let surfers = sqlx::query_as::<_, Surfer>(
            r#"
            SELECT id, email, first_name
            FROM surfers
            WHERE email_verified = TRUE AND is_premium = $1
            ORDER BY id
            "#,
        )
        .bind(cohort.is_premium())
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} eligible surfers", surfers.len());
        Ok(surfers)
    }

    #[instrument(skip(self))]
    async fn preferences(&self, surfer_id: i64) -> Result<Option<SurfPreferences>, DbError> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT preferences::text FROM surfers WHERE id = $1")
                .bind(surfer_id)
                .fetch_optional(&self.pool)
                .await?;

        match raw.flatten() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, message))]
    async fn record_report_error(
        &self,
        surfer_id: i64,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE surfers SET last_report_error = $2, last_report_error_at = $3 WHERE id = $1",
        )
        .bind(surfer_id)
        .bind(message)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_report_sent(&self, surfer_id: i64, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query("UPDATE surfers SET last_report_sent_at = $2 WHERE id = $1")
            .bind(surfer_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
