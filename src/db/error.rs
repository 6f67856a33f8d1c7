#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Invalid preferences JSON: {0}")]
    Preferences(#[from] serde_json::Error),
}
