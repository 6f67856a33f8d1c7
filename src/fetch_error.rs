#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upstream returned status {0}")]
    Status(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse number: {0}")]
    NumberError(String),
    #[error("Missing expected field: {0}")]
    MissingField(String),
    #[error("No data available from {0}")]
    NoData(String),
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}
