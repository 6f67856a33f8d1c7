pub mod buoy;
pub mod marine;
pub mod tide_providers;
pub mod weather;

pub use buoy::{BuoyFeed, BuoyObservation, NdbcBuoyFetcher};
pub use marine::{MarineForecast, MarineSource, OpenMeteoMarineFetcher};
pub use tide_providers::{
    BuoyTideProvider, NoaaPredictionProvider, StormglassTideProvider, TideHistorySource,
    TideProvider, TideQuery, TideReading,
};
pub use weather::{OpenMeteoWeatherFetcher, WeatherForecast, WeatherSource};

use std::time::Duration;
use tracing::debug;

use crate::fetch_error::FetchError;

/// HTTP client shared by the upstream fetchers; every request is bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("surf-report-service/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Send a prepared request and return the body, treating non-2xx as failure
pub(crate) async fn send_for_text(request: reqwest::RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await.map_err(map_request_error)?;
    let status = response.status();
    debug!("Received HTTP response with status: {}", status);

    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.text().await.map_err(map_request_error)?;
    debug!("Retrieved response body, size: {} bytes", body.len());
    Ok(body)
}

fn map_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e)
    }
}

/// Value at `index` of a nullable series; out of range reads as missing
pub fn series_value(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}
