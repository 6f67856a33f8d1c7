//! Tide height providers tried in order by the station resolver.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::catalog::BuoyStation;
use crate::fetch_error::FetchError;
use crate::fetchers::buoy::BuoyObservation;
use crate::fetchers::send_for_text;
use crate::geo::Coordinate;
use crate::tide::TideSample;
use crate::units::meters_to_feet;

/// Everything a provider may key its lookup on
#[derive(Debug, Clone, Copy)]
pub struct TideQuery<'a> {
    /// The spot's own coordinate (not the station's)
    pub spot: Coordinate,
    pub station: Option<&'a BuoyStation>,
    pub buoy: Option<&'a BuoyObservation>,
    pub now: DateTime<Utc>,
}

/// Current tide height in feet
#[derive(Debug, Clone, PartialEq)]
pub struct TideReading {
    pub height_ft: f64,
    pub source: &'static str,
}

#[async_trait]
pub trait TideProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_fetch(&self, query: &TideQuery<'_>) -> Result<TideReading, FetchError>;
}

/// Hourly tide series around `now`, used for trend and extrema
#[async_trait]
pub trait TideHistorySource: Send + Sync {
    async fn fetch_history(
        &self,
        coordinate: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TideSample>, FetchError>;
}

/// Tide column of the already-fetched realtime buoy row
#[derive(Debug, Clone, Default)]
pub struct BuoyTideProvider;

#[async_trait]
impl TideProvider for BuoyTideProvider {
    fn name(&self) -> &'static str {
        "buoy"
    }

    async fn try_fetch(&self, query: &TideQuery<'_>) -> Result<TideReading, FetchError> {
        let buoy = query
            .buoy
            .ok_or_else(|| FetchError::NoData("buoy report".to_string()))?;
        let height_ft = buoy
            .tide_ft
            .ok_or_else(|| FetchError::MissingField("tide".to_string()))?;
        Ok(TideReading {
            height_ft,
            source: self.name(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SeaLevelResponse {
    #[serde(default)]
    data: Vec<SeaLevelPoint>,
}

#[derive(Debug, Deserialize)]
struct SeaLevelPoint {
    time: String,
    sg: Option<f64>,
}

/// Commercial sea-level API queried by coordinate (Stormglass shaped)
#[derive(Clone)]
pub struct StormglassTideProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl StormglassTideProvider {
    pub fn new(client: reqwest::Client, url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_window(
        &self,
        coordinate: Coordinate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TideSample>, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::NotConfigured("TIDE_API_KEY".to_string()))?;

        debug!("Requesting sea level window {} .. {}", start, end);
        let request = self
            .client
            .get(&self.url)
            .header("Authorization", api_key)
            .query(&[
                ("lat", coordinate.latitude.to_string()),
                ("lng", coordinate.longitude.to_string()),
                ("start", start.timestamp().to_string()),
                ("end", end.timestamp().to_string()),
            ]);

        let body = send_for_text(request).await?;
        parse_sea_level_response(&body)
    }
}

/// Parse a sea-level response into a chronological series in feet
pub fn parse_sea_level_response(body: &str) -> Result<Vec<TideSample>, FetchError> {
    let response: SeaLevelResponse = serde_json::from_str(body)?;
    let mut samples = Vec::with_capacity(response.data.len());

    for point in response.data {
        let time = DateTime::parse_from_rfc3339(&point.time)
            .map_err(|e| FetchError::ParseError(format!("sea level time '{}': {}", point.time, e)))?;
        if let Some(height) = meters_to_feet(point.sg) {
            samples.push(TideSample::new(time.timestamp(), height));
        }
    }

    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

/// Sample closest in time to `now`; earlier sample wins ties
pub fn closest_sample(samples: &[TideSample], now: DateTime<Utc>) -> Option<TideSample> {
    let now_ts = now.timestamp();
    let mut best: Option<TideSample> = None;
    for sample in samples {
        let distance = (sample.timestamp - now_ts).abs();
        match best {
            Some(b) if (b.timestamp - now_ts).abs() <= distance => {}
            _ => best = Some(*sample),
        }
    }
    best
}

#[async_trait]
impl TideProvider for StormglassTideProvider {
    fn name(&self) -> &'static str {
        "sea-level-api"
    }

    async fn try_fetch(&self, query: &TideQuery<'_>) -> Result<TideReading, FetchError> {
        let samples = self
            .fetch_window(
                query.spot,
                query.now - Duration::hours(1),
                query.now + Duration::hours(1),
            )
            .await?;

        let current = closest_sample(&samples, query.now)
            .ok_or_else(|| FetchError::NoData("sea level".to_string()))?;

        Ok(TideReading {
            height_ft: current.height,
            source: self.name(),
        })
    }
}

#[async_trait]
impl TideHistorySource for StormglassTideProvider {
    async fn fetch_history(
        &self,
        coordinate: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TideSample>, FetchError> {
        self.fetch_window(coordinate, now - Duration::hours(12), now + Duration::hours(12))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    predictions: Option<Vec<Prediction>>,
    error: Option<PredictionError>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    t: String,
    v: String,
}

#[derive(Debug, Deserialize)]
struct PredictionError {
    message: String,
}

/// Government tide predictions queried by station id (NOAA CO-OPS shaped)
#[derive(Clone)]
pub struct NoaaPredictionProvider {
    client: reqwest::Client,
    url: String,
}

impl NoaaPredictionProvider {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

/// First prediction strictly after `now`, heights already in feet
pub fn parse_prediction_response(
    body: &str,
    now: DateTime<Utc>,
) -> Result<TideSample, FetchError> {
    let response: PredictionResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(FetchError::NoData(error.message));
    }

    let predictions = response
        .predictions
        .ok_or_else(|| FetchError::MissingField("predictions".to_string()))?;

    let mut samples = Vec::with_capacity(predictions.len());
    for prediction in predictions {
        let naive = NaiveDateTime::parse_from_str(&prediction.t, "%Y-%m-%d %H:%M")
            .map_err(|e| FetchError::ParseError(format!("prediction time '{}': {}", prediction.t, e)))?;
        let height = prediction
            .v
            .trim()
            .parse::<f64>()
            .map_err(|e| FetchError::NumberError(format!("'{}': {}", prediction.v, e)))?;
        samples.push(TideSample::new(naive.and_utc().timestamp(), height));
    }

    samples.sort_by_key(|s| s.timestamp);
    samples
        .into_iter()
        .find(|s| s.timestamp > now.timestamp())
        .ok_or_else(|| FetchError::NoData("future tide prediction".to_string()))
}

#[async_trait]
impl TideProvider for NoaaPredictionProvider {
    fn name(&self) -> &'static str {
        "tide-predictions"
    }

    #[instrument(skip(self, query), fields(url = %self.url))]
    async fn try_fetch(&self, query: &TideQuery<'_>) -> Result<TideReading, FetchError> {
        let station = query
            .station
            .ok_or_else(|| FetchError::NoData("nearest station".to_string()))?;

        let request = self.client.get(&self.url).query(&[
            ("product", "predictions".to_string()),
            ("station", station.id.clone()),
            ("begin_date", query.now.format("%Y%m%d %H:%M").to_string()),
            ("range", "24".to_string()),
            ("datum", "MLLW".to_string()),
            ("units", "english".to_string()),
            ("time_zone", "gmt".to_string()),
            ("interval", "h".to_string()),
            ("format", "json".to_string()),
            ("application", "surf_report_service".to_string()),
        ]);

        let body = send_for_text(request).await?;
        let next = parse_prediction_response(&body, query.now)?;
        debug!("Nearest prediction for station {}: {:.2} ft", station.id, next.height);

        Ok(TideReading {
            height_ft: next.height,
            source: self.name(),
        })
    }
}
