use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::fetch_error::FetchError;
use crate::fetchers::send_for_text;
use crate::geo::Coordinate;

/// Hourly marine series, metric (meters, seconds, degrees, °C), indexed by local hour
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarineHourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub wave_height: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_direction: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_period: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_height: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_direction: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_period: Vec<Option<f64>>,
    #[serde(default)]
    pub sea_surface_temperature: Vec<Option<f64>>,
}

/// Daily marine aggregates; index 0 is today
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarineDaily {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub wave_height_max: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_direction_dominant: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_period_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarineForecast {
    #[serde(default)]
    pub hourly: MarineHourly,
    #[serde(default)]
    pub daily: MarineDaily,
}

#[async_trait]
pub trait MarineSource: Send + Sync {
    async fn fetch_marine(&self, coordinate: Coordinate) -> Result<MarineForecast, FetchError>;
}

/// Open-Meteo marine forecast client
#[derive(Clone)]
pub struct OpenMeteoMarineFetcher {
    client: reqwest::Client,
    url: String,
    timezone: String,
}

impl OpenMeteoMarineFetcher {
    pub fn new(client: reqwest::Client, url: String, timezone: String) -> Self {
        Self {
            client,
            url,
            timezone,
        }
    }
}

/// Parse an Open-Meteo marine response body
pub fn parse_marine_response(body: &str) -> Result<MarineForecast, FetchError> {
    let forecast: MarineForecast = serde_json::from_str(body)?;
    if forecast.hourly.time.is_empty() && forecast.daily.time.is_empty() {
        return Err(FetchError::NoData("marine forecast".to_string()));
    }
    Ok(forecast)
}

#[async_trait]
impl MarineSource for OpenMeteoMarineFetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_marine(&self, coordinate: Coordinate) -> Result<MarineForecast, FetchError> {
        debug!("Sending marine forecast request");
        let request = self.client.get(&self.url).query(&[
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            (
                "hourly",
                "wave_height,wave_direction,wave_period,swell_wave_height,swell_wave_direction,swell_wave_period,sea_surface_temperature"
                    .to_string(),
            ),
            (
                "daily",
                "wave_height_max,wave_direction_dominant,wave_period_max".to_string(),
            ),
            ("timezone", self.timezone.clone()),
            ("forecast_days", "1".to_string()),
        ]);

        let body = send_for_text(request).await?;
        parse_marine_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::series_value;

    const SAMPLE: &str = r#"{
        "latitude": 34.0,
        "longitude": -118.7,
        "hourly_units": {"wave_height": "m"},
        "hourly": {
            "time": ["2026-10-19T00:00", "2026-10-19T01:00", "2026-10-19T02:00"],
            "wave_height": [1.1, null, 1.3],
            "wave_direction": [260, 262, 265],
            "wave_period": [9.5, 9.8, 10.1],
            "swell_wave_height": [0.9, 0.95, 1.0],
            "swell_wave_direction": [255, 256, 258],
            "swell_wave_period": [12.0, 12.2, 12.4]
        },
        "daily": {
            "time": ["2026-10-19"],
            "wave_height_max": [1.5],
            "wave_direction_dominant": [262],
            "wave_period_max": [10.5]
        }
    }"#;

    #[test]
    fn test_parse_marine_response_keeps_nulls() {
        let forecast = parse_marine_response(SAMPLE).unwrap();
        assert_eq!(series_value(&forecast.hourly.wave_height, 0), Some(1.1));
        assert_eq!(series_value(&forecast.hourly.wave_height, 1), None);
        assert_eq!(series_value(&forecast.hourly.swell_wave_period, 2), Some(12.4));
        assert_eq!(series_value(&forecast.daily.wave_height_max, 0), Some(1.5));
    }

    #[test]
    fn test_parse_marine_response_missing_series_default_empty() {
        let body = r#"{"hourly": {"time": ["2026-10-19T00:00"], "wave_height": [0.8]}}"#;
        let forecast = parse_marine_response(body).unwrap();
        assert!(forecast.hourly.swell_wave_period.is_empty());
        assert!(forecast.daily.wave_height_max.is_empty());
    }

    #[test]
    fn test_parse_marine_response_rejects_empty_payload() {
        let result = parse_marine_response(r#"{"error": true, "reason": "out of range"}"#);
        assert!(matches!(result, Err(FetchError::NoData(_))));
    }
}
