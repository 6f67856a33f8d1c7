use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::fetch_error::FetchError;
use crate::fetchers::send_for_text;
use crate::geo::Coordinate;

/// Hourly atmospheric series: °C, km/h, degrees, %, mm
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherHourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_gusts_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherDaily {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherForecast {
    #[serde(default)]
    pub hourly: WeatherHourly,
    #[serde(default)]
    pub daily: WeatherDaily,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<WeatherForecast, FetchError>;
}

/// Open-Meteo weather forecast client
#[derive(Clone)]
pub struct OpenMeteoWeatherFetcher {
    client: reqwest::Client,
    url: String,
    timezone: String,
}

impl OpenMeteoWeatherFetcher {
    pub fn new(client: reqwest::Client, url: String, timezone: String) -> Self {
        Self {
            client,
            url,
            timezone,
        }
    }
}

pub fn parse_weather_response(body: &str) -> Result<WeatherForecast, FetchError> {
    let forecast: WeatherForecast = serde_json::from_str(body)?;
    if forecast.hourly.time.is_empty() && forecast.daily.time.is_empty() {
        return Err(FetchError::NoData("weather forecast".to_string()));
    }
    Ok(forecast)
}

#[async_trait]
impl WeatherSource for OpenMeteoWeatherFetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<WeatherForecast, FetchError> {
        debug!("Sending weather forecast request");
        let request = self.client.get(&self.url).query(&[
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            (
                "hourly",
                "temperature_2m,wind_speed_10m,wind_direction_10m,wind_gusts_10m,cloud_cover,precipitation"
                    .to_string(),
            ),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_sum,wind_speed_10m_max"
                    .to_string(),
            ),
            ("timezone", self.timezone.clone()),
            ("forecast_days", "1".to_string()),
        ]);

        let body = send_for_text(request).await?;
        parse_weather_response(&body)
    }
}
