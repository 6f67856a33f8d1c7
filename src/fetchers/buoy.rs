use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::catalog::BuoyStation;
use crate::fetch_error::FetchError;
use crate::fetchers::send_for_text;

/// Missing-value marker in the realtime text feed
const MISSING: &str = "MM";

/// Columns 0-4 are YYYY MM DD hh mm (UTC); data columns follow
const TIME_COLUMNS: usize = 5;

/// Latest row of a realtime buoy report, in the feed's own units
/// (m/s, meters, seconds, degrees, hPa, °C, nautical miles, feet for tide)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuoyObservation {
    pub station_id: String,
    pub observed_at: DateTime<Utc>,
    pub wind_direction_deg: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub wind_gust_mps: Option<f64>,
    pub wave_height_m: Option<f64>,
    pub dominant_period_s: Option<f64>,
    pub average_period_s: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub air_temp_c: Option<f64>,
    pub water_temp_c: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub visibility_nmi: Option<f64>,
    pub pressure_tendency_hpa: Option<f64>,
    pub tide_ft: Option<f64>,
}

#[async_trait]
pub trait BuoyFeed: Send + Sync {
    async fn fetch_latest(&self, station: &BuoyStation) -> Result<BuoyObservation, FetchError>;
}

/// NDBC realtime2 text feed client
#[derive(Clone)]
pub struct NdbcBuoyFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl NdbcBuoyFetcher {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn station_url(&self, station_id: &str) -> String {
        format!("{}/{}.txt", self.base_url.trim_end_matches('/'), station_id)
    }
}

#[async_trait]
impl BuoyFeed for NdbcBuoyFetcher {
    #[instrument(skip(self, station), fields(station_id = %station.id))]
    async fn fetch_latest(&self, station: &BuoyStation) -> Result<BuoyObservation, FetchError> {
        let url = self.station_url(&station.id);
        debug!("Sending HTTP request to buoy feed {}", url);
        let text = send_for_text(self.client.get(&url)).await?;
        parse_buoy_report(&station.id, &text)
    }
}

/// Parse the first data row of a realtime buoy report.
///
/// Header rows start with `#`. Columns are positional; trailing columns may be absent.
#[instrument(skip(text), fields(text_size = text.len()))]
pub fn parse_buoy_report(station_id: &str, text: &str) -> Result<BuoyObservation, FetchError> {
    let row = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| {
            warn!("Buoy report for {} has no data rows", station_id);
            FetchError::NoData(format!("buoy {}", station_id))
        })?;

    let parts: Vec<&str> = row.split_whitespace().collect();
    debug!("Buoy row: parts={:?}", parts);

    if parts.len() < TIME_COLUMNS + 1 {
        return Err(FetchError::ParseError(format!(
            "buoy row has {} columns, expected at least {}",
            parts.len(),
            TIME_COLUMNS + 1
        )));
    }

    let observed_at = parse_observation_time(&parts[..TIME_COLUMNS])?;
    let column = |offset: usize| parse_column(parts.get(TIME_COLUMNS + offset).copied());

    Ok(BuoyObservation {
        station_id: station_id.to_string(),
        observed_at,
        wind_direction_deg: column(0)?,
        wind_speed_mps: column(1)?,
        wind_gust_mps: column(2)?,
        wave_height_m: column(3)?,
        dominant_period_s: column(4)?,
        average_period_s: column(5)?,
        wave_direction_deg: column(6)?,
        pressure_hpa: column(7)?,
        air_temp_c: column(8)?,
        water_temp_c: column(9)?,
        dew_point_c: column(10)?,
        visibility_nmi: column(11)?,
        pressure_tendency_hpa: column(12)?,
        tide_ft: column(13)?,
    })
}

fn parse_observation_time(parts: &[&str]) -> Result<DateTime<Utc>, FetchError> {
    let joined = parts.join(" ");
    let naive = NaiveDateTime::parse_from_str(&joined, "%Y %m %d %H %M")
        .map_err(|e| FetchError::ParseError(format!("buoy time '{}': {}", joined, e)))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn parse_column(value: Option<&str>) -> Result<Option<f64>, FetchError> {
    match value {
        None | Some(MISSING) => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| FetchError::NumberError(format!("'{}': {}", raw, e))),
    }
}
