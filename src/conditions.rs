//! Merge marine, weather and buoy/tide data for one spot and hour into
//! display units (feet, mph, °F, inches).
//!
//! Each provider has its own extractor producing display-unit fields; a single
//! [`merge`] applies [`SourcePrecedence`]. Missing values stay `None`: a 0 ft
//! wave and an unknown wave are different things.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::SurfSpot;
use crate::fetchers::{series_value, BuoyObservation, MarineForecast, WeatherForecast};
use crate::geo::Coordinate;
use crate::station_resolver::StationReport;
use crate::tide::TideSummary;
use crate::units::{
    celsius_to_fahrenheit, kmh_to_mph, meters_to_feet, mm_to_inches, mps_to_mph, rounded_degrees,
};

/// Which source wins when both buoy and model report the same quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePrecedence {
    /// Station observation first, model as fallback
    Observed,
    /// Model first, station observation as fallback
    Modeled,
}

impl SourcePrecedence {
    pub fn pick(self, observed: Option<f64>, modeled: Option<f64>) -> Option<f64> {
        match self {
            SourcePrecedence::Observed => observed.or(modeled),
            SourcePrecedence::Modeled => modeled.or(observed),
        }
    }
}

/// Wave height, swell period and water temperature
pub const SEA_STATE_PRECEDENCE: SourcePrecedence = SourcePrecedence::Observed;
/// Wind speed, gusts and direction
pub const WIND_PRECEDENCE: SourcePrecedence = SourcePrecedence::Modeled;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarineFields {
    pub wave_height_ft: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub swell_height_ft: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub swell_direction_deg: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub max_wave_height_ft: Option<f64>,
    pub dominant_wave_direction_deg: Option<f64>,
    pub max_wave_period_s: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherFields {
    pub air_temp_f: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub precipitation_in: Option<f64>,
    pub max_temp_f: Option<f64>,
    pub min_temp_f: Option<f64>,
    pub precipitation_sum_in: Option<f64>,
    pub max_wind_speed_mph: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuoyFields {
    pub wave_height_ft: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_mph: Option<f64>,
}

/// Marine model fields at local `hour`; daily aggregates always read today (index 0)
pub fn marine_fields(marine: &MarineForecast, hour: usize) -> MarineFields {
    let h = &marine.hourly;
    let d = &marine.daily;
    MarineFields {
        wave_height_ft: meters_to_feet(series_value(&h.wave_height, hour)),
        wave_direction_deg: rounded_degrees(series_value(&h.wave_direction, hour)),
        swell_height_ft: meters_to_feet(series_value(&h.swell_wave_height, hour)),
        swell_period_s: series_value(&h.swell_wave_period, hour)
            .or_else(|| series_value(&h.wave_period, hour)),
        swell_direction_deg: rounded_degrees(series_value(&h.swell_wave_direction, hour)),
        water_temp_f: celsius_to_fahrenheit(series_value(&h.sea_surface_temperature, hour)),
        max_wave_height_ft: meters_to_feet(series_value(&d.wave_height_max, 0)),
        dominant_wave_direction_deg: rounded_degrees(series_value(&d.wave_direction_dominant, 0)),
        max_wave_period_s: series_value(&d.wave_period_max, 0),
    }
}

pub fn weather_fields(weather: &WeatherForecast, hour: usize) -> WeatherFields {
    let h = &weather.hourly;
    let d = &weather.daily;
    WeatherFields {
        air_temp_f: celsius_to_fahrenheit(series_value(&h.temperature_2m, hour)),
        wind_speed_mph: kmh_to_mph(series_value(&h.wind_speed_10m, hour)),
        wind_direction_deg: rounded_degrees(series_value(&h.wind_direction_10m, hour)),
        wind_gust_mph: kmh_to_mph(series_value(&h.wind_gusts_10m, hour)),
        cloud_cover_pct: series_value(&h.cloud_cover, hour),
        precipitation_in: mm_to_inches(series_value(&h.precipitation, hour)),
        max_temp_f: celsius_to_fahrenheit(series_value(&d.temperature_2m_max, 0)),
        min_temp_f: celsius_to_fahrenheit(series_value(&d.temperature_2m_min, 0)),
        precipitation_sum_in: mm_to_inches(series_value(&d.precipitation_sum, 0)),
        max_wind_speed_mph: kmh_to_mph(series_value(&d.wind_speed_10m_max, 0)),
    }
}

pub fn buoy_fields(buoy: &BuoyObservation) -> BuoyFields {
    BuoyFields {
        wave_height_ft: meters_to_feet(buoy.wave_height_m),
        swell_period_s: buoy.dominant_period_s,
        wave_direction_deg: rounded_degrees(buoy.wave_direction_deg),
        water_temp_f: celsius_to_fahrenheit(buoy.water_temp_c),
        wind_speed_mph: mps_to_mph(buoy.wind_speed_mps),
        wind_direction_deg: rounded_degrees(buoy.wind_direction_deg),
        wind_gust_mph: mps_to_mph(buoy.wind_gust_mps),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub wave_height_ft: Option<f64>,
    pub wave_direction_deg: Option<f64>,
    pub swell_height_ft: Option<f64>,
    pub swell_period_s: Option<f64>,
    pub swell_direction_deg: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub air_temp_f: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub precipitation_in: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutlook {
    pub max_wave_height_ft: Option<f64>,
    pub dominant_wave_direction_deg: Option<f64>,
    pub max_wave_period_s: Option<f64>,
    pub max_temp_f: Option<f64>,
    pub min_temp_f: Option<f64>,
    pub precipitation_sum_in: Option<f64>,
    pub max_wind_speed_mph: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub id: String,
    pub name: String,
    pub distance_km: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Canonical per-spot, per-hour snapshot handed to narrative generation and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedConditions {
    pub spot_name: String,
    pub coordinate: Coordinate,
    pub hour: usize,
    pub generated_at: DateTime<Utc>,
    pub current: CurrentConditions,
    pub today: DailyOutlook,
    pub station: Option<StationInfo>,
    pub tide: Option<TideSummary>,
}

/// Combine per-provider fields under the named precedence policies
pub fn merge(
    marine: &MarineFields,
    weather: &WeatherFields,
    buoy: &BuoyFields,
) -> (CurrentConditions, DailyOutlook) {
    let sea = SEA_STATE_PRECEDENCE;
    let wind = WIND_PRECEDENCE;

    let current = CurrentConditions {
        wave_height_ft: sea.pick(buoy.wave_height_ft, marine.wave_height_ft),
        wave_direction_deg: sea.pick(buoy.wave_direction_deg, marine.wave_direction_deg),
        swell_height_ft: marine.swell_height_ft,
        swell_period_s: sea.pick(buoy.swell_period_s, marine.swell_period_s),
        swell_direction_deg: marine.swell_direction_deg,
        wind_speed_mph: wind.pick(buoy.wind_speed_mph, weather.wind_speed_mph),
        wind_direction_deg: wind.pick(buoy.wind_direction_deg, weather.wind_direction_deg),
        wind_gust_mph: wind.pick(buoy.wind_gust_mph, weather.wind_gust_mph),
        air_temp_f: weather.air_temp_f,
        water_temp_f: sea.pick(buoy.water_temp_f, marine.water_temp_f),
        cloud_cover_pct: weather.cloud_cover_pct,
        precipitation_in: weather.precipitation_in,
    };

    let today = DailyOutlook {
        max_wave_height_ft: marine.max_wave_height_ft,
        dominant_wave_direction_deg: marine.dominant_wave_direction_deg,
        max_wave_period_s: marine.max_wave_period_s,
        max_temp_f: weather.max_temp_f,
        min_temp_f: weather.min_temp_f,
        precipitation_sum_in: weather.precipitation_sum_in,
        max_wind_speed_mph: weather.max_wind_speed_mph,
    };

    (current, today)
}

/// Build the normalized snapshot for `spot` at local `hour` (0-23).
/// Any of the three inputs may be missing.
pub fn normalize(
    spot: &SurfSpot,
    hour: usize,
    marine: Option<&MarineForecast>,
    weather: Option<&WeatherForecast>,
    station: &StationReport,
    generated_at: DateTime<Utc>,
) -> NormalizedConditions {
    let marine = marine.map(|m| marine_fields(m, hour)).unwrap_or_default();
    let weather = weather.map(|w| weather_fields(w, hour)).unwrap_or_default();
    let buoy = station.buoy.as_ref().map(buoy_fields).unwrap_or_default();

    let (current, today) = merge(&marine, &weather, &buoy);

    let station_info = station.station.as_ref().map(|s| StationInfo {
        id: s.id.clone(),
        name: s.name.clone(),
        distance_km: station.distance_km.map(|d| (d * 10.0).round() / 10.0),
        observed_at: station.buoy.as_ref().map(|b| b.observed_at),
    });

    NormalizedConditions {
        spot_name: spot.name.clone(),
        coordinate: spot.coordinate,
        hour,
        generated_at,
        current,
        today,
        station: station_info,
        tide: station.tide.clone(),
    }
}
