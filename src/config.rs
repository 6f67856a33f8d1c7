use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::scoring::ScoringThresholds;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("Invalid send time {hour:02}:{minute:02}")]
    InvalidSendTime { hour: u32, minute: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub marine_api_url: String,
    pub weather_api_url: String,
    pub buoy_base_url: String,
    pub tide_api_url: String,
    pub tide_api_key: Option<String>,
    pub noaa_tides_url: String,
    pub narrative_url: String,
    pub narrative_api_key: Option<String>,
    pub email_url: String,
    pub email_api_key: Option<String>,
    pub regular_template_id: String,
    pub premium_template_id: String,
    pub business_timezone: Tz,
    pub send_hour: u32,
    pub send_minute: u32,
    pub http_timeout_secs: u64,
    pub max_run_minutes: i64,
    pub premium_max_spots: usize,
    pub station_catalog_path: Option<String>,
    pub conditions_cache_ttl_minutes: u64,
    pub scoring: ScoringThresholds,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Unparseable values fall back to the default
fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let timezone = string_or("BUSINESS_TIMEZONE", "America/Los_Angeles");
        let business_timezone: Tz = timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone.clone()))?;

        let send_hour = parsed_or("SEND_HOUR", 5);
        let send_minute = parsed_or("SEND_MINUTE", 0);
        if send_hour > 23 || send_minute > 59 {
            return Err(ConfigError::InvalidSendTime {
                hour: send_hour,
                minute: send_minute,
            });
        }

        let defaults = ScoringThresholds::default();
        let scoring = ScoringThresholds {
            tide_range_min_ft: parsed_or("SCORE_TIDE_RANGE_MIN", defaults.tide_range_min_ft),
            tide_range_max_ft: parsed_or("SCORE_TIDE_RANGE_MAX", defaults.tide_range_max_ft),
            wave_height_min_ft: parsed_or("SCORE_WAVE_HEIGHT_MIN", defaults.wave_height_min_ft),
            wave_height_max_ft: parsed_or("SCORE_WAVE_HEIGHT_MAX", defaults.wave_height_max_ft),
            ..defaults
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            server_host: string_or("SERVER_HOST", "0.0.0.0"),
            server_port: parsed_or("SERVER_PORT", 8080),
            marine_api_url: string_or(
                "MARINE_API_URL",
                "https://marine-api.open-meteo.com/v1/marine",
            ),
            weather_api_url: string_or("WEATHER_API_URL", "https://api.open-meteo.com/v1/forecast"),
            buoy_base_url: string_or("BUOY_BASE_URL", "https://www.ndbc.noaa.gov/data/realtime2"),
            tide_api_url: string_or(
                "TIDE_API_URL",
                "https://api.stormglass.io/v2/tide/sea-level/point",
            ),
            tide_api_key: optional("TIDE_API_KEY"),
            noaa_tides_url: string_or(
                "NOAA_TIDES_URL",
                "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter",
            ),
            narrative_url: required("NARRATIVE_URL")?,
            narrative_api_key: optional("NARRATIVE_API_KEY"),
            email_url: required("EMAIL_URL")?,
            email_api_key: optional("EMAIL_API_KEY"),
            regular_template_id: string_or("REGULAR_TEMPLATE_ID", "daily-report"),
            premium_template_id: string_or("PREMIUM_TEMPLATE_ID", "daily-report-premium"),
            business_timezone,
            send_hour,
            send_minute,
            http_timeout_secs: parsed_or("HTTP_TIMEOUT_SECS", 10),
            max_run_minutes: parsed_or("MAX_RUN_MINUTES", 120),
            premium_max_spots: parsed_or("PREMIUM_MAX_SPOTS", 5),
            station_catalog_path: optional("STATION_CATALOG_PATH"),
            conditions_cache_ttl_minutes: parsed_or("CONDITIONS_CACHE_TTL_MINUTES", 60),
            scoring,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// A `running` lock idle for longer than this is treated as abandoned
    pub fn max_run(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.max_run_minutes.max(1))
    }

    pub fn conditions_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.conditions_cache_ttl_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "NARRATIVE_URL",
        "EMAIL_URL",
        "BUSINESS_TIMEZONE",
        "SEND_HOUR",
        "SEND_MINUTE",
        "HTTP_TIMEOUT_SECS",
        "TIDE_API_KEY",
        "SCORE_WAVE_HEIGHT_MAX",
        "PREMIUM_MAX_SPOTS",
    ];

    fn reset() {
        for var in VARS {
            env::remove_var(var);
        }
        env::set_var("DATABASE_URL", "postgres://localhost/surf_test");
        env::set_var("NARRATIVE_URL", "http://localhost:9001/narrative");
        env::set_var("EMAIL_URL", "http://localhost:9002/send");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        reset();
        let config = Config::from_env().unwrap();
        assert_eq!(config.business_timezone, chrono_tz::America::Los_Angeles);
        assert_eq!((config.send_hour, config.send_minute), (5, 0));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_run(), chrono::Duration::minutes(120));
        assert_eq!(config.premium_max_spots, 5);
        assert!(config.tide_api_key.is_none());
        assert_eq!(config.scoring, ScoringThresholds::default());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_missing_database_url() {
        reset();
        env::remove_var("DATABASE_URL");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    #[serial]
    fn test_unknown_timezone_is_rejected() {
        reset();
        env::set_var("BUSINESS_TIMEZONE", "Pacific/Atlantis");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidTimezone(_))
        ));
    }

    #[test]
    #[serial]
    fn test_out_of_range_send_time_is_rejected() {
        reset();
        env::set_var("SEND_HOUR", "25");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidSendTime { hour: 25, .. })
        ));
    }

    #[test]
    #[serial]
    fn test_overrides_and_fallbacks() {
        reset();
        env::set_var("HTTP_TIMEOUT_SECS", "not-a-number");
        env::set_var("SCORE_WAVE_HEIGHT_MAX", "8");
        env::set_var("PREMIUM_MAX_SPOTS", "3");
        env::set_var("TIDE_API_KEY", "  ");
        let config = Config::from_env().unwrap();
        assert_eq!(config.http_timeout_secs, 10);
        assert_eq!(config.scoring.wave_height_max_ft, 8.0);
        assert_eq!(config.scoring.wave_height_min_ft, 2.0);
        assert_eq!(config.premium_max_spots, 3);
        assert!(config.tide_api_key.is_none());
    }
}
