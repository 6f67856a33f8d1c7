use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{SpotCatalog, SurfSpot};
use crate::conditions::{normalize, NormalizedConditions};
use crate::fetchers::{MarineSource, WeatherSource};
use crate::station_resolver::{with_timeout, StationResolver};
use crate::store::KeyValueStore;

#[derive(Debug, thiserror::Error)]
pub enum ConditionsError {
    #[error("Unknown surf spot: {0}")]
    UnknownSpot(String),
    #[error("No upstream data available for {0}")]
    NoData(String),
}

/// Produces `NormalizedConditions` for a named spot at the current local hour.
///
/// Marine, weather and station lookups run concurrently and each is bounded by
/// the call timeout. Results are memoized per spot and local hour so users who
/// share a spot within one run reuse the same snapshot.
#[derive(Clone)]
pub struct ConditionsService {
    marine: Arc<dyn MarineSource>,
    weather: Arc<dyn WeatherSource>,
    resolver: StationResolver,
    spots: Arc<SpotCatalog>,
    cache: Arc<dyn KeyValueStore>,
    cache_ttl: Duration,
    call_timeout: Duration,
    timezone: Tz,
}

impl ConditionsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        marine: Arc<dyn MarineSource>,
        weather: Arc<dyn WeatherSource>,
        resolver: StationResolver,
        spots: Arc<SpotCatalog>,
        cache: Arc<dyn KeyValueStore>,
        cache_ttl: Duration,
        call_timeout: Duration,
        timezone: Tz,
    ) -> Self {
        Self {
            marine,
            weather,
            resolver,
            spots,
            cache,
            cache_ttl,
            call_timeout,
            timezone,
        }
    }

    #[instrument(skip(self), fields(spot = %spot_name))]
    pub async fn conditions_for(
        &self,
        spot_name: &str,
        now: DateTime<Utc>,
    ) -> Result<NormalizedConditions, ConditionsError> {
        let spot = self
            .spots
            .resolve(spot_name)
            .ok_or_else(|| ConditionsError::UnknownSpot(spot_name.to_string()))?;

        let local = now.with_timezone(&self.timezone);
        let hour = local.hour() as usize;
        let key = cache_key(spot, &local.date_naive().to_string(), hour);

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_value::<NormalizedConditions>(cached) {
                Ok(conditions) => {
                    debug!("Conditions cache hit");
                    return Ok(conditions);
                }
                Err(e) => warn!(error = %e, "Discarding unreadable cache entry"),
            }
        }

        let conditions = self.fetch(spot, hour, now).await?;

        match serde_json::to_value(&conditions) {
            Ok(value) => self.cache.set(&key, value, self.cache_ttl).await,
            Err(e) => warn!(error = %e, "Failed to serialize conditions for cache"),
        }

        Ok(conditions)
    }

    async fn fetch(
        &self,
        spot: &SurfSpot,
        hour: usize,
        now: DateTime<Utc>,
    ) -> Result<NormalizedConditions, ConditionsError> {
        let (marine, weather, station) = tokio::join!(
            with_timeout(self.call_timeout, self.marine.fetch_marine(spot.coordinate)),
            with_timeout(self.call_timeout, self.weather.fetch_weather(spot.coordinate)),
            self.resolver.resolve(spot.coordinate, now),
        );

        let marine = marine
            .map_err(|e| warn!(error = %e, "Marine forecast unavailable"))
            .ok();
        let weather = weather
            .map_err(|e| warn!(error = %e, "Weather forecast unavailable"))
            .ok();

        if marine.is_none() && weather.is_none() && station.buoy.is_none() {
            return Err(ConditionsError::NoData(spot.name.clone()));
        }

        let conditions = normalize(spot, hour, marine.as_ref(), weather.as_ref(), &station, now);
        info!(
            hour,
            wave_height_ft = ?conditions.current.wave_height_ft,
            has_tide = conditions.tide.is_some(),
            "Normalized conditions"
        );
        Ok(conditions)
    }
}

fn cache_key(spot: &SurfSpot, local_date: &str, hour: usize) -> String {
    format!(
        "conditions:{}:{}:{:02}",
        spot.name.to_lowercase(),
        local_date,
        hour
    )
}
