use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{BuoyStation, StationCatalog};
use crate::fetch_error::FetchError;
use crate::fetchers::{BuoyFeed, BuoyObservation, TideHistorySource, TideProvider, TideQuery};
use crate::geo::{distance_km, Coordinate};
use crate::tide::TideSummary;

/// Station context for one spot: the nearest buoy, its latest row and the
/// best tide information the provider chain could produce.
#[derive(Debug, Clone, Serialize)]
pub struct StationReport {
    pub station: Option<BuoyStation>,
    pub distance_km: Option<f64>,
    pub buoy: Option<BuoyObservation>,
    pub tide: Option<TideSummary>,
}

/// Resolves a coordinate to its nearest station and runs the tide provider chain.
///
/// Providers are tried in order and the first success wins. Every failure is
/// logged and swallowed; when all fail the buoy row is still returned so wind
/// and wave context survive without tide.
#[derive(Clone)]
pub struct StationResolver {
    catalog: Arc<StationCatalog>,
    buoy_feed: Arc<dyn BuoyFeed>,
    providers: Vec<Arc<dyn TideProvider>>,
    history: Option<Arc<dyn TideHistorySource>>,
    call_timeout: Duration,
}

impl StationResolver {
    pub fn new(
        catalog: Arc<StationCatalog>,
        buoy_feed: Arc<dyn BuoyFeed>,
        providers: Vec<Arc<dyn TideProvider>>,
        history: Option<Arc<dyn TideHistorySource>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            buoy_feed,
            providers,
            history,
            call_timeout,
        }
    }

    pub fn nearest_station(&self, point: Coordinate) -> Option<&BuoyStation> {
        self.catalog.nearest(point)
    }

    #[instrument(skip(self), fields(lat = spot.latitude, lon = spot.longitude))]
    pub async fn resolve(&self, spot: Coordinate, now: DateTime<Utc>) -> StationReport {
        let station = self.catalog.nearest(spot).cloned();
        let distance = station.as_ref().map(|s| distance_km(spot, s.coordinate()));

        let buoy = match &station {
            Some(station) => {
                debug!(
                    "Nearest station {} ({}) at {:.1} km",
                    station.id,
                    station.name,
                    distance.unwrap_or_default()
                );
                match with_timeout(self.call_timeout, self.buoy_feed.fetch_latest(station)).await {
                    Ok(obs) => Some(obs),
                    Err(e) => {
                        warn!(station_id = %station.id, error = %e, "Buoy feed failed");
                        None
                    }
                }
            }
            None => {
                warn!("Station catalog is empty, skipping buoy feed");
                None
            }
        };

        let query = TideQuery {
            spot,
            station: station.as_ref(),
            buoy: buoy.as_ref(),
            now,
        };

        let mut tide = None;
        for provider in &self.providers {
            match with_timeout(self.call_timeout, provider.try_fetch(&query)).await {
                Ok(reading) => {
                    info!(
                        provider = provider.name(),
                        height_ft = reading.height_ft,
                        "Tide height resolved"
                    );
                    tide = Some(TideSummary::current_only(reading.height_ft, reading.source));
                    break;
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Tide provider failed, trying next");
                }
            }
        }

        let tide = match tide {
            Some(summary) => Some(self.attach_history(summary, spot, now).await),
            None => {
                warn!("All tide providers failed, returning report without tide");
                None
            }
        };

        StationReport {
            station,
            distance_km: distance,
            buoy,
            tide,
        }
    }

    /// History failure leaves trend and extrema unknown
    async fn attach_history(
        &self,
        summary: TideSummary,
        spot: Coordinate,
        now: DateTime<Utc>,
    ) -> TideSummary {
        let Some(history) = &self.history else {
            return summary;
        };

        match with_timeout(self.call_timeout, history.fetch_history(spot, now)).await {
            Ok(samples) => {
                debug!("Tide history returned {} samples", samples.len());
                summary.with_history(&samples, now)
            }
            Err(e) => {
                warn!(error = %e, "Tide history fetch failed, trend and extrema unknown");
                summary
            }
        }
    }
}

/// Bound an upstream call; expiry is reported like any other provider error
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, FetchError>
where
    F: std::future::Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}
