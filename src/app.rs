use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::catalog::{SpotCatalog, StationCatalog};
use crate::collaborators::{HttpEmailDispatcher, HttpNarrativeGenerator};
use crate::config::Config;
use crate::db::{
    Cohort, DistributionLockRepository, DistributionLockStore, SurferDirectory, SurferRepository,
};
use crate::fetchers::{
    build_http_client, BuoyTideProvider, NdbcBuoyFetcher, NoaaPredictionProvider,
    OpenMeteoMarineFetcher, OpenMeteoWeatherFetcher, StormglassTideProvider, TideHistorySource,
    TideProvider,
};
use crate::scheduler;
use crate::services::{ConditionsService, ReportService, ReportSettings};
use crate::station_resolver::StationResolver;
use crate::store::InMemoryStore;
use crate::workers::distribution_coordinator::DistributionCoordinator;

/// Upper bound on memoized spot snapshots
const CONDITIONS_CACHE_ENTRIES: usize = 512;

/// Report pipeline and one coordinator per cohort, wired from config
pub struct Engine {
    pub locks: Arc<dyn DistributionLockStore>,
    pub regular: Arc<DistributionCoordinator>,
    pub premium: Arc<DistributionCoordinator>,
}

impl Engine {
    pub fn from_pool(config: &Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        let locks: Arc<dyn DistributionLockStore> =
            Arc::new(DistributionLockRepository::new(pool.clone()));
        let directory: Arc<dyn SurferDirectory> = Arc::new(SurferRepository::new(pool));
        Self::build(config, locks, directory)
    }

    pub fn build(
        config: &Config,
        locks: Arc<dyn DistributionLockStore>,
        directory: Arc<dyn SurferDirectory>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let client = build_http_client(config.http_timeout())?;
        let timezone = config.business_timezone.name().to_string();

        let stations = match &config.station_catalog_path {
            Some(path) => {
                info!("Loading station catalog from {}", path);
                StationCatalog::from_json_file(path)?
            }
            None => StationCatalog::builtin(),
        };
        info!("Station catalog has {} stations", stations.stations().len());

        // Chain order: buoy row, coordinate-based tide API, station predictions
        let stormglass = Arc::new(StormglassTideProvider::new(
            client.clone(),
            config.tide_api_url.clone(),
            config.tide_api_key.clone(),
        ));
        let providers: Vec<Arc<dyn TideProvider>> = vec![
            Arc::new(BuoyTideProvider),
            stormglass.clone(),
            Arc::new(NoaaPredictionProvider::new(
                client.clone(),
                config.noaa_tides_url.clone(),
            )),
        ];
        let history: Option<Arc<dyn TideHistorySource>> = if config.tide_api_key.is_some() {
            Some(stormglass)
        } else {
            info!("TIDE_API_KEY not set, tide trend and extrema will be unknown");
            None
        };

        let resolver = StationResolver::new(
            Arc::new(stations),
            Arc::new(NdbcBuoyFetcher::new(
                client.clone(),
                config.buoy_base_url.clone(),
            )),
            providers,
            history,
            config.http_timeout(),
        );

        let conditions = ConditionsService::new(
            Arc::new(OpenMeteoMarineFetcher::new(
                client.clone(),
                config.marine_api_url.clone(),
                timezone.clone(),
            )),
            Arc::new(OpenMeteoWeatherFetcher::new(
                client.clone(),
                config.weather_api_url.clone(),
                timezone,
            )),
            resolver,
            Arc::new(SpotCatalog::builtin()),
            Arc::new(InMemoryStore::new(CONDITIONS_CACHE_ENTRIES)),
            config.conditions_cache_ttl(),
            config.http_timeout(),
            config.business_timezone,
        );

        let reports = ReportService::new(
            directory.clone(),
            conditions,
            Arc::new(HttpNarrativeGenerator::new(
                client.clone(),
                config.narrative_url.clone(),
                config.narrative_api_key.clone(),
            )),
            Arc::new(HttpEmailDispatcher::new(
                client,
                config.email_url.clone(),
                config.email_api_key.clone(),
            )),
            ReportSettings {
                thresholds: config.scoring,
                premium_max_spots: config.premium_max_spots,
                regular_template_id: config.regular_template_id.clone(),
                premium_template_id: config.premium_template_id.clone(),
            },
        );

        let coordinator = |cohort| {
            Arc::new(DistributionCoordinator::new(
                cohort,
                locks.clone(),
                directory.clone(),
                reports.clone(),
                config.max_run(),
            ))
        };

        Ok(Self {
            regular: coordinator(Cohort::Regular),
            premium: coordinator(Cohort::Premium),
            locks,
        })
    }

    pub fn coordinator(&self, cohort: Cohort) -> Arc<DistributionCoordinator> {
        match cohort {
            Cohort::Regular => self.regular.clone(),
            Cohort::Premium => self.premium.clone(),
        }
    }
}

/// Application with all spawned background tasks and server
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub scheduler_handles: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the engine and spawn:
    /// - HTTP API server (Axum)
    /// - one daily distribution scheduler per cohort
    pub async fn build(config: Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let engine = Engine::from_pool(&config, pool)?;

        info!(
            "Scheduling daily distribution at {:02}:{:02} {}",
            config.send_hour, config.send_minute, config.business_timezone
        );
        let scheduler_handles = [Cohort::Regular, Cohort::Premium]
            .into_iter()
            .map(|cohort| {
                let coordinator = engine.coordinator(cohort);
                let tz = config.business_timezone;
                let (hour, minute) = (config.send_hour, config.send_minute);
                tokio::spawn(async move {
                    scheduler::start_daily_scheduler(coordinator, tz, hour, minute).await;
                })
            })
            .collect();

        let app_state = AppState {
            locks: engine.locks.clone(),
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            scheduler_handles,
        })
    }

    /// Run until the server stops; schedulers run in the background
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
