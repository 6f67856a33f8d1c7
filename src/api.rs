use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{OpenApi, ToSchema};

use crate::db::{Cohort, DistributionLock, DistributionLockStore, LockState, RunCounts};

/// Number of lock records returned by the history endpoint
pub const HISTORY_LIMIT: i64 = 30;

#[derive(Clone)]
pub struct AppState {
    pub locks: Arc<dyn DistributionLockStore>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Surf Report Service API",
        description = "Operator view of the daily surf report distribution"
    ),
    paths(health, get_distribution, list_distributions),
    components(schemas(HealthResponse, DistributionLock, LockState, Cohort, RunCounts)),
    tags(
        (name = "health", description = "Liveness"),
        (name = "distribution", description = "Daily distribution lock records")
    )
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/distribution/{cohort}", get(list_distributions))
        .route("/distribution/{cohort}/{date}", get(get_distribution))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(generate_openapi_spec())
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/distribution/{cohort}/{date}",
    tag = "distribution",
    params(
        ("cohort" = Cohort, Path, description = "regular or premium"),
        ("date" = String, Path, description = "Business date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Lock record for the date", body = DistributionLock),
        (status = 404, description = "No run for that date")
    )
)]
#[instrument(skip(state), fields(cohort = %cohort, run_date = %date))]
async fn get_distribution(
    State(state): State<AppState>,
    Path((cohort, date)): Path<(Cohort, NaiveDate)>,
) -> Result<Json<DistributionLock>, StatusCode> {
    let lock = state
        .locks
        .get(cohort, date)
        .await
        .map_err(|e| {
            error!("Failed to fetch {} distribution for {}: {}", cohort, date, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            warn!("No {} distribution recorded for {}", cohort, date);
            StatusCode::NOT_FOUND
        })?;

    info!(state = lock.state.as_str(), "Retrieved distribution lock");
    Ok(Json(lock))
}

#[utoipa::path(
    get,
    path = "/api/v1/distribution/{cohort}",
    tag = "distribution",
    params(("cohort" = Cohort, Path, description = "regular or premium")),
    responses((status = 200, description = "Most recent runs, newest first", body = [DistributionLock]))
)]
#[instrument(skip(state), fields(cohort = %cohort))]
async fn list_distributions(
    State(state): State<AppState>,
    Path(cohort): Path<Cohort>,
) -> Result<Json<Vec<DistributionLock>>, StatusCode> {
    let locks = state
        .locks
        .list_recent(cohort, HISTORY_LIMIT)
        .await
        .map_err(|e| {
            error!("Failed to list {} distributions: {}", cohort, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("Retrieved {} {} distribution records", locks.len(), cohort);
    Ok(Json(locks))
}
