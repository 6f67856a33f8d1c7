// API integration tests that verify HTTP endpoints
// Tests the Axum router with an in-memory lock store

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt; // For `.collect()`
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot`

use surf_report_service::api::{create_router, AppState};
use surf_report_service::db::{
    Cohort, DistributionLockStore, InMemoryLockStore, RunCounts,
};

async fn create_test_app() -> axum::Router {
    let locks = Arc::new(InMemoryLockStore::new());
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

    for day in 17..=19 {
        let date = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        locks
            .try_acquire(Cohort::Regular, date, now, chrono::Duration::hours(2))
            .await
            .unwrap();
        locks
            .mark_completed(
                Cohort::Regular,
                date,
                RunCounts {
                    success_count: 40 + day as i32,
                    error_count: 1,
                    skipped_count: 3,
                },
                now,
            )
            .await
            .unwrap();
    }

    create_router(AppState { locks })
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Option<Value>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).ok())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = get_json(create_test_app().await, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.unwrap()["status"], "healthy");
}

#[tokio::test]
async fn test_get_distribution_for_date() {
    let (status, json) =
        get_json(create_test_app().await, "/api/v1/distribution/regular/2026-10-18").await;

    assert_eq!(status, StatusCode::OK);
    let json = json.unwrap();
    assert_eq!(json["cohort"], "regular");
    assert_eq!(json["run_date"], "2026-10-18");
    assert_eq!(json["state"], "completed");
    assert_eq!(json["success_count"], 58);
    assert_eq!(json["error_count"], 1);
}

#[tokio::test]
async fn test_get_distribution_not_found() {
    let (status, _) =
        get_json(create_test_app().await, "/api/v1/distribution/premium/2026-10-18").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_path_parameters_are_rejected() {
    let app = create_test_app().await;
    let (status, _) = get_json(app.clone(), "/api/v1/distribution/gold/2026-10-18").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(app, "/api/v1/distribution/regular/yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_distributions_newest_first() {
    let (status, json) = get_json(create_test_app().await, "/api/v1/distribution/regular").await;

    assert_eq!(status, StatusCode::OK);
    let runs = json.unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0]["run_date"], "2026-10-19");
    assert_eq!(runs[2]["run_date"], "2026-10-17");
}

#[tokio::test]
async fn test_openapi_spec_endpoint() {
    let (status, json) = get_json(create_test_app().await, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let json = json.unwrap();

    // Verify OpenAPI structure
    assert!(json["openapi"].is_string());
    assert_eq!(json["info"]["title"], "Surf Report Service API");
    assert!(json["paths"]["/api/v1/distribution/{cohort}/{date}"].is_object());
    assert!(json["components"]["schemas"]["DistributionLock"].is_object());
}
