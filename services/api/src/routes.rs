use crate::infra::{AppState, ServiceEngine};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use revenue_certs::error::AppError;
use revenue_certs::workflows::certificates::{
    certificate_router, ApplicationStatusView, Certificate, UserId,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct StatisticsResponse {
    pub(crate) total: usize,
    pub(crate) by_status: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CitizenDashboard {
    pub(crate) user_id: UserId,
    pub(crate) applications: Vec<ApplicationStatusView>,
    pub(crate) certificates: Vec<Certificate>,
}

pub(crate) fn with_certificate_routes(engine: Arc<ServiceEngine>) -> axum::Router {
    certificate_router(engine.clone())
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/statistics",
            axum::routing::get(statistics_endpoint),
        )
        .route(
            "/api/v1/citizens/:user_id/dashboard",
            axum::routing::get(citizen_dashboard_endpoint),
        )
        .layer(Extension(engine))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn statistics_endpoint(
    Extension(engine): Extension<Arc<ServiceEngine>>,
) -> Result<Json<StatisticsResponse>, AppError> {
    let counts = engine.status_counts()?;
    let total = counts.values().sum();
    let by_status = counts
        .into_iter()
        .map(|(status, count)| (status.label(), count))
        .collect();
    Ok(Json(StatisticsResponse { total, by_status }))
}

pub(crate) async fn citizen_dashboard_endpoint(
    Extension(engine): Extension<Arc<ServiceEngine>>,
    Path(user_id): Path<String>,
) -> Result<Json<CitizenDashboard>, AppError> {
    let user_id = UserId(user_id);
    let applications = engine.applications_for_owner(&user_id)?;
    let certificates = engine.certificates_for_owner(&user_id)?;

    let applications = applications
        .iter()
        .map(|application| {
            let issued = certificates
                .iter()
                .find(|certificate| certificate.application_id == application.id);
            application.status_view(issued)
        })
        .collect();

    Ok(Json(CitizenDashboard {
        user_id,
        applications,
        certificates,
    }))
}
