//! API routes

pub mod devices;
pub mod events;
pub mod poller;
pub mod sites;
pub mod transmitters;
pub mod traps;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Devices: the wire projection of transmitters
        .route(
            "/api/snmp/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/api/snmp/devices/:id",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        // Poller lifecycle and probes
        .route("/api/snmp/test", post(poller::test_device))
        .route("/api/snmp/walk", post(poller::walk))
        .route("/api/snmp/start", post(poller::start))
        .route("/api/snmp/stop", post(poller::stop))
        .route("/api/snmp/status", get(poller::status))
        .route(
            "/api/snmp/results",
            get(poller::get_results).delete(poller::clear_results),
        )
        .route("/api/snmp/events", get(events::stream))
        // Transmitters and their time series
        .route(
            "/api/snmp/transmitters",
            get(transmitters::list).post(transmitters::create),
        )
        .route(
            "/api/snmp/transmitters/:id",
            get(transmitters::get_one)
                .put(transmitters::update)
                .delete(transmitters::delete),
        )
        .route(
            "/api/snmp/transmitters/:id/metrics/latest",
            get(transmitters::latest_metrics),
        )
        .route(
            "/api/snmp/transmitters/:id/metrics",
            get(transmitters::metrics_range),
        )
        // Sites
        .route("/api/snmp/sites", get(sites::list).post(sites::create))
        .route(
            "/api/snmp/sites/:id",
            get(sites::get_one).put(sites::update).delete(sites::delete),
        )
        // Traps
        .route("/api/snmp/traps/latest", get(traps::latest))
        .route("/api/snmp/traps/range", get(traps::range))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Configuration writes keep the poller's device table eventually
/// consistent: every mutation reloads it after commit.
pub(crate) async fn sync_poller(state: &AppState) {
    if let Err(e) = state.poller.reload_from_store().await {
        warn!("poller reload after config change failed: {e}");
    }
}

/// Store errors surface as 4xx for constraint problems, 500 otherwise.
pub(crate) fn store_error(e: sqlx::Error) -> StatusCode {
    match &e {
        sqlx::Error::RowNotFound => StatusCode::BAD_REQUEST,
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::CheckViolation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, StatusCode> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StatusCode::BAD_REQUEST)
}
