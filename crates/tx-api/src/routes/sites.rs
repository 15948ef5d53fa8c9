//! Site routes

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use tx_core::{ContactInfo, Site};

use crate::db::SiteUpsert;
use crate::routes::{store_error, sync_poller};
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SitePayload {
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    /// Structured object, or the legacy bare-email string form.
    pub contact_info: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

fn contact_from_value(value: serde_json::Value) -> ContactInfo {
    match value {
        serde_json::Value::String(s) => ContactInfo::normalize(&s),
        other => serde_json::from_value(other).unwrap_or_default(),
    }
}

impl From<SitePayload> for SiteUpsert {
    fn from(payload: SitePayload) -> Self {
        SiteUpsert {
            name: payload.name,
            location: payload.location,
            latitude: payload.latitude,
            longitude: payload.longitude,
            address: payload.address,
            contact_info: payload.contact_info.map(contact_from_value),
            is_active: payload.is_active,
        }
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Site>>, StatusCode> {
    let sites = state.store.list_sites().await.map_err(store_error)?;
    Ok(Json(sites))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Site>, StatusCode> {
    let site = state
        .store
        .get_site(id)
        .await
        .map_err(store_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(site))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SitePayload>,
) -> Result<Json<Site>, StatusCode> {
    if payload.name.as_deref().map_or(true, str::is_empty) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let site = state
        .store
        .create_site(payload.into())
        .await
        .map_err(store_error)?;
    sync_poller(&state).await;
    Ok(Json(site))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SitePayload>,
) -> Result<Json<Site>, StatusCode> {
    let site = state
        .store
        .update_site(id, payload.into())
        .await
        .map_err(store_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    sync_poller(&state).await;
    Ok(Json(site))
}

/// Removes the site and cascades through its transmitters, their metrics
/// and alarms; traps keep their rows with nulled references.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let removed = state.store.delete_site(id).await.map_err(store_error)?;
    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    sync_poller(&state).await;
    Ok(StatusCode::NO_CONTENT)
}
