//! Device routes
//!
//! A "device" is the wire projection of a transmitter: just the SNMP
//! connection tuple plus display metadata, the shape the polling UI works
//! with.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tx_core::{is_valid_oid, Transmitter};

use crate::db::TransmitterUpsert;
use crate::routes::{store_error, sync_poller};
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub community: String,
    /// 0 = v1, 1 = v2c.
    pub version: i32,
    pub oids: Vec<String>,
    pub poll_interval: i64,
    pub is_active: bool,
    pub name: String,
    pub label: Option<String>,
    pub display_order: i32,
    pub site_id: Uuid,
}

impl From<Transmitter> for DeviceView {
    fn from(t: Transmitter) -> Self {
        DeviceView {
            id: t.id,
            host: t.snmp_host,
            port: t.snmp_port,
            community: t.snmp_community,
            version: t.snmp_version,
            oids: t.oids,
            poll_interval: t.poll_interval_ms,
            is_active: t.is_active,
            name: t.name,
            label: t.display_label,
            display_order: t.display_order,
            site_id: t.site_id,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicePayload {
    pub site_id: Option<Uuid>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub community: Option<String>,
    pub version: Option<i32>,
    pub oids: Option<Vec<String>>,
    pub poll_interval: Option<i64>,
    pub is_active: Option<bool>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub display_order: Option<i32>,
}

impl DevicePayload {
    fn validate(&self) -> Result<(), StatusCode> {
        if let Some(oids) = &self.oids {
            if !oids.iter().all(|o| is_valid_oid(o)) {
                return Err(StatusCode::BAD_REQUEST);
            }
        }
        if let Some(version) = self.version {
            if !matches!(version, 0 | 1) {
                return Err(StatusCode::BAD_REQUEST);
            }
        }
        Ok(())
    }

    fn into_upsert(self, id: Option<Uuid>) -> TransmitterUpsert {
        TransmitterUpsert {
            id,
            site_id: self.site_id,
            name: self.name,
            display_label: self.label,
            display_order: self.display_order,
            snmp_host: self.host,
            snmp_port: self.port,
            snmp_community: self.community,
            snmp_version: self.version,
            oids: self.oids,
            poll_interval_ms: self.poll_interval,
            is_active: self.is_active,
            ..Default::default()
        }
    }
}

pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceView>>, StatusCode> {
    let transmitters = state.store.list_transmitters().await.map_err(store_error)?;
    Ok(Json(transmitters.into_iter().map(DeviceView::from).collect()))
}

pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeviceView>, StatusCode> {
    let transmitter = state
        .store
        .get_transmitter(id)
        .await
        .map_err(store_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(DeviceView::from(transmitter)))
}

pub async fn create_device(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevicePayload>,
) -> Result<Json<DeviceView>, StatusCode> {
    payload.validate()?;
    if payload.site_id.is_none() || payload.host.as_deref().map_or(true, str::is_empty) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let created = state
        .store
        .upsert_transmitter(payload.into_upsert(None))
        .await
        .map_err(store_error)?;
    sync_poller(&state).await;
    Ok(Json(DeviceView::from(created)))
}

pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DevicePayload>,
) -> Result<Json<DeviceView>, StatusCode> {
    payload.validate()?;
    if state
        .store
        .get_transmitter(id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(StatusCode::NOT_FOUND);
    }
    let updated = state
        .store
        .upsert_transmitter(payload.into_upsert(Some(id)))
        .await
        .map_err(store_error)?;
    sync_poller(&state).await;
    Ok(Json(DeviceView::from(updated)))
}

pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let removed = state.store.delete_transmitter(id).await.map_err(store_error)?;
    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    sync_poller(&state).await;
    Ok(StatusCode::NO_CONTENT)
}
