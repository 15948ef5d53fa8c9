//! Transmitter routes and their time-series queries

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use tx_core::{is_valid_oid, Transmitter};

use crate::db::schema::MetricRow;
use crate::db::TransmitterUpsert;
use crate::routes::{parse_rfc3339, store_error, sync_poller};
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TransmitterPayload {
    pub site_id: Option<Uuid>,
    pub name: Option<String>,
    pub display_label: Option<String>,
    pub display_order: Option<i32>,
    pub frequency_mhz: Option<f64>,
    pub power_w: Option<f64>,
    pub snmp_host: Option<String>,
    pub snmp_port: Option<u16>,
    pub snmp_community: Option<String>,
    pub snmp_version: Option<i32>,
    pub oids: Option<Vec<String>>,
    pub poll_interval: Option<i64>,
    pub is_active: Option<bool>,
}

impl TransmitterPayload {
    fn validate(&self) -> Result<(), StatusCode> {
        if let Some(oids) = &self.oids {
            if !oids.iter().all(|o| is_valid_oid(o)) {
                return Err(StatusCode::BAD_REQUEST);
            }
        }
        if let Some(version) = self.snmp_version {
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
            display_label: self.display_label,
            display_order: self.display_order,
            frequency_mhz: self.frequency_mhz,
            power_w: self.power_w,
            snmp_host: self.snmp_host,
            snmp_port: self.snmp_port,
            snmp_community: self.snmp_community,
            snmp_version: self.snmp_version,
            oids: self.oids,
            poll_interval_ms: self.poll_interval,
            is_active: self.is_active,
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Transmitter>>, StatusCode> {
    let transmitters = state.store.list_transmitters().await.map_err(store_error)?;
    Ok(Json(transmitters))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transmitter>, StatusCode> {
    let transmitter = state
        .store
        .get_transmitter(id)
        .await
        .map_err(store_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(transmitter))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TransmitterPayload>,
) -> Result<Json<Transmitter>, StatusCode> {
    payload.validate()?;
    if payload.site_id.is_none() || payload.snmp_host.as_deref().map_or(true, str::is_empty) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let created = state
        .store
        .upsert_transmitter(payload.into_upsert(None))
        .await
        .map_err(store_error)?;
    sync_poller(&state).await;
    Ok(Json(created))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransmitterPayload>,
) -> Result<Json<Transmitter>, StatusCode> {
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
    Ok(Json(updated))
}

pub async fn delete(
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

pub async fn latest_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<MetricRow>>, StatusCode> {
    if state
        .store
        .get_transmitter(id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(StatusCode::NOT_FOUND);
    }
    let latest = state.store.get_latest_metrics(id).await.map_err(store_error)?;
    Ok(Json(latest))
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<i64>,
}

pub async fn metrics_range(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<MetricRow>>, StatusCode> {
    let (Some(start), Some(end)) = (query.start.as_deref(), query.end.as_deref()) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let start = parse_rfc3339(start)?;
    let end = parse_rfc3339(end)?;
    let limit = query.limit.unwrap_or(1000).clamp(1, 10_000);
    let rows = state
        .store
        .get_metrics_range(id, start, end, limit)
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}
