//! Trap query routes

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::schema::TrapRow;
use crate::db::TrapFilters;
use crate::routes::{parse_rfc3339, store_error};
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrapQuery {
    pub transmitter_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub source_host: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<i64>,
}

impl TrapQuery {
    fn filters(&self) -> TrapFilters {
        TrapFilters {
            transmitter_id: self.transmitter_id,
            site_id: self.site_id,
            source_host: self.source_host.clone(),
        }
    }
}

pub async fn latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrapQuery>,
) -> Result<Json<Vec<TrapRow>>, StatusCode> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let traps = state
        .store
        .get_latest_traps(&query.filters(), limit)
        .await
        .map_err(store_error)?;
    Ok(Json(traps))
}

pub async fn range(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrapQuery>,
) -> Result<Json<Vec<TrapRow>>, StatusCode> {
    let (Some(start), Some(end)) = (query.start.as_deref(), query.end.as_deref()) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let start = parse_rfc3339(start)?;
    let end = parse_rfc3339(end)?;
    let limit = query.limit.unwrap_or(1000).clamp(1, 10_000);
    let traps = state
        .store
        .get_traps_range(start, end, &query.filters(), limit)
        .await
        .map_err(store_error)?;
    Ok(Json(traps))
}
