//! Poller lifecycle, probes, and the in-memory result ring

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use tx_core::{is_valid_oid, DeviceResult};
use tx_snmp::{SessionConfig, SnmpClient, SnmpVersion, Varbind};

use crate::poller::sessions::test_connection;
use crate::poller::PollerStatus;
use crate::routes::store_error;
use crate::walkdump::{build_template, parse_dump, WalkTemplate};
use crate::AppState;

pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<PollerStatus>, StatusCode> {
    state.poller.start().await.map_err(store_error)?;
    info!("poller started");
    Ok(Json(state.poller.status().await))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<PollerStatus> {
    state.poller.stop().await;
    Json(state.poller.status().await)
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<PollerStatus> {
    Json(state.poller.status().await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub device_id: Option<Uuid>,
    pub limit: Option<usize>,
}

pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResultsQuery>,
) -> Json<Vec<DeviceResult>> {
    let limit = query.limit.unwrap_or(1000);
    Json(state.poller.results(query.device_id, limit).await)
}

pub async fn clear_results(State(state): State<Arc<AppState>>) -> StatusCode {
    state.poller.clear_results().await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    pub host: String,
    pub port: Option<u16>,
    pub community: Option<String>,
    pub version: Option<i32>,
    #[serde(default)]
    pub oids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn varbinds_to_json(varbinds: &[Varbind]) -> Vec<serde_json::Value> {
    varbinds
        .iter()
        .map(|vb| {
            serde_json::json!({
                "oid": vb.oid,
                "type": vb.value.type_name(),
                "value": vb.value.to_json(),
            })
        })
        .collect()
}

/// One-shot connectivity probe: session + GET + close.
pub async fn test_device(
    Json(request): Json<TestRequest>,
) -> Result<Json<TestResponse>, StatusCode> {
    if request.host.is_empty()
        || request.oids.is_empty()
        || !request.oids.iter().all(|o| is_valid_oid(o))
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    let response = match test_connection(
        &request.host,
        request.port.unwrap_or(tx_core::model::DEFAULT_SNMP_PORT),
        request
            .community
            .as_deref()
            .unwrap_or(tx_core::model::DEFAULT_COMMUNITY),
        request.version.unwrap_or(1),
        &request.oids,
    )
    .await
    {
        Ok(varbinds) => TestResponse {
            ok: true,
            data: Some(varbinds_to_json(&varbinds)),
            error: None,
        },
        Err(e) => TestResponse {
            ok: false,
            data: None,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(response))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WalkRequest {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub community: Option<String>,
    pub version: Option<i32>,
    pub root: Option<String>,
    pub name: Option<String>,
    /// Dump file to parse when the live walk fails.
    pub dump_file: Option<String>,
}

const DEFAULT_WALK_ROOT: &str = "1.3.6.1.4.1.31946";

/// Walk a subtree for template discovery. A live walk is attempted first;
/// failing that, a saved walk dump is parsed. The generated template is
/// persisted under the assets directory and returned.
pub async fn walk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WalkRequest>,
) -> Result<Json<WalkTemplate>, (StatusCode, String)> {
    let root = request
        .root
        .clone()
        .unwrap_or_else(|| DEFAULT_WALK_ROOT.to_string());
    if !is_valid_oid(&root) {
        return Err((StatusCode::BAD_REQUEST, "invalid walk root".into()));
    }

    let live = match &request.host {
        Some(host) if !host.is_empty() => walk_live(&request, host, &root).await,
        _ => Err("no host given".to_string()),
    };

    let (source, entries) = match live {
        Ok(entries) => ("walk", entries),
        Err(walk_error) => {
            let dump_path = request
                .dump_file
                .clone()
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| state.config.assets_dir.join("snmp_walk.txt"));
            warn!("live walk failed ({walk_error}), trying dump {}", dump_path.display());
            let contents = tokio::fs::read_to_string(&dump_path).await.map_err(|e| {
                (
                    StatusCode::BAD_GATEWAY,
                    format!("walk failed ({walk_error}) and dump unreadable ({e})"),
                )
            })?;
            ("dump", parse_dump(&contents, &root))
        }
    };

    let template = build_template(
        request.name.as_deref().unwrap_or("walk-template"),
        source,
        &root,
        entries,
        &state.mib,
    );

    if let Err(e) = persist_template(&state, &template).await {
        warn!("walk template not persisted: {e}");
    }

    Ok(Json(template))
}

async fn walk_live(
    request: &WalkRequest,
    host: &str,
    root: &str,
) -> Result<Vec<(String, Option<String>, serde_json::Value)>, String> {
    let config = SessionConfig::new(
        host.to_string(),
        request.port.unwrap_or(tx_core::model::DEFAULT_SNMP_PORT),
        request
            .community
            .clone()
            .unwrap_or_else(|| tx_core::model::DEFAULT_COMMUNITY.to_string()),
        SnmpVersion::from_wire(i64::from(request.version.unwrap_or(1))),
    );
    let client = SnmpClient::connect(config).await.map_err(|e| e.to_string())?;
    let varbinds = client
        .walk(root, tx_snmp::client::DEFAULT_WALK_CHUNK)
        .await
        .map_err(|e| e.to_string())?;
    if varbinds.is_empty() {
        return Err("walk returned nothing".to_string());
    }
    Ok(varbinds
        .into_iter()
        .map(|vb| {
            let value = vb.value.to_json();
            (vb.oid, Some(vb.value.type_name().to_string()), value)
        })
        .collect())
}

async fn persist_template(state: &AppState, template: &WalkTemplate) -> std::io::Result<()> {
    let dir = state.config.assets_dir.join("templates");
    tokio::fs::create_dir_all(&dir).await?;
    let file = dir.join(format!(
        "template_{}.json",
        template.generated_at.format("%Y%m%d%H%M%S")
    ));
    let json = serde_json::to_string_pretty(template).unwrap_or_default();
    tokio::fs::write(&file, json).await?;
    info!("walk template written to {}", file.display());
    Ok(())
}
