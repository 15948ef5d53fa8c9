//! Schema bootstrap and row types
//!
//! The DDL is idempotent and additive only, so running it on every start is
//! safe. Pre-existing installations gain the `display_label` and
//! `display_order` columns, the 10 s poll-interval default, and the trap
//! table without manual migration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use tx_core::{ContactInfo, Site, Transmitter, TransmitterStatus};

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sites (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        location TEXT NOT NULL DEFAULT '',
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        address TEXT,
        contact_info TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transmitters (
        id UUID PRIMARY KEY,
        site_id UUID NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        display_label TEXT,
        display_order INTEGER NOT NULL DEFAULT 0,
        frequency_mhz DOUBLE PRECISION,
        power_w DOUBLE PRECISION,
        status TEXT NOT NULL DEFAULT 'unknown',
        snmp_host TEXT NOT NULL,
        snmp_port INTEGER NOT NULL DEFAULT 161,
        snmp_community TEXT NOT NULL DEFAULT 'public',
        snmp_version INTEGER NOT NULL DEFAULT 1,
        oids TEXT[] NOT NULL DEFAULT '{}',
        poll_interval INTEGER NOT NULL DEFAULT 10000,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Columns added after the original rollout.
    "ALTER TABLE transmitters ADD COLUMN IF NOT EXISTS display_label TEXT",
    "ALTER TABLE transmitters ADD COLUMN IF NOT EXISTS display_order INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE transmitters ALTER COLUMN poll_interval SET DEFAULT 10000",
    // Migrate rows still carrying the legacy 30 s interval.
    "UPDATE transmitters SET poll_interval = 10000 WHERE poll_interval IS NULL OR poll_interval = 30000",
    r#"
    CREATE TABLE IF NOT EXISTS transmitter_metrics (
        transmitter_id UUID NOT NULL REFERENCES transmitters(id) ON DELETE CASCADE,
        timestamp TIMESTAMPTZ NOT NULL,
        power_output DOUBLE PRECISION,
        forward_power DOUBLE PRECISION,
        reflected_power DOUBLE PRECISION,
        frequency DOUBLE PRECISION,
        vswr DOUBLE PRECISION,
        temperature DOUBLE PRECISION,
        status TEXT,
        raw_data JSONB,
        error TEXT,
        PRIMARY KEY (transmitter_id, timestamp)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alarms (
        id UUID PRIMARY KEY,
        transmitter_id UUID REFERENCES transmitters(id) ON DELETE CASCADE,
        site_id UUID REFERENCES sites(id) ON DELETE CASCADE,
        severity TEXT NOT NULL,
        alarm_type TEXT NOT NULL,
        message TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        acknowledged_by TEXT,
        acknowledged_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS snmp_traps (
        id UUID PRIMARY KEY,
        transmitter_id UUID REFERENCES transmitters(id) ON DELETE SET NULL,
        site_id UUID REFERENCES sites(id) ON DELETE SET NULL,
        source_host TEXT NOT NULL,
        source_port INTEGER NOT NULL DEFAULT 0,
        community TEXT,
        version INTEGER NOT NULL DEFAULT 1,
        trap_oid TEXT,
        enterprise_oid TEXT,
        varbinds JSONB NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_snmp_traps_created_at ON snmp_traps (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_snmp_traps_source_host ON snmp_traps (source_host)",
    "CREATE INDEX IF NOT EXISTS idx_snmp_traps_transmitter_id ON snmp_traps (transmitter_id)",
];

#[derive(Debug, FromRow)]
pub struct SiteRow {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub contact_info: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Site {
            id: row.id,
            name: row.name,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            contact_info: ContactInfo::normalize(row.contact_info.as_deref().unwrap_or("")),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TransmitterRow {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub display_label: Option<String>,
    pub display_order: i32,
    pub frequency_mhz: Option<f64>,
    pub power_w: Option<f64>,
    pub status: String,
    pub snmp_host: String,
    pub snmp_port: i32,
    pub snmp_community: String,
    pub snmp_version: i32,
    pub oids: Vec<String>,
    pub poll_interval: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransmitterRow> for Transmitter {
    fn from(row: TransmitterRow) -> Self {
        Transmitter {
            id: row.id,
            site_id: row.site_id,
            name: row.name,
            display_label: row.display_label,
            display_order: row.display_order,
            frequency_mhz: row.frequency_mhz,
            power_w: row.power_w,
            status: TransmitterStatus::from_str_lossy(&row.status),
            snmp_host: row.snmp_host,
            snmp_port: u16::try_from(row.snmp_port).unwrap_or(161),
            snmp_community: row.snmp_community,
            snmp_version: row.snmp_version,
            oids: row.oids,
            poll_interval_ms: i64::from(row.poll_interval),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// One stored time-series observation.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub transmitter_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub power_output: Option<f64>,
    pub forward_power: Option<f64>,
    pub reflected_power: Option<f64>,
    pub frequency: Option<f64>,
    pub vswr: Option<f64>,
    pub temperature: Option<f64>,
    pub status: Option<String>,
    pub raw_data: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// One stored trap notification.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapRow {
    pub id: Uuid,
    pub transmitter_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub source_host: String,
    pub source_port: i32,
    pub community: Option<String>,
    pub version: i32,
    pub trap_oid: Option<String>,
    pub enterprise_oid: Option<String>,
    pub varbinds: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
