//! Typed access to the persistence store
//!
//! The store uniquely owns all on-disk state. Poll-path writes are
//! fire-and-forget from the scheduler's point of view; everything else
//! surfaces `sqlx::Error` for the REST layer to translate.

pub mod schema;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use tx_core::model::MIN_POLL_INTERVAL_MS;
use tx_core::{ContactInfo, DeviceResult, Site, Transmitter};

use schema::{MetricRow, SiteRow, TransmitterRow, TrapRow, SCHEMA_STATEMENTS};

/// Partial site payload for create/update.
#[derive(Debug, Clone, Default)]
pub struct SiteUpsert {
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub contact_info: Option<ContactInfo>,
    pub is_active: Option<bool>,
}

/// Partial transmitter payload; insert when `id` is absent or unknown,
/// patch otherwise.
#[derive(Debug, Clone, Default)]
pub struct TransmitterUpsert {
    pub id: Option<Uuid>,
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
    pub poll_interval_ms: Option<i64>,
    pub is_active: Option<bool>,
}

/// Normalized trap ready for appending.
#[derive(Debug, Clone)]
pub struct NewTrap {
    pub transmitter_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub source_host: String,
    pub source_port: i32,
    pub community: Option<String>,
    pub version: i32,
    pub trap_oid: Option<String>,
    pub enterprise_oid: Option<String>,
    pub varbinds: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct TrapFilters {
    pub transmitter_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub source_host: Option<String>,
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> sqlx::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Idempotent schema bootstrap, safe on every start.
    pub async fn initialize_schema(&self) -> sqlx::Result<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        // TimescaleDB is optional; plain Postgres serves the same queries.
        if let Err(e) = sqlx::query(
            "SELECT create_hypertable('transmitter_metrics', 'timestamp', if_not_exists => TRUE)",
        )
        .execute(&self.pool)
        .await
        {
            debug!("transmitter_metrics stays a plain table: {e}");
        }
        info!("schema initialized");
        Ok(())
    }

    // ---- sites ----

    pub async fn list_sites(&self) -> sqlx::Result<Vec<Site>> {
        let rows = sqlx::query_as::<_, SiteRow>("SELECT * FROM sites ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Site::from).collect())
    }

    pub async fn get_site(&self, id: Uuid) -> sqlx::Result<Option<Site>> {
        let row = sqlx::query_as::<_, SiteRow>("SELECT * FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Site::from))
    }

    pub async fn create_site(&self, data: SiteUpsert) -> sqlx::Result<Site> {
        let contact = serde_json::to_string(&data.contact_info.unwrap_or_default())
            .unwrap_or_else(|_| "{}".to_string());
        let row = sqlx::query_as::<_, SiteRow>(
            r#"
            INSERT INTO sites (id, name, location, latitude, longitude, address, contact_info, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.name.unwrap_or_default())
        .bind(data.location.unwrap_or_default())
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(data.address)
        .bind(contact)
        .bind(data.is_active.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;
        Ok(Site::from(row))
    }

    pub async fn update_site(&self, id: Uuid, patch: SiteUpsert) -> sqlx::Result<Option<Site>> {
        let Some(current) = self.get_site(id).await? else {
            return Ok(None);
        };
        let contact = patch.contact_info.unwrap_or(current.contact_info);
        let contact_json =
            serde_json::to_string(&contact).unwrap_or_else(|_| "{}".to_string());
        let row = sqlx::query_as::<_, SiteRow>(
            r#"
            UPDATE sites
            SET name = $2, location = $3, latitude = $4, longitude = $5,
                address = $6, contact_info = $7, is_active = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name.unwrap_or(current.name))
        .bind(patch.location.unwrap_or(current.location))
        .bind(patch.latitude.or(current.latitude))
        .bind(patch.longitude.or(current.longitude))
        .bind(patch.address.or(current.address))
        .bind(contact_json)
        .bind(patch.is_active.unwrap_or(current.is_active))
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(Site::from(row)))
    }

    /// Cascades to transmitters, their metrics and alarms; trap references
    /// are nulled by the schema.
    pub async fn delete_site(&self, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- transmitters ----

    pub async fn list_transmitters(&self) -> sqlx::Result<Vec<Transmitter>> {
        let rows = sqlx::query_as::<_, TransmitterRow>(
            "SELECT * FROM transmitters ORDER BY display_order ASC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Transmitter::from).collect())
    }

    pub async fn get_transmitter(&self, id: Uuid) -> sqlx::Result<Option<Transmitter>> {
        let row = sqlx::query_as::<_, TransmitterRow>("SELECT * FROM transmitters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Transmitter::from))
    }

    pub async fn find_transmitters_by_host(&self, host: &str) -> sqlx::Result<Vec<Transmitter>> {
        let rows =
            sqlx::query_as::<_, TransmitterRow>("SELECT * FROM transmitters WHERE snmp_host = $1")
                .bind(host)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Transmitter::from).collect())
    }

    pub async fn upsert_transmitter(&self, data: TransmitterUpsert) -> sqlx::Result<Transmitter> {
        let existing = match data.id {
            Some(id) => self.get_transmitter(id).await?,
            None => None,
        };

        let row = match existing {
            Some(current) => {
                let interval = data
                    .poll_interval_ms
                    .unwrap_or(current.poll_interval_ms)
                    .max(MIN_POLL_INTERVAL_MS);
                sqlx::query_as::<_, TransmitterRow>(
                    r#"
                    UPDATE transmitters
                    SET site_id = $2, name = $3, display_label = $4, display_order = $5,
                        frequency_mhz = $6, power_w = $7, snmp_host = $8, snmp_port = $9,
                        snmp_community = $10, snmp_version = $11, oids = $12,
                        poll_interval = $13, is_active = $14, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(current.id)
                .bind(data.site_id.unwrap_or(current.site_id))
                .bind(data.name.unwrap_or(current.name))
                .bind(data.display_label.or(current.display_label))
                .bind(data.display_order.unwrap_or(current.display_order))
                .bind(data.frequency_mhz.or(current.frequency_mhz))
                .bind(data.power_w.or(current.power_w))
                .bind(data.snmp_host.unwrap_or(current.snmp_host))
                .bind(i32::from(data.snmp_port.unwrap_or(current.snmp_port)))
                .bind(data.snmp_community.unwrap_or(current.snmp_community))
                .bind(data.snmp_version.unwrap_or(current.snmp_version))
                .bind(data.oids.unwrap_or(current.oids))
                .bind(interval as i32)
                .bind(data.is_active.unwrap_or(current.is_active))
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                let site_id = data.site_id.ok_or(sqlx::Error::RowNotFound)?;
                let interval = data
                    .poll_interval_ms
                    .unwrap_or(tx_core::model::DEFAULT_POLL_INTERVAL_MS)
                    .max(MIN_POLL_INTERVAL_MS);
                sqlx::query_as::<_, TransmitterRow>(
                    r#"
                    INSERT INTO transmitters
                        (id, site_id, name, display_label, display_order, frequency_mhz,
                         power_w, status, snmp_host, snmp_port, snmp_community,
                         snmp_version, oids, poll_interval, is_active)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, 'unknown', $8, $9, $10, $11, $12, $13, $14)
                    RETURNING *
                    "#,
                )
                .bind(data.id.unwrap_or_else(Uuid::new_v4))
                .bind(site_id)
                .bind(data.name.unwrap_or_default())
                .bind(data.display_label)
                .bind(data.display_order.unwrap_or(0))
                .bind(data.frequency_mhz)
                .bind(data.power_w)
                .bind(data.snmp_host.unwrap_or_default())
                .bind(i32::from(
                    data.snmp_port.unwrap_or(tx_core::model::DEFAULT_SNMP_PORT),
                ))
                .bind(
                    data.snmp_community
                        .unwrap_or_else(|| tx_core::model::DEFAULT_COMMUNITY.to_string()),
                )
                .bind(data.snmp_version.unwrap_or(1))
                .bind(data.oids.unwrap_or_default())
                .bind(interval as i32)
                .bind(data.is_active.unwrap_or(true))
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(Transmitter::from(row))
    }

    pub async fn delete_transmitter(&self, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM transmitters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activity gate for one poll tick: transmitter and owning site must
    /// both be active. A vanished transmitter gates off.
    pub async fn poll_gate(&self, id: Uuid) -> sqlx::Result<bool> {
        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT t.is_active AND s.is_active
            FROM transmitters t
            JOIN sites s ON s.id = t.site_id
            WHERE t.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(allowed.unwrap_or(false))
    }

    // ---- metrics ----

    /// Append one observation. A transmitter deleted mid-flight makes this
    /// a logged no-op; the polling loop must never see the failure.
    pub async fn store_metrics(
        &self,
        transmitter_id: Uuid,
        result: &DeviceResult,
    ) -> sqlx::Result<()> {
        let Some(current) = self.get_transmitter(transmitter_id).await? else {
            debug!(%transmitter_id, "dropping metrics for unknown transmitter");
            return Ok(());
        };

        let data = result.data.as_ref();
        let status = data
            .map(|d| d.status.as_str())
            .unwrap_or(tx_core::TransmitterStatus::Offline.as_str());

        sqlx::query(
            r#"
            INSERT INTO transmitter_metrics
                (transmitter_id, timestamp, power_output, forward_power, reflected_power,
                 frequency, vswr, temperature, status, raw_data, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (transmitter_id, timestamp) DO NOTHING
            "#,
        )
        .bind(transmitter_id)
        .bind(result.timestamp)
        .bind(data.and_then(|d| d.power_output))
        .bind(data.and_then(|d| d.forward_power))
        .bind(data.and_then(|d| d.reflected_power))
        .bind(data.and_then(|d| d.frequency_mhz))
        .bind(data.and_then(|d| d.vswr))
        .bind(data.and_then(|d| d.temperature))
        .bind(status)
        .bind(data.map(|d| d.raw.clone()))
        .bind(result.error.as_deref())
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE transmitters SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(transmitter_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        // Radio-name passthrough: the agent's own station name wins over a
        // stale configured one.
        if let Some(name) = data.and_then(|d| d.proposed_name.as_deref()) {
            if name != current.name {
                info!(%transmitter_id, from = %current.name, to = %name, "renaming transmitter from radio-name OID");
                sqlx::query("UPDATE transmitters SET name = $2, updated_at = NOW() WHERE id = $1")
                    .bind(transmitter_id)
                    .bind(name)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    pub async fn get_latest_metrics(&self, id: Uuid) -> sqlx::Result<Option<MetricRow>> {
        sqlx::query_as::<_, MetricRow>(
            "SELECT * FROM transmitter_metrics WHERE transmitter_id = $1 ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Newest observation per transmitter, for the SSE update payload.
    pub async fn get_all_latest_metrics(&self) -> sqlx::Result<Vec<MetricRow>> {
        sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT DISTINCT ON (transmitter_id) *
            FROM transmitter_metrics
            ORDER BY transmitter_id, timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_metrics_range(
        &self,
        id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> sqlx::Result<Vec<MetricRow>> {
        sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT * FROM transmitter_metrics
            WHERE transmitter_id = $1 AND timestamp >= $2 AND timestamp <= $3
            ORDER BY timestamp DESC
            LIMIT $4
            "#,
        )
        .bind(id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    // ---- traps ----

    pub async fn store_trap(&self, trap: &NewTrap) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snmp_traps
                (id, transmitter_id, site_id, source_host, source_port, community,
                 version, trap_oid, enterprise_oid, varbinds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trap.transmitter_id)
        .bind(trap.site_id)
        .bind(&trap.source_host)
        .bind(trap.source_port)
        .bind(trap.community.as_deref())
        .bind(trap.version)
        .bind(trap.trap_oid.as_deref())
        .bind(trap.enterprise_oid.as_deref())
        .bind(&trap.varbinds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_latest_traps(
        &self,
        filters: &TrapFilters,
        limit: i64,
    ) -> sqlx::Result<Vec<TrapRow>> {
        sqlx::query_as::<_, TrapRow>(
            r#"
            SELECT * FROM snmp_traps
            WHERE ($1::uuid IS NULL OR transmitter_id = $1)
              AND ($2::uuid IS NULL OR site_id = $2)
              AND ($3::text IS NULL OR source_host = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filters.transmitter_id)
        .bind(filters.site_id)
        .bind(filters.source_host.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_traps_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: &TrapFilters,
        limit: i64,
    ) -> sqlx::Result<Vec<TrapRow>> {
        sqlx::query_as::<_, TrapRow>(
            r#"
            SELECT * FROM snmp_traps
            WHERE created_at >= $1 AND created_at <= $2
              AND ($3::uuid IS NULL OR transmitter_id = $3)
              AND ($4::uuid IS NULL OR site_id = $4)
              AND ($5::text IS NULL OR source_host = $5)
            ORDER BY created_at DESC
            LIMIT $6
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(filters.transmitter_id)
        .bind(filters.site_id)
        .bind(filters.source_host.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
