//! Per-device SNMP session registry
//!
//! Sessions survive transient errors; they are recycled only when a
//! connection-affecting parameter changes or the device goes away. The map
//! lock is never held across a UDP round-trip.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use tx_core::Transmitter;
use tx_snmp::{SessionConfig, SnmpClient, SnmpResult, SnmpVersion, Varbind};

fn session_config(t: &Transmitter) -> SessionConfig {
    SessionConfig::new(
        t.snmp_host.clone(),
        t.snmp_port,
        t.snmp_community.clone(),
        SnmpVersion::from_wire(i64::from(t.snmp_version)),
    )
}

#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<Uuid, Arc<SnmpClient>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the device's session, opening or recycling as needed.
    pub async fn open(&self, t: &Transmitter) -> SnmpResult<Arc<SnmpClient>> {
        let wanted = session_config(t);
        {
            let sessions = self.sessions.lock().await;
            if let Some(client) = sessions.get(&t.id) {
                if client.config() == &wanted {
                    return Ok(client.clone());
                }
                debug!(device = %t.id, "connection parameters changed, recycling session");
            }
        }
        let client = Arc::new(SnmpClient::connect(wanted).await?);
        self.sessions.lock().await.insert(t.id, client.clone());
        Ok(client)
    }

    /// GET through the device's session.
    pub async fn get(&self, t: &Transmitter, oids: &[String]) -> SnmpResult<Vec<Varbind>> {
        let client = self.open(t).await?;
        client.get(oids).await
    }

    /// Release every session; the next poll reopens lazily.
    pub async fn close_all(&self) {
        self.sessions.lock().await.clear();
    }
}

/// One-shot connect + GET + drop for connectivity checks.
pub async fn test_connection(
    host: &str,
    port: u16,
    community: &str,
    version: i32,
    oids: &[String],
) -> SnmpResult<Vec<Varbind>> {
    let config = SessionConfig::new(
        host.to_string(),
        port,
        community.to_string(),
        SnmpVersion::from_wire(i64::from(version)),
    );
    tx_snmp::client::probe(config, oids).await
}
