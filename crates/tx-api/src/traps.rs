//! SNMP trap receiver
//!
//! Listens for unsolicited v1/v2c notifications, normalizes them, and
//! appends them through the store. Binding the standard port 162 needs
//! privileges; the fallback protocol below decides whether to prompt, fall
//! back to the unprivileged port, or abort. The receiver is not on the
//! polling liveness path and never crashes the process.

use std::io::{BufRead, IsTerminal, Write};
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use tx_snmp::{decode_trap, TrapMessage};

use crate::config::TrapConfig;
use crate::db::{NewTrap, Store};
use crate::error::{ApiError, ApiResult};

const MAX_DATAGRAM: usize = 65_507;

pub struct TrapReceiver {
    store: Store,
    config: TrapConfig,
}

impl TrapReceiver {
    pub fn new(store: Store, config: TrapConfig) -> Self {
        Self { store, config }
    }

    /// Bind the primary port, falling back per policy on EACCES or
    /// EADDRINUSE.
    pub async fn bind(&self) -> ApiResult<UdpSocket> {
        let primary = self.config.port;
        match UdpSocket::bind(("0.0.0.0", primary)).await {
            Ok(socket) => {
                info!(port = primary, "trap receiver listening");
                Ok(socket)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::AddrInUse
                ) =>
            {
                if !self.fallback_allowed(primary, &e) {
                    return Err(ApiError::TrapBind {
                        port: primary,
                        source: e,
                    });
                }
                let fallback = self.config.fallback_port;
                warn!(
                    "cannot bind trap port {primary} ({e}); falling back to {fallback}. \
                     Grant cap_net_bind_service or run elevated to use the standard port."
                );
                match UdpSocket::bind(("0.0.0.0", fallback)).await {
                    Ok(socket) => {
                        info!(port = fallback, "trap receiver listening on fallback port");
                        Ok(socket)
                    }
                    Err(e) => Err(ApiError::TrapBind {
                        port: fallback,
                        source: e,
                    }),
                }
            }
            Err(e) => Err(ApiError::TrapBind {
                port: primary,
                source: e,
            }),
        }
    }

    fn fallback_allowed(&self, primary: u16, cause: &std::io::Error) -> bool {
        if self.config.auto_fallback {
            return true;
        }
        if !self.config.require_privileged {
            return true;
        }
        // Privileged bind is required: ask an interactive operator, abort
        // otherwise.
        if !std::io::stdin().is_terminal() {
            return false;
        }
        prompt_operator(primary, self.config.fallback_port, cause)
    }

    /// Receive loop. Errors are logged and the loop continues.
    pub async fn run(self, socket: UdpSocket) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("trap receive failed: {e}");
                    continue;
                }
            };
            self.handle_datagram(&buf[..n], peer).await;
        }
    }

    async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) {
        let message = match decode_trap(datagram) {
            Ok(message) => message,
            Err(e) => {
                debug!(%peer, "dropping undecodable trap datagram: {e}");
                return;
            }
        };

        let source_host = peer.ip().to_string();
        let (transmitter_id, site_id) = self.attribute(&source_host).await;

        let trap = NewTrap {
            transmitter_id,
            site_id,
            source_host,
            source_port: i32::from(peer.port()),
            community: message.community.clone(),
            version: message.version,
            trap_oid: message.trap_oid.clone(),
            enterprise_oid: message.enterprise_oid.clone(),
            varbinds: normalize_varbinds(&message),
        };

        debug!(
            source = %peer,
            version = trap.version,
            trap_oid = trap.trap_oid.as_deref().unwrap_or("-"),
            "trap received"
        );

        if let Err(e) = self.store.store_trap(&trap).await {
            warn!(%peer, "dropping trap write: {e}");
        }
    }

    /// A trap belongs to a transmitter only when exactly one transmitter
    /// carries the sender's host. Failure to attribute is non-fatal.
    async fn attribute(&self, source_host: &str) -> (Option<uuid::Uuid>, Option<uuid::Uuid>) {
        match self.store.find_transmitters_by_host(source_host).await {
            Ok(matches) if matches.len() == 1 => {
                (Some(matches[0].id), Some(matches[0].site_id))
            }
            Ok(_) => (None, None),
            Err(e) => {
                warn!(source_host, "trap attribution lookup failed: {e}");
                (None, None)
            }
        }
    }
}

fn normalize_varbinds(message: &TrapMessage) -> serde_json::Value {
    let list: Vec<serde_json::Value> = message
        .varbinds
        .iter()
        .map(|vb| {
            serde_json::json!({
                "oid": vb.oid,
                "type": vb.value.type_name(),
                "value": vb.value.to_json(),
            })
        })
        .collect();
    serde_json::Value::Array(list)
}

fn prompt_operator(primary: u16, fallback: u16, cause: &std::io::Error) -> bool {
    let mut stderr = std::io::stderr();
    let _ = writeln!(
        stderr,
        "Cannot bind trap port {primary}: {cause}. Fall back to port {fallback}? [y/N] "
    );
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tx_core::SnmpValue;
    use tx_snmp::Varbind;

    #[test]
    fn test_varbind_normalization_shape() {
        let message = TrapMessage {
            version: 1,
            community: Some("public".into()),
            trap_oid: Some("1.3.6.1.6.3.1.1.5.3".into()),
            enterprise_oid: None,
            varbinds: vec![
                Varbind {
                    oid: "1.3.6.1.6.3.1.1.4.1.0".into(),
                    value: SnmpValue::Oid("1.3.6.1.6.3.1.1.5.3".into()),
                },
                Varbind {
                    oid: "1.3.6.1.4.1.31946.4.2.6.10.1.0".into(),
                    value: SnmpValue::Gauge32(0),
                },
            ],
        };
        let normalized = normalize_varbinds(&message);
        let list = normalized.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["oid"], "1.3.6.1.6.3.1.1.4.1.0");
        assert_eq!(list[0]["type"], "OID");
        assert_eq!(list[1]["type"], "Gauge32");
        assert_eq!(list[1]["value"], 0);
    }
}
