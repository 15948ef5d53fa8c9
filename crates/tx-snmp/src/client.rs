//! Per-device async UDP session
//!
//! One bound, connected socket per transmitter. Transient failures are
//! returned to the caller and never tear the socket down; the next poll
//! re-resolves on its own. GET filters v2c exception varbinds out of the
//! result, and against v1 agents a `noSuchName` answer drops the offending
//! OID and retries with the remainder so siblings still resolve.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::pdu::{MessageBody, Pdu, PduType, SnmpMessage, SnmpVersion, Varbind};
use crate::{SnmpError, SnmpResult};
use tx_core::SnmpValue;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 3;
/// GET-NEXT accumulation cap per walk call.
pub const DEFAULT_WALK_CHUNK: usize = 200;

const MAX_DATAGRAM: usize = 65_507;
const ERR_NO_SUCH_NAME: i64 = 2;

/// Connection tuple for one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub community: String,
    pub version: SnmpVersion,
    pub timeout: Duration,
    pub retries: u32,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, community: impl Into<String>, version: SnmpVersion) -> Self {
        Self {
            host: host.into(),
            port,
            community: community.into(),
            version,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

pub struct SnmpClient {
    socket: UdpSocket,
    config: SessionConfig,
    request_id: AtomicI64,
}

impl SnmpClient {
    /// Resolve the target and bind a connected socket for it.
    pub async fn connect(config: SessionConfig) -> SnmpResult<Self> {
        let target = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| SnmpError::Resolve(config.host.clone()))?;
        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        Ok(Self {
            socket,
            config,
            request_id: AtomicI64::new(1),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    /// Single GET over the expanded OID list.
    pub async fn get(&self, oids: &[String]) -> SnmpResult<Vec<Varbind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let mut remaining: Vec<String> = oids.to_vec();
        // A v1 agent reports missing objects through error-status rather
        // than per-varbind exceptions; shrink the request until it answers.
        for _ in 0..=oids.len() {
            if remaining.is_empty() {
                return Ok(Vec::new());
            }
            let request_id = self.next_request_id();
            let message = SnmpMessage::request(
                PduType::GetRequest,
                self.config.version,
                &self.config.community,
                request_id,
                &remaining,
            );
            let pdu = self.exchange(&message, request_id).await?;

            if self.config.version == SnmpVersion::V1 && pdu.error_status == ERR_NO_SUCH_NAME {
                let index = pdu.error_index;
                if index >= 1 && (index as usize) <= remaining.len() {
                    let dropped = remaining.remove(index as usize - 1);
                    debug!(oid = %dropped, "v1 agent has no such name, retrying without it");
                    continue;
                }
                return Err(SnmpError::ErrorStatus {
                    status: pdu.error_status,
                    index: pdu.error_index,
                });
            }
            if pdu.error_status != 0 {
                return Err(SnmpError::ErrorStatus {
                    status: pdu.error_status,
                    index: pdu.error_index,
                });
            }

            // Exception markers must not shadow successfully resolved
            // siblings downstream.
            return Ok(pdu
                .varbinds
                .into_iter()
                .filter(|vb| !vb.value.is_exception())
                .collect());
        }
        Ok(Vec::new())
    }

    async fn get_next(&self, oid: &str) -> SnmpResult<Option<Varbind>> {
        let request_id = self.next_request_id();
        let target = [oid.to_string()];
        let message = SnmpMessage::request(
            PduType::GetNextRequest,
            self.config.version,
            &self.config.community,
            request_id,
            &target,
        );
        let pdu = self.exchange(&message, request_id).await?;
        if self.config.version == SnmpVersion::V1 && pdu.error_status == ERR_NO_SUCH_NAME {
            // End of the tree in v1 terms.
            return Ok(None);
        }
        if pdu.error_status != 0 {
            return Err(SnmpError::ErrorStatus {
                status: pdu.error_status,
                index: pdu.error_index,
            });
        }
        Ok(pdu.varbinds.into_iter().next())
    }

    /// Iterative GET-NEXT walk under `root`, accumulating at most `chunk`
    /// varbinds. Used for template discovery, not regular polling.
    pub async fn walk(&self, root: &str, chunk: usize) -> SnmpResult<Vec<Varbind>> {
        let root = root.trim_end_matches('.');
        let subtree_prefix = format!("{root}.");
        let mut current = root.to_string();
        let mut out = Vec::new();

        while out.len() < chunk {
            let Some(vb) = self.get_next(&current).await? else {
                break;
            };
            if vb.value == SnmpValue::EndOfMibView {
                break;
            }
            if !vb.oid.starts_with(&subtree_prefix) && vb.oid != root {
                break;
            }
            if !oid_after(&vb.oid, &current) {
                debug!(oid = %vb.oid, "agent did not advance the walk, stopping");
                break;
            }
            current = vb.oid.clone();
            out.push(vb);
        }
        Ok(out)
    }

    async fn exchange(&self, message: &SnmpMessage, request_id: i64) -> SnmpResult<Pdu> {
        let bytes = message.encode()?;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let attempts = self.config.retries.max(1);
        for attempt in 1..=attempts {
            self.socket.send(&bytes).await?;
            match timeout(self.config.timeout, self.recv_matching(request_id, &mut buf)).await {
                Ok(result) => return result,
                Err(_) => {
                    debug!(attempt, "SNMP request timed out");
                }
            }
        }
        Err(SnmpError::Timeout(attempts))
    }

    async fn recv_matching(&self, request_id: i64, buf: &mut [u8]) -> SnmpResult<Pdu> {
        loop {
            let n = self.socket.recv(buf).await?;
            match SnmpMessage::decode(&buf[..n]) {
                Ok(SnmpMessage {
                    body: MessageBody::Pdu(pdu),
                    ..
                }) if pdu.kind == PduType::Response && pdu.request_id == request_id => {
                    return Ok(pdu)
                }
                Ok(_) => {
                    // Stale response from an earlier attempt; keep waiting.
                    continue;
                }
                Err(e) => {
                    debug!("dropping undecodable datagram: {e}");
                    continue;
                }
            }
        }
    }
}

/// One-shot session + GET used for connectivity checks.
pub async fn probe(config: SessionConfig, oids: &[String]) -> SnmpResult<Vec<Varbind>> {
    let client = SnmpClient::connect(config).await?;
    client.get(oids).await
}

/// Numeric per-arc ordering; a walk must advance strictly.
fn oid_after(candidate: &str, current: &str) -> bool {
    let parse = |s: &str| -> Option<Vec<u64>> {
        s.split('.').map(|seg| seg.parse::<u64>().ok()).collect()
    };
    match (parse(candidate), parse(current)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber;
    use crate::pdu::MessageBody;

    fn respond(pdu: Pdu, community: &[u8], version: SnmpVersion) -> Vec<u8> {
        let msg = SnmpMessage {
            version,
            community: community.to_vec(),
            body: MessageBody::Pdu(pdu),
        };
        msg.encode().unwrap()
    }

    /// Agent stub answering every GET with the supplied varbinds.
    async fn spawn_agent(varbinds: Vec<Varbind>) -> std::net::SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(message) = SnmpMessage::decode(&buf[..n]) else {
                    continue;
                };
                let MessageBody::Pdu(request) = message.body else {
                    continue;
                };
                let reply = respond(
                    Pdu {
                        kind: PduType::Response,
                        request_id: request.request_id,
                        error_status: 0,
                        error_index: 0,
                        varbinds: varbinds.clone(),
                    },
                    &message.community,
                    message.version,
                );
                let _ = socket.send_to(&reply, peer).await;
            }
        });
        addr
    }

    fn config_for(addr: std::net::SocketAddr) -> SessionConfig {
        let mut config = SessionConfig::new(
            addr.ip().to_string(),
            addr.port(),
            "public",
            SnmpVersion::V2c,
        );
        config.timeout = Duration::from_millis(500);
        config.retries = 1;
        config
    }

    #[tokio::test]
    async fn test_get_returns_agent_values() {
        let addr = spawn_agent(vec![
            Varbind {
                oid: "1.3.6.1.4.1.31946.4.2.6.10.1.0".into(),
                value: SnmpValue::Gauge32(500),
            },
            Varbind {
                oid: "1.3.6.1.4.1.31946.4.2.6.10.2.0".into(),
                value: SnmpValue::NoSuchInstance,
            },
        ])
        .await;

        let client = SnmpClient::connect(config_for(addr)).await.unwrap();
        let varbinds = client
            .get(&["1.3.6.1.4.1.31946.4.2.6.10.1.0".to_string()])
            .await
            .unwrap();

        // The exception varbind is filtered; the real value survives.
        assert_eq!(varbinds.len(), 1);
        assert_eq!(varbinds[0].value, SnmpValue::Gauge32(500));
    }

    #[tokio::test]
    async fn test_get_times_out_against_silence() {
        // Bind a socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let mut config = config_for(addr);
        config.timeout = Duration::from_millis(50);
        let client = SnmpClient::connect(config).await.unwrap();
        let result = client.get(&["1.3.6.1.2.1.1.3.0".to_string()]).await;
        assert!(matches!(result, Err(SnmpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_v1_no_such_name_drops_offender() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(message) = SnmpMessage::decode(&buf[..n]) else {
                    continue;
                };
                let MessageBody::Pdu(request) = message.body else {
                    continue;
                };
                let reply = if request.varbinds.len() > 1 {
                    // Second varbind is unknown to this v1 agent.
                    respond(
                        Pdu {
                            kind: PduType::Response,
                            request_id: request.request_id,
                            error_status: ERR_NO_SUCH_NAME,
                            error_index: 2,
                            varbinds: request.varbinds,
                        },
                        &message.community,
                        message.version,
                    )
                } else {
                    respond(
                        Pdu {
                            kind: PduType::Response,
                            request_id: request.request_id,
                            error_status: 0,
                            error_index: 0,
                            varbinds: vec![Varbind {
                                oid: request.varbinds[0].oid.clone(),
                                value: SnmpValue::Integer(1),
                            }],
                        },
                        &message.community,
                        message.version,
                    )
                };
                let _ = socket.send_to(&reply, peer).await;
            }
        });

        let mut config = config_for(addr);
        config.version = SnmpVersion::V1;
        let client = SnmpClient::connect(config).await.unwrap();
        let varbinds = client
            .get(&[
                "1.3.6.1.4.1.31946.4.2.6.10.13.0".to_string(),
                "1.3.6.1.4.1.99999.1.0".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(varbinds.len(), 1);
        assert_eq!(varbinds[0].oid, "1.3.6.1.4.1.31946.4.2.6.10.13.0");
    }

    #[tokio::test]
    async fn test_walk_stops_outside_subtree() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let tree = [
                ("1.3.6.1.4.1.31946.4.2.6.10.1.0", 500i64),
                ("1.3.6.1.4.1.31946.4.2.6.10.2.0", 10),
                ("1.3.6.1.4.1.32000.1.0", 7),
            ];
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(message) = SnmpMessage::decode(&buf[..n]) else {
                    continue;
                };
                let MessageBody::Pdu(request) = message.body else {
                    continue;
                };
                let asked = request.varbinds[0].oid.clone();
                let next = tree
                    .iter()
                    .find(|(oid, _)| oid_after(oid, &asked))
                    .map(|(oid, v)| Varbind {
                        oid: oid.to_string(),
                        value: SnmpValue::Integer(*v),
                    })
                    .unwrap_or(Varbind {
                        oid: asked,
                        value: SnmpValue::EndOfMibView,
                    });
                let reply = respond(
                    Pdu {
                        kind: PduType::Response,
                        request_id: request.request_id,
                        error_status: 0,
                        error_index: 0,
                        varbinds: vec![next],
                    },
                    &message.community,
                    message.version,
                );
                let _ = socket.send_to(&reply, peer).await;
            }
        });

        let client = SnmpClient::connect(config_for(addr)).await.unwrap();
        let varbinds = client
            .walk("1.3.6.1.4.1.31946", DEFAULT_WALK_CHUNK)
            .await
            .unwrap();
        assert_eq!(varbinds.len(), 2);
        assert!(varbinds.iter().all(|vb| vb.oid.starts_with("1.3.6.1.4.1.31946.")));
    }

    #[test]
    fn test_oid_after_orders_numerically() {
        assert!(oid_after("1.3.6.1.10", "1.3.6.1.9"));
        assert!(oid_after("1.3.6.1.9.1", "1.3.6.1.9"));
        assert!(!oid_after("1.3.6.1.9", "1.3.6.1.10"));
        assert!(!oid_after("1.3.6.1.9", "1.3.6.1.9"));
    }
}
