//! Per-device poll scheduling
//!
//! Each active transmitter owns an independent timer task; a device's next
//! poll is scheduled only after the current one resolves, so polls for one
//! device never overlap. Activity gating is re-checked through the store
//! immediately before each GET, and every result lands in the device's
//! bounded ring plus an asynchronous store write whose failure is logged
//! and dropped.

pub mod ring;
pub mod sessions;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tx_core::model::MIN_POLL_INTERVAL_MS;
use tx_core::{expand_oids, parse_metrics, DeviceResult, SnmpValue, Transmitter};

use crate::db::Store;
use ring::{derive_status, merge_results, push_bounded, DeviceStatus, RESULTS_QUERY_CAP};
use sessions::SessionManager;

struct DeviceSlot {
    transmitter: Transmitter,
    results: Arc<Mutex<VecDeque<DeviceResult>>>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    store: Store,
    sessions: SessionManager,
    devices: Mutex<HashMap<Uuid, DeviceSlot>>,
    running: AtomicBool,
}

#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub running: bool,
    pub device_count: usize,
    pub devices: Vec<DeviceStatusEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusEntry {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub error_count: usize,
}

impl PollScheduler {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                sessions: SessionManager::new(),
                devices: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Start scheduling every configured device.
    pub async fn start(&self) -> sqlx::Result<()> {
        self.inner.running.store(true, Ordering::SeqCst);
        self.reload_from_store().await
    }

    /// Stop all timers and sessions, waiting for in-flight polls. Rings are
    /// kept.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        Self::halt_tasks(&self.inner).await;
        self.inner.sessions.close_all().await;
        info!("poller stopped");
    }

    async fn halt_tasks(inner: &Arc<SchedulerInner>) {
        let handles: Vec<(Arc<Notify>, JoinHandle<()>)> = {
            let mut devices = inner.devices.lock().await;
            devices
                .values_mut()
                .filter_map(|slot| slot.task.take().map(|task| (slot.shutdown.clone(), task)))
                .collect()
        };
        for (shutdown, task) in handles {
            // notify_one stores a permit; a task that is mid-poll still
            // observes the shutdown at its next select.
            shutdown.notify_one();
            // In-flight polls bound this by the 5 s session timeout.
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("poll task ended abnormally: {e}");
                }
            }
        }
    }

    /// Reconcile the device table with the configuration store. Rings of
    /// surviving devices carry over; timers restart from scratch.
    pub async fn reload_from_store(&self) -> sqlx::Result<()> {
        Self::halt_tasks(&self.inner).await;
        self.inner.sessions.close_all().await;

        let transmitters = self.inner.store.list_transmitters().await?;

        let mut devices = self.inner.devices.lock().await;
        let mut old: HashMap<Uuid, DeviceSlot> = devices.drain().collect();
        for t in transmitters {
            let results = old
                .remove(&t.id)
                .map(|slot| slot.results)
                .unwrap_or_else(|| Arc::new(Mutex::new(VecDeque::new())));
            let shutdown = Arc::new(Notify::new());
            let task = if self.is_running() && t.is_active {
                Some(spawn_device_task(
                    self.inner.clone(),
                    t.id,
                    shutdown.clone(),
                ))
            } else {
                None
            };
            devices.insert(
                t.id,
                DeviceSlot {
                    transmitter: t,
                    results,
                    shutdown,
                    task,
                },
            );
        }
        let dropped = old.len();
        let count = devices.len();
        drop(devices);

        if dropped > 0 {
            debug!(dropped, "devices removed during reload");
        }
        info!(count, "poller device table reloaded");
        Ok(())
    }

    /// Merged results, newest first. `device` narrows to one ring.
    pub async fn results(&self, device: Option<Uuid>, limit: usize) -> Vec<DeviceResult> {
        let rings: Vec<Arc<Mutex<VecDeque<DeviceResult>>>> = {
            let devices = self.inner.devices.lock().await;
            devices
                .iter()
                .filter(|(id, _)| device.map(|d| d == **id).unwrap_or(true))
                .map(|(_, slot)| slot.results.clone())
                .collect()
        };
        let mut all = Vec::new();
        for ring in rings {
            all.extend(ring.lock().await.iter().cloned());
        }
        merge_results(all, limit.min(RESULTS_QUERY_CAP))
    }

    pub async fn clear_results(&self) {
        let devices = self.inner.devices.lock().await;
        for slot in devices.values() {
            slot.results.lock().await.clear();
        }
    }

    /// Derived liveness for one device; unknown ids read as offline.
    pub async fn device_status(&self, id: Uuid) -> DeviceStatus {
        let ring = {
            let devices = self.inner.devices.lock().await;
            devices.get(&id).map(|slot| slot.results.clone())
        };
        match ring {
            Some(ring) => derive_status(&*ring.lock().await),
            None => DeviceStatus::offline(),
        }
    }

    pub async fn status(&self) -> PollerStatus {
        let entries: Vec<(Uuid, String, bool)> = {
            let devices = self.inner.devices.lock().await;
            devices
                .values()
                .map(|slot| {
                    (
                        slot.transmitter.id,
                        slot.transmitter.name.clone(),
                        slot.transmitter.is_active,
                    )
                })
                .collect()
        };
        let mut devices = Vec::with_capacity(entries.len());
        for (id, name, is_active) in entries {
            let status = self.device_status(id).await;
            devices.push(DeviceStatusEntry {
                id,
                name,
                is_active,
                online: status.online,
                last_seen: status.last_seen,
                error_count: status.error_count,
            });
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        PollerStatus {
            running: self.is_running(),
            device_count: devices.len(),
            devices,
        }
    }
}

fn spawn_device_task(
    inner: Arc<SchedulerInner>,
    id: Uuid,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = {
                let devices = inner.devices.lock().await;
                let Some(slot) = devices.get(&id) else { break };
                Duration::from_millis(
                    slot.transmitter.poll_interval_ms.max(MIN_POLL_INTERVAL_MS) as u64
                )
            };

            tokio::select! {
                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if !inner.running.load(Ordering::SeqCst) {
                break;
            }

            poll_once(&inner, id).await;
        }
        debug!(device = %id, "poll task exited");
    })
}

async fn poll_once(inner: &Arc<SchedulerInner>, id: Uuid) {
    let snapshot = {
        let devices = inner.devices.lock().await;
        devices
            .get(&id)
            .map(|slot| (slot.transmitter.clone(), slot.results.clone()))
    };
    let Some((transmitter, results)) = snapshot else {
        return;
    };

    // Gate re-check right before the GET closes the race between
    // scheduling and execution. A storage fault must not block polling.
    match inner.store.poll_gate(transmitter.id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(device = %transmitter.id, "gated off, skipping tick");
            return;
        }
        Err(e) => {
            warn!(device = %transmitter.id, "gate check failed, polling anyway: {e}");
        }
    }

    let oids = expand_oids(&transmitter.oids);
    let result = match inner.sessions.get(&transmitter, &oids).await {
        Ok(varbinds) => {
            let raw: BTreeMap<String, SnmpValue> = varbinds
                .into_iter()
                .map(|vb| (vb.oid, vb.value))
                .collect();
            DeviceResult::ok(transmitter.id, parse_metrics(&raw))
        }
        Err(e) => {
            debug!(device = %transmitter.id, host = %transmitter.snmp_host, "poll failed: {e}");
            DeviceResult::failed(transmitter.id, e.to_string())
        }
    };

    push_bounded(&mut *results.lock().await, result.clone());

    // Hand the result to storage off the polling path.
    let store = inner.store.clone();
    tokio::spawn(async move {
        if let Err(e) = store.store_metrics(result.device_id, &result).await {
            warn!(device = %result.device_id, "dropping metrics write: {e}");
        }
    });
}
