//! Bounded result rings and the derived online heuristic
//!
//! Rings are per-device: one device's poll rate never evicts another
//! device's history. Cross-device queries merge newest-first up to a
//! global cap.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tx_core::DeviceResult;

/// Results kept per device.
pub const DEVICE_RING_CAP: usize = 100;
/// Cross-device cap for the merged results query.
pub const RESULTS_QUERY_CAP: usize = 1000;
/// Window the online heuristic looks at.
pub const STATUS_WINDOW: usize = 10;
/// Failures within the window that flip a device offline.
pub const STATUS_FAILURE_LIMIT: usize = 5;

/// Append newest-last, dropping the oldest beyond the cap.
pub fn push_bounded(ring: &mut VecDeque<DeviceResult>, result: DeviceResult) {
    ring.push_back(result);
    while ring.len() > DEVICE_RING_CAP {
        ring.pop_front();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub error_count: usize,
}

impl DeviceStatus {
    pub fn offline() -> Self {
        Self {
            online: false,
            last_seen: None,
            error_count: 0,
        }
    }
}

/// Online iff fewer than [`STATUS_FAILURE_LIMIT`] of the last
/// [`STATUS_WINDOW`] polls failed and at least one succeeded.
pub fn derive_status(ring: &VecDeque<DeviceResult>) -> DeviceStatus {
    let window: Vec<&DeviceResult> = ring.iter().rev().take(STATUS_WINDOW).collect();
    let error_count = window.iter().filter(|r| !r.success).count();
    let any_success = window.iter().any(|r| r.success);
    let last_seen = ring
        .iter()
        .rev()
        .find(|r| r.success)
        .map(|r| r.timestamp);
    DeviceStatus {
        online: any_success && error_count < STATUS_FAILURE_LIMIT,
        last_seen,
        error_count,
    }
}

/// Merge per-device rings newest-first, bounded by `limit`.
pub fn merge_results(mut all: Vec<DeviceResult>, limit: usize) -> Vec<DeviceResult> {
    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    all.truncate(limit.min(RESULTS_QUERY_CAP));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use tx_core::TransmitterMetricData;
    use uuid::Uuid;

    fn ok(id: Uuid) -> DeviceResult {
        DeviceResult::ok(id, TransmitterMetricData::default())
    }

    fn failed(id: Uuid) -> DeviceResult {
        DeviceResult::failed(id, "timeout")
    }

    #[test]
    fn test_ring_stays_bounded_with_newest_kept() {
        let id = Uuid::new_v4();
        let mut ring = VecDeque::new();
        let mut last = None;
        for _ in 0..150 {
            let r = ok(id);
            last = Some(r.timestamp);
            push_bounded(&mut ring, r);
        }
        assert_eq!(ring.len(), DEVICE_RING_CAP);
        assert_eq!(ring.back().map(|r| r.timestamp), last);
    }

    #[test]
    fn test_status_all_success_is_online() {
        let id = Uuid::new_v4();
        let mut ring = VecDeque::new();
        for _ in 0..10 {
            push_bounded(&mut ring, ok(id));
        }
        let status = derive_status(&ring);
        assert!(status.online);
        assert_eq!(status.error_count, 0);
        assert!(status.last_seen.is_some());
    }

    #[test]
    fn test_status_five_failures_in_window_is_offline() {
        let id = Uuid::new_v4();
        let mut ring = VecDeque::new();
        for _ in 0..5 {
            push_bounded(&mut ring, ok(id));
        }
        for _ in 0..5 {
            push_bounded(&mut ring, failed(id));
        }
        let status = derive_status(&ring);
        assert!(!status.online);
        assert_eq!(status.error_count, 5);
    }

    #[test]
    fn test_status_needs_at_least_one_success() {
        let id = Uuid::new_v4();
        let mut ring = VecDeque::new();
        push_bounded(&mut ring, failed(id));
        let status = derive_status(&ring);
        assert!(!status.online);
        assert_eq!(status.error_count, 1);
    }

    #[test]
    fn test_status_window_ignores_old_failures() {
        let id = Uuid::new_v4();
        let mut ring = VecDeque::new();
        for _ in 0..6 {
            push_bounded(&mut ring, failed(id));
        }
        for _ in 0..10 {
            push_bounded(&mut ring, ok(id));
        }
        let status = derive_status(&ring);
        assert!(status.online);
        assert_eq!(status.error_count, 0);
    }

    #[test]
    fn test_empty_ring_is_offline() {
        let ring = VecDeque::new();
        assert!(!derive_status(&ring).online);
    }

    #[test]
    fn test_merge_is_newest_first_and_capped() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut all = Vec::new();
        for _ in 0..30 {
            all.push(ok(a));
            all.push(failed(b));
        }
        let merged = merge_results(all, 25);
        assert_eq!(merged.len(), 25);
        for pair in merged.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }
}
