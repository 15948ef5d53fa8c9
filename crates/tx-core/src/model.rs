//! Domain records for sites, transmitters, metrics, and traps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SNMP_PORT: u16 = 161;
pub const DEFAULT_COMMUNITY: &str = "public";
pub const DEFAULT_POLL_INTERVAL_MS: i64 = 10_000;
/// Poll intervals below this are clamped on write.
pub const MIN_POLL_INTERVAL_MS: i64 = 1_000;

/// Operational status of a transmitter, derived from polled status OIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmitterStatus {
    Active,
    Standby,
    Offline,
    Fault,
    Unknown,
}

impl TransmitterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransmitterStatus::Active => "active",
            TransmitterStatus::Standby => "standby",
            TransmitterStatus::Offline => "offline",
            TransmitterStatus::Fault => "fault",
            TransmitterStatus::Unknown => "unknown",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "active" => TransmitterStatus::Active,
            "standby" => TransmitterStatus::Standby,
            "offline" => TransmitterStatus::Offline,
            "fault" => TransmitterStatus::Fault,
            _ => TransmitterStatus::Unknown,
        }
    }
}

impl std::fmt::Display for TransmitterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technician contact details for a site.
///
/// Older deployments stored a bare email string in this column; see
/// [`ContactInfo::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub technician: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl ContactInfo {
    /// Normalize the stored representation: a JSON object parses as-is, any
    /// other string is treated as a legacy bare email.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ContactInfo::default();
        }
        match serde_json::from_str::<ContactInfo>(trimmed) {
            Ok(parsed) => parsed,
            Err(_) => ContactInfo {
                technician: String::new(),
                phone: String::new(),
                email: trimmed.to_string(),
            },
        }
    }
}

/// A physical broadcast location owning zero or more transmitters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    /// Free text, by convention `"STATE, District"`.
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub contact_info: ContactInfo,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A polled SNMP endpoint. One record carries both the broadcast metadata
/// and the connection tuple; the REST "device" shape is a projection of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmitter {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    /// Overrides `name` in UI displays when set.
    pub display_label: Option<String>,
    pub display_order: i32,
    pub frequency_mhz: Option<f64>,
    pub power_w: Option<f64>,
    pub status: TransmitterStatus,
    pub snmp_host: String,
    pub snmp_port: u16,
    pub snmp_community: String,
    /// 0 = v1, 1 = v2c.
    pub snmp_version: i32,
    pub oids: Vec<String>,
    pub poll_interval_ms: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One interpreted poll observation. Any subset of the metric fields may be
/// populated depending on what the agent answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmitterMetricData {
    pub power_output: Option<f64>,
    pub forward_power: Option<f64>,
    pub reflected_power: Option<f64>,
    pub frequency_mhz: Option<f64>,
    pub vswr: Option<f64>,
    pub temperature: Option<f64>,
    pub status: TransmitterStatus,
    /// Opaque OID → value map, exactly as the agent answered.
    pub raw: serde_json::Value,
    /// Radio-name OID value when it differs from nothing; the store decides
    /// whether to apply it to the transmitter record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_name: Option<String>,
}

impl Default for TransmitterMetricData {
    fn default() -> Self {
        Self {
            power_output: None,
            forward_power: None,
            reflected_power: None,
            frequency_mhz: None,
            vswr: None,
            temperature: None,
            status: TransmitterStatus::Offline,
            raw: serde_json::Value::Object(serde_json::Map::new()),
            proposed_name: None,
        }
    }
}

/// Outcome of a single scheduled poll, kept in the in-memory ring and
/// appended to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResult {
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TransmitterMetricData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceResult {
    pub fn ok(device_id: Uuid, data: TransmitterMetricData) -> Self {
        Self {
            device_id,
            timestamp: Utc::now(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(device_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            device_id,
            timestamp: Utc::now(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_info_legacy_email() {
        let info = ContactInfo::normalize("alice@example.com");
        assert_eq!(info.technician, "");
        assert_eq!(info.phone, "");
        assert_eq!(info.email, "alice@example.com");
    }

    #[test]
    fn test_contact_info_json_object() {
        let info = ContactInfo::normalize(r#"{"technician":"Bob","phone":"555","email":"b@x.io"}"#);
        assert_eq!(info.technician, "Bob");
        assert_eq!(info.phone, "555");
        assert_eq!(info.email, "b@x.io");
    }

    #[test]
    fn test_contact_info_partial_object_fills_defaults() {
        let info = ContactInfo::normalize(r#"{"email":"ops@example.com"}"#);
        assert_eq!(info.technician, "");
        assert_eq!(info.email, "ops@example.com");
    }

    #[test]
    fn test_contact_info_empty() {
        assert_eq!(ContactInfo::normalize("  "), ContactInfo::default());
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["active", "standby", "offline", "fault", "unknown"] {
            assert_eq!(TransmitterStatus::from_str_lossy(s).as_str(), s);
        }
        assert_eq!(
            TransmitterStatus::from_str_lossy("bogus"),
            TransmitterStatus::Unknown
        );
    }
}
