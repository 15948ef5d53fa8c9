//! Tagged representation of raw SNMP varbind values
//!
//! Agents return numbers, strings, and byte blobs under a handful of BER
//! application tags. Everything downstream dispatches on this variant
//! instead of sniffing runtime types.

use serde::{Deserialize, Serialize};

/// A decoded SNMP value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnmpValue {
    Integer(i64),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    OctetString(Vec<u8>),
    Oid(String),
    IpAddress([u8; 4]),
    Opaque(Vec<u8>),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Readable type name used when normalizing trap varbinds.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnmpValue::Integer(_) => "Integer",
            SnmpValue::Counter32(_) => "Counter32",
            SnmpValue::Gauge32(_) => "Gauge32",
            SnmpValue::TimeTicks(_) => "TimeTicks",
            SnmpValue::Counter64(_) => "Counter64",
            SnmpValue::OctetString(_) => "OctetString",
            SnmpValue::Oid(_) => "OID",
            SnmpValue::IpAddress(_) => "IpAddress",
            SnmpValue::Opaque(_) => "Opaque",
            SnmpValue::Null => "Null",
            SnmpValue::NoSuchObject => "NoSuchObject",
            SnmpValue::NoSuchInstance => "NoSuchInstance",
            SnmpValue::EndOfMibView => "EndOfMibView",
        }
    }

    /// Protocol-level "no such object/instance/end of view" markers.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }

    /// Integer view of the value, if it carries one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter32(v) => Some(i64::from(*v)),
            SnmpValue::Gauge32(v) => Some(i64::from(*v)),
            SnmpValue::TimeTicks(v) => Some(i64::from(*v)),
            SnmpValue::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Numeric view. Octet strings holding a decimal rendering count too,
    /// since some agents report gauges as display strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnmpValue::Integer(v) => Some(*v as f64),
            SnmpValue::Counter32(v) => Some(f64::from(*v)),
            SnmpValue::Gauge32(v) => Some(f64::from(*v)),
            SnmpValue::TimeTicks(v) => Some(f64::from(*v)),
            SnmpValue::Counter64(v) => Some(*v as f64),
            SnmpValue::OctetString(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok()),
            _ => None,
        }
    }

    /// Text view of string-like values, lossy on invalid UTF-8.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            SnmpValue::Oid(oid) => Some(oid.clone()),
            SnmpValue::IpAddress(octets) => Some(format!(
                "{}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            )),
            _ => None,
        }
    }

    /// Plain JSON rendering used for the opaque raw varbind map and for
    /// normalized trap varbinds. Byte blobs that are not UTF-8 come out
    /// hex-encoded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SnmpValue::Integer(v) => serde_json::json!(v),
            SnmpValue::Counter32(v) => serde_json::json!(v),
            SnmpValue::Gauge32(v) => serde_json::json!(v),
            SnmpValue::TimeTicks(v) => serde_json::json!(v),
            SnmpValue::Counter64(v) => serde_json::json!(v),
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => {
                match std::str::from_utf8(bytes) {
                    Ok(s) => serde_json::json!(s),
                    Err(_) => serde_json::json!(hex::encode(bytes)),
                }
            }
            SnmpValue::Oid(oid) => serde_json::json!(oid),
            SnmpValue::IpAddress(_) => serde_json::json!(self.as_text()),
            SnmpValue::Null
            | SnmpValue::NoSuchObject
            | SnmpValue::NoSuchInstance
            | SnmpValue::EndOfMibView => serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(SnmpValue::Integer(-3).as_i64(), Some(-3));
        assert_eq!(SnmpValue::Gauge32(9580).as_f64(), Some(9580.0));
        assert_eq!(SnmpValue::Counter64(u64::MAX).as_i64(), None);
        assert_eq!(SnmpValue::Null.as_f64(), None);
    }

    #[test]
    fn test_string_gauge_parses_as_number() {
        let v = SnmpValue::OctetString(b" 95.8 ".to_vec());
        assert_eq!(v.as_f64(), Some(95.8));
    }

    #[test]
    fn test_exception_detection() {
        assert!(SnmpValue::NoSuchInstance.is_exception());
        assert!(!SnmpValue::Integer(1).is_exception());
    }

    #[test]
    fn test_json_rendering_of_bytes() {
        assert_eq!(
            SnmpValue::OctetString(b"WXYZ-FM".to_vec()).to_json(),
            serde_json::json!("WXYZ-FM")
        );
        assert_eq!(
            SnmpValue::OctetString(vec![0xff, 0xfe]).to_json(),
            serde_json::json!("fffe")
        );
    }
}
