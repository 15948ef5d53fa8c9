//! Interpretation of raw varbind maps into typed metric records
//!
//! Maps the Elenos ETG OID family (scalar `.0` and per-exciter indexed
//! variants) onto the domain metric schema and derives the composite
//! signals: operational status, VSWR, and MHz-scaled frequency.

use std::collections::BTreeMap;

use crate::model::{TransmitterMetricData, TransmitterStatus};
use crate::oid::strip_instance;
use crate::value::SnmpValue;

const OID_FORWARD_POWER: &str = "1.3.6.1.4.1.31946.4.2.6.10.1";
const OID_REFLECTED_POWER: &str = "1.3.6.1.4.1.31946.4.2.6.10.2";
const OID_ON_AIR_STATUS: &str = "1.3.6.1.4.1.31946.4.2.6.10.12";
const OID_STANDBY_STATUS: &str = "1.3.6.1.4.1.31946.4.2.6.10.13";
/// Reported in tens of kHz; divide by 100 for MHz.
const OID_FREQUENCY: &str = "1.3.6.1.4.1.31946.4.2.6.10.14";

/// Station name object; its value proposes a rename of the transmitter.
pub const OID_RADIO_NAME: &str = "1.3.6.1.4.1.31946.3.1.7";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricField {
    ForwardPower,
    ReflectedPower,
    Frequency,
}

/// Resolve an answered OID to a metric field: as-is, minus the scalar `.0`,
/// minus an instance index, then minus both. First hit wins.
fn resolve_field(oid: &str) -> Option<MetricField> {
    let no_zero = oid.strip_suffix(".0").unwrap_or(oid);
    let no_index = strip_instance(oid);
    let no_both = strip_instance(no_zero);
    for candidate in [oid, no_zero, no_index, no_both] {
        let field = match candidate {
            OID_FORWARD_POWER => Some(MetricField::ForwardPower),
            OID_REFLECTED_POWER => Some(MetricField::ReflectedPower),
            OID_FREQUENCY => Some(MetricField::Frequency),
            _ => None,
        };
        if field.is_some() {
            return field;
        }
    }
    None
}

/// First numeric value answered under `base` in any shape: direct, scalar
/// `.0`, or instance-indexed.
fn find_numeric_under(raw: &BTreeMap<String, SnmpValue>, base: &str) -> Option<i64> {
    for (oid, value) in raw {
        let no_zero = oid.strip_suffix(".0").unwrap_or(oid);
        let no_index = strip_instance(oid);
        let no_both = strip_instance(no_zero);
        if oid == base || no_zero == base || no_index == base || no_both == base {
            if let Some(n) = value.as_i64() {
                return Some(n);
            }
        }
    }
    None
}

/// Status derivation. The standby-status object wins over the on-air
/// object; a map with neither numeric is an offline transmitter. This is
/// the single source of truth for liveness.
fn derive_status(raw: &BTreeMap<String, SnmpValue>) -> TransmitterStatus {
    if let Some(v) = find_numeric_under(raw, OID_STANDBY_STATUS) {
        match v {
            1 => return TransmitterStatus::Active,
            2 => return TransmitterStatus::Standby,
            _ => {}
        }
    }
    if let Some(v) = find_numeric_under(raw, OID_ON_AIR_STATUS) {
        return if v == 2 {
            TransmitterStatus::Active
        } else {
            TransmitterStatus::Standby
        };
    }
    TransmitterStatus::Offline
}

/// Transform a successful poll's varbind map into a metric record.
/// Unknown OIDs are carried in the raw map but otherwise ignored.
pub fn parse_metrics(raw: &BTreeMap<String, SnmpValue>) -> TransmitterMetricData {
    let mut data = TransmitterMetricData::default();

    for (oid, value) in raw {
        let Some(field) = resolve_field(oid) else {
            continue;
        };
        let Some(n) = value.as_f64() else {
            continue;
        };
        match field {
            MetricField::ForwardPower => {
                data.forward_power.get_or_insert(n);
            }
            MetricField::ReflectedPower => {
                data.reflected_power.get_or_insert(n);
            }
            MetricField::Frequency => {
                data.frequency_mhz.get_or_insert(n / 100.0);
            }
        }
    }

    data.status = derive_status(raw);

    // VSWR = (1+Γ)/(1−Γ) with Γ = sqrt(reflected/forward). Only emitted
    // while Γ < 1 and the ratio stays finite; a full reflection is left
    // unreported rather than stored as infinity.
    if data.vswr.is_none() {
        if let (Some(fwd), Some(refl)) = (data.forward_power, data.reflected_power) {
            if fwd > 0.0 && refl >= 0.0 {
                let gamma = (refl / fwd).sqrt();
                if gamma < 1.0 {
                    let vswr = (1.0 + gamma) / (1.0 - gamma);
                    if vswr.is_finite() {
                        data.vswr = Some(vswr);
                    }
                }
            }
        }
    }

    // Radio-name passthrough; the persistence layer decides whether the
    // proposal actually renames anything.
    let name_scalar = format!("{OID_RADIO_NAME}.0");
    let name_value = raw.get(OID_RADIO_NAME).or_else(|| raw.get(&name_scalar));
    if let Some(text) = name_value.and_then(SnmpValue::as_text) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            data.proposed_name = Some(trimmed.to_string());
        }
    }

    let mut raw_json = serde_json::Map::new();
    for (oid, value) in raw {
        raw_json.insert(oid.clone(), value.to_json());
    }
    data.raw = serde_json::Value::Object(raw_json);

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, SnmpValue)]) -> BTreeMap<String, SnmpValue> {
        entries
            .iter()
            .map(|(oid, v)| (oid.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_standby_status_scalar_one_is_active() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.13.0", SnmpValue::Integer(1))]);
        assert_eq!(parse_metrics(&m).status, TransmitterStatus::Active);
    }

    #[test]
    fn test_standby_status_two_is_standby() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.13.0", SnmpValue::Integer(2))]);
        assert_eq!(parse_metrics(&m).status, TransmitterStatus::Standby);
    }

    #[test]
    fn test_on_air_indexed_two_is_active() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.12.4", SnmpValue::Integer(2))]);
        assert_eq!(parse_metrics(&m).status, TransmitterStatus::Active);
    }

    #[test]
    fn test_on_air_other_value_is_standby() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.12.0", SnmpValue::Integer(1))]);
        assert_eq!(parse_metrics(&m).status, TransmitterStatus::Standby);
    }

    #[test]
    fn test_no_status_oid_means_offline() {
        let m = raw(&[("1.3.6.1.2.1.1.5.0", SnmpValue::OctetString(b"x".to_vec()))]);
        assert_eq!(parse_metrics(&m).status, TransmitterStatus::Offline);
    }

    #[test]
    fn test_frequency_scaling_to_mhz() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.14.0", SnmpValue::Gauge32(9580))]);
        assert_eq!(parse_metrics(&m).frequency_mhz, Some(95.80));
    }

    #[test]
    fn test_vswr_derivation() {
        let m = raw(&[
            ("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(100)),
            ("1.3.6.1.4.1.31946.4.2.6.10.2.0", SnmpValue::Gauge32(4)),
        ]);
        let vswr = parse_metrics(&m).vswr.expect("vswr emitted");
        assert!((vswr - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_vswr_full_reflection_not_emitted() {
        let m = raw(&[
            ("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(100)),
            ("1.3.6.1.4.1.31946.4.2.6.10.2.0", SnmpValue::Gauge32(100)),
        ]);
        assert_eq!(parse_metrics(&m).vswr, None);
    }

    #[test]
    fn test_vswr_needs_both_powers() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(500))]);
        assert_eq!(parse_metrics(&m).vswr, None);
    }

    #[test]
    fn test_happy_path_poll_shape() {
        let m = raw(&[
            ("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(500)),
            ("1.3.6.1.4.1.31946.4.2.6.10.2.0", SnmpValue::Gauge32(10)),
            ("1.3.6.1.4.1.31946.4.2.6.10.12.0", SnmpValue::Integer(2)),
            ("1.3.6.1.4.1.31946.4.2.6.10.14.0", SnmpValue::Gauge32(9580)),
            ("1.3.6.1.4.1.31946.4.2.6.10.13.0", SnmpValue::Integer(1)),
        ]);
        let data = parse_metrics(&m);
        assert_eq!(data.forward_power, Some(500.0));
        assert_eq!(data.reflected_power, Some(10.0));
        assert_eq!(data.frequency_mhz, Some(95.80));
        assert_eq!(data.status, TransmitterStatus::Active);
        let vswr = data.vswr.expect("vswr");
        assert!((vswr - 1.3333333).abs() < 1e-3, "vswr was {vswr}");
    }

    #[test]
    fn test_partial_answer_leaves_field_unset() {
        // Reflected power dropped as a protocol exception upstream.
        let m = raw(&[
            ("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(500)),
            ("1.3.6.1.4.1.31946.4.2.6.10.13.0", SnmpValue::Integer(1)),
        ]);
        let data = parse_metrics(&m);
        assert_eq!(data.reflected_power, None);
        assert_eq!(data.vswr, None);
        assert_eq!(data.status, TransmitterStatus::Active);
    }

    #[test]
    fn test_radio_name_from_bytes() {
        let m = raw(&[(
            "1.3.6.1.4.1.31946.3.1.7.0",
            SnmpValue::OctetString(b"  WXYZ-FM \n".to_vec()),
        )]);
        assert_eq!(parse_metrics(&m).proposed_name.as_deref(), Some("WXYZ-FM"));
    }

    #[test]
    fn test_sysuptime_is_not_power_output() {
        let m = raw(&[("1.3.6.1.2.1.1.3.0", SnmpValue::TimeTicks(123456))]);
        let data = parse_metrics(&m);
        assert_eq!(data.power_output, None);
    }

    #[test]
    fn test_raw_map_carried_verbatim() {
        let m = raw(&[("1.3.6.1.4.1.31946.4.2.6.10.1.0", SnmpValue::Gauge32(42))]);
        let data = parse_metrics(&m);
        assert_eq!(
            data.raw["1.3.6.1.4.1.31946.4.2.6.10.1.0"],
            serde_json::json!(42)
        );
    }
}
