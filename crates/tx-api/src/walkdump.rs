//! Walk dump parsing and template generation
//!
//! When a live walk fails, a saved `snmpwalk -On` dump can stand in for the
//! agent. Lines look like
//! `.1.3.6.1.4.1.31946.4.2.6.10.1.0 = Gauge32: 500`; anything that does not
//! parse is skipped rather than failing the whole file.

use serde::Serialize;

use tx_core::{is_valid_oid, MibMapper};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub oid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    pub sample: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkTemplate {
    pub name: String,
    /// `walk` for a live agent, `dump` for a parsed file.
    pub source: String,
    pub root: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub oids: Vec<TemplateEntry>,
}

/// Parse one dump line into `(oid, type, value)`.
fn parse_line(line: &str) -> Option<(String, Option<String>, serde_json::Value)> {
    let (left, right) = line.split_once(" = ")?;
    let oid = left.trim().trim_start_matches('.').to_string();
    if !is_valid_oid(&oid) {
        return None;
    }

    let right = right.trim();
    let (value_type, raw_value) = match right.split_once(": ") {
        Some((t, v)) => (Some(t.trim().to_string()), v.trim()),
        None => (None, right),
    };

    let value = {
        let unquoted = raw_value.trim_matches('"');
        match unquoted.parse::<i64>() {
            Ok(n) => serde_json::json!(n),
            Err(_) => match unquoted.parse::<f64>() {
                Ok(n) => serde_json::json!(n),
                Err(_) => serde_json::json!(unquoted),
            },
        }
    };

    Some((oid, value_type, value))
}

/// Parse a whole dump, keeping only lines under `root`.
pub fn parse_dump(contents: &str, root: &str) -> Vec<(String, Option<String>, serde_json::Value)> {
    let root = root.trim_end_matches('.');
    let prefix = format!("{root}.");
    contents
        .lines()
        .filter_map(parse_line)
        .filter(|(oid, _, _)| oid == root || oid.starts_with(&prefix))
        .collect()
}

/// Build the template JSON handed back to the UI and persisted under the
/// assets directory.
pub fn build_template(
    name: &str,
    source: &str,
    root: &str,
    entries: Vec<(String, Option<String>, serde_json::Value)>,
    mib: &MibMapper,
) -> WalkTemplate {
    let oids = entries
        .into_iter()
        .map(|(oid, value_type, sample)| TemplateEntry {
            name: mib.map(&oid).map(str::to_string),
            oid,
            value_type,
            sample,
        })
        .collect();
    WalkTemplate {
        name: name.to_string(),
        source: source.to_string(),
        root: root.to_string(),
        generated_at: chrono::Utc::now(),
        oids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"
.1.3.6.1.4.1.31946.4.2.6.10.1.0 = Gauge32: 500
.1.3.6.1.4.1.31946.4.2.6.10.13.0 = INTEGER: 1
.1.3.6.1.4.1.31946.3.1.7.0 = STRING: "WXYZ-FM"
.1.3.6.1.2.1.1.3.0 = Timeticks: (123456) 0:20:34.56
garbage line without separator
SNMPv2-SMI::enterprises.31946.4.2.6.10.2.0 = Gauge32: 10
"#;

    #[test]
    fn test_parses_numeric_lines_under_root() {
        let entries = parse_dump(DUMP, "1.3.6.1.4.1.31946");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "1.3.6.1.4.1.31946.4.2.6.10.1.0");
        assert_eq!(entries[0].1.as_deref(), Some("Gauge32"));
        assert_eq!(entries[0].2, serde_json::json!(500));
    }

    #[test]
    fn test_string_values_unquoted() {
        let entries = parse_dump(DUMP, "1.3.6.1.4.1.31946.3.1.7");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].2, serde_json::json!("WXYZ-FM"));
    }

    #[test]
    fn test_symbolic_and_garbage_lines_skipped() {
        let entries = parse_dump(DUMP, "1.3.6.1");
        // The symbolic SNMPv2-SMI line and the garbage line never parse.
        assert!(entries.iter().all(|(oid, _, _)| oid.starts_with("1.3.6.1")));
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn test_template_names_known_oids() {
        let entries = parse_dump(DUMP, "1.3.6.1.4.1.31946");
        let template = build_template(
            "etg-template",
            "dump",
            "1.3.6.1.4.1.31946",
            entries,
            &MibMapper::with_defaults(),
        );
        let forward = template
            .oids
            .iter()
            .find(|e| e.oid == "1.3.6.1.4.1.31946.4.2.6.10.1.0")
            .unwrap();
        assert_eq!(forward.name.as_deref(), Some("etgForwardPower"));
    }
}
