//! Numeric OID → symbolic name resolution
//!
//! Loads MIB mapping files (flat JSON objects of `"oid": "name"`) on top of
//! a built-in table covering the SNMPv2 system group, trap plumbing, and
//! the Elenos ETG family. Pure lookups after load.

use std::collections::HashMap;
use std::path::Path;

use crate::oid::strip_instance;
use crate::{CoreError, CoreResult};

static BUILTIN_NAMES: &[(&str, &str)] = &[
    ("1.3.6.1.2.1.1.1", "sysDescr"),
    ("1.3.6.1.2.1.1.2", "sysObjectID"),
    ("1.3.6.1.2.1.1.3", "sysUpTime"),
    ("1.3.6.1.2.1.1.4", "sysContact"),
    ("1.3.6.1.2.1.1.5", "sysName"),
    ("1.3.6.1.2.1.1.6", "sysLocation"),
    ("1.3.6.1.6.3.1.1.4.1", "snmpTrapOID"),
    ("1.3.6.1.6.3.1.1.4.3", "snmpTrapEnterprise"),
    ("1.3.6.1.6.3.1.1.5.1", "coldStart"),
    ("1.3.6.1.6.3.1.1.5.2", "warmStart"),
    ("1.3.6.1.6.3.1.1.5.3", "linkDown"),
    ("1.3.6.1.6.3.1.1.5.4", "linkUp"),
    ("1.3.6.1.6.3.1.1.5.5", "authenticationFailure"),
    ("1.3.6.1.4.1.31946.3.1.7", "etgRadioName"),
    ("1.3.6.1.4.1.31946.4.2.6.10.1", "etgForwardPower"),
    ("1.3.6.1.4.1.31946.4.2.6.10.2", "etgReflectedPower"),
    ("1.3.6.1.4.1.31946.4.2.6.10.12", "etgOnAirStatus"),
    ("1.3.6.1.4.1.31946.4.2.6.10.13", "etgStandbyStatus"),
    ("1.3.6.1.4.1.31946.4.2.6.10.14", "etgFrequency"),
];

#[derive(Debug, Clone, Default)]
pub struct MibMapper {
    names: HashMap<String, String>,
}

impl MibMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper seeded with the built-in table.
    pub fn with_defaults() -> Self {
        let names = BUILTIN_NAMES
            .iter()
            .map(|(oid, name)| (oid.to_string(), name.to_string()))
            .collect();
        Self { names }
    }

    /// Merge a JSON mapping file. Returns the number of entries added or
    /// replaced.
    pub fn load_file(&mut self, path: &Path) -> CoreResult<usize> {
        let text = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&text)
            .map_err(|e| CoreError::Parse(format!("{}: {e}", path.display())))?;
        let count = entries.len();
        self.names.extend(entries);
        Ok(count)
    }

    /// Merge every `.json` file in a directory. Missing directory is not an
    /// error; a present-but-malformed file is.
    pub fn load_dir(&mut self, dir: &Path) -> CoreResult<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut total = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                total += self.load_file(&path)?;
            }
        }
        Ok(total)
    }

    /// Symbolic name for an OID, looked up with the instance suffix
    /// stripped.
    pub fn map(&self, oid: &str) -> Option<&str> {
        if let Some(name) = self.names.get(oid) {
            return Some(name.as_str());
        }
        self.names.get(strip_instance(oid)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_instance_maps_to_base_name() {
        let mapper = MibMapper::with_defaults();
        assert_eq!(mapper.map("1.3.6.1.2.1.1.5.0"), Some("sysName"));
    }

    #[test]
    fn test_indexed_instance_maps_to_base_name() {
        let mapper = MibMapper::with_defaults();
        assert_eq!(
            mapper.map("1.3.6.1.4.1.31946.4.2.6.10.1.3"),
            Some("etgForwardPower")
        );
    }

    #[test]
    fn test_exact_entry_wins() {
        let mapper = MibMapper::with_defaults();
        assert_eq!(mapper.map("1.3.6.1.6.3.1.1.5.3"), Some("linkDown"));
    }

    #[test]
    fn test_unknown_oid_is_none() {
        let mapper = MibMapper::with_defaults();
        assert_eq!(mapper.map("1.3.6.1.4.1.99999.1.0"), None);
    }

    #[test]
    fn test_load_file_merges() {
        let dir = std::env::temp_dir().join("tx-core-mib-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("extra.json");
        std::fs::write(&path, r#"{"1.3.6.1.4.1.31946.9.9": "etgCustom"}"#).unwrap();

        let mut mapper = MibMapper::with_defaults();
        let added = mapper.load_file(&path).unwrap();
        assert_eq!(added, 1);
        assert_eq!(mapper.map("1.3.6.1.4.1.31946.9.9.0"), Some("etgCustom"));

        std::fs::remove_file(&path).ok();
    }
}
