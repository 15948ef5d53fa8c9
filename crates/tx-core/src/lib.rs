//! Transmitter Fleet Monitoring Core
//!
//! This crate provides the domain layer for monitoring a fleet of FM
//! broadcast transmitters: the data model, the interpretation of raw SNMP
//! varbinds into typed metrics, OID bookkeeping, and symbolic name
//! resolution from MIB mapping files.

pub mod metrics;
pub mod mib;
pub mod model;
pub mod oid;
pub mod value;

use thiserror::Error;

pub use metrics::{parse_metrics, OID_RADIO_NAME};
pub use mib::MibMapper;
pub use model::{
    ContactInfo, DeviceResult, Site, Transmitter, TransmitterMetricData, TransmitterStatus,
};
pub use oid::{expand_oids, is_valid_oid, strip_instance};
pub use value::SnmpValue;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid OID: {0}")]
    InvalidOid(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
