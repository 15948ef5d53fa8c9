//! SNMP v1/v2c wire layer
//!
//! A deliberately small implementation of the protocol subset the fleet
//! monitor needs: BER encoding of GET / GET-NEXT requests, decoding of
//! responses and trap notifications, and a per-device async UDP session
//! with timeout and retry handling. No SNMPv3, no SET.

pub mod ber;
pub mod client;
pub mod pdu;

use thiserror::Error;

pub use client::{SnmpClient, SessionConfig};
pub use pdu::{
    decode_trap, Pdu, PduType, SnmpMessage, SnmpVersion, TrapMessage, Varbind, SNMP_TRAP_OID,
};

#[derive(Error, Debug)]
pub enum SnmpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out after {0} attempts")]
    Timeout(u32),

    #[error("cannot resolve host: {0}")]
    Resolve(String),

    #[error("malformed message: {0}")]
    Decode(String),

    #[error("cannot encode message: {0}")]
    Encode(String),

    #[error("agent returned error-status {status} at index {index}")]
    ErrorStatus { status: i64, index: i64 },
}

pub type SnmpResult<T> = Result<T, SnmpError>;
