//! SNMP message and PDU model
//!
//! Covers the v1/v2c community-based message framing, the request/response
//! PDU shared by GET, GET-NEXT, Response, and SNMPv2-Trap, and the distinct
//! v1 Trap-PDU body. Decoding normalizes both trap generations into one
//! [`TrapMessage`] shape.

use tx_core::SnmpValue;

use crate::ber::{self, Reader};
use crate::{SnmpError, SnmpResult};

/// Varbind holding the v2c trap identity.
pub const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1.0";

/// Protocol version as carried on the wire (0 = v1, 1 = v2c).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl SnmpVersion {
    pub fn as_wire(&self) -> i64 {
        match self {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
        }
    }

    /// Ambiguous or unknown values fall back to v2c.
    pub fn from_wire(v: i64) -> Self {
        match v {
            0 => SnmpVersion::V1,
            _ => SnmpVersion::V2c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Varbind {
    pub oid: String,
    pub value: SnmpValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    TrapV2,
}

impl PduType {
    fn tag(&self) -> u8 {
        match self {
            PduType::GetRequest => ber::TAG_GET_REQUEST,
            PduType::GetNextRequest => ber::TAG_GET_NEXT_REQUEST,
            PduType::Response => ber::TAG_RESPONSE,
            PduType::TrapV2 => ber::TAG_TRAP_V2,
        }
    }
}

/// The four-field PDU used by everything except the v1 trap.
#[derive(Debug, Clone)]
pub struct Pdu {
    pub kind: PduType,
    pub request_id: i64,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<Varbind>,
}

/// SNMPv1 Trap-PDU body.
#[derive(Debug, Clone)]
pub struct TrapV1 {
    pub enterprise: String,
    pub agent_addr: [u8; 4],
    pub generic_trap: i64,
    pub specific_trap: i64,
    pub timestamp: u64,
    pub varbinds: Vec<Varbind>,
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    Pdu(Pdu),
    TrapV1(TrapV1),
}

#[derive(Debug, Clone)]
pub struct SnmpMessage {
    pub version: SnmpVersion,
    pub community: Vec<u8>,
    pub body: MessageBody,
}

impl SnmpMessage {
    pub fn request(
        kind: PduType,
        version: SnmpVersion,
        community: &str,
        request_id: i64,
        oids: &[String],
    ) -> Self {
        let varbinds = oids
            .iter()
            .map(|oid| Varbind {
                oid: oid.clone(),
                value: SnmpValue::Null,
            })
            .collect();
        Self {
            version,
            community: community.as_bytes().to_vec(),
            body: MessageBody::Pdu(Pdu {
                kind,
                request_id,
                error_status: 0,
                error_index: 0,
                varbinds,
            }),
        }
    }

    pub fn encode(&self) -> SnmpResult<Vec<u8>> {
        let pdu = match &self.body {
            MessageBody::Pdu(pdu) => pdu,
            MessageBody::TrapV1(_) => {
                return Err(SnmpError::Encode("v1 traps are receive-only".into()))
            }
        };

        let mut varbinds = Vec::new();
        for vb in &pdu.varbinds {
            let mut one = ber::encode_oid(&vb.oid)?;
            one.extend_from_slice(&encode_value(&vb.value)?);
            varbinds.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &one));
        }

        let mut body = Vec::new();
        body.extend_from_slice(&ber::encode_integer(pdu.request_id));
        body.extend_from_slice(&ber::encode_integer(pdu.error_status));
        body.extend_from_slice(&ber::encode_integer(pdu.error_index));
        body.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &varbinds));

        let mut message = Vec::new();
        message.extend_from_slice(&ber::encode_integer(self.version.as_wire()));
        message.extend_from_slice(&ber::encode_octet_string(&self.community));
        message.extend_from_slice(&ber::wrap(pdu.kind.tag(), &body));

        Ok(ber::wrap(ber::TAG_SEQUENCE, &message))
    }

    pub fn decode(datagram: &[u8]) -> SnmpResult<Self> {
        let mut outer = Reader::new(datagram);
        let message = outer.expect(ber::TAG_SEQUENCE)?;

        let mut r = Reader::new(message);
        let version = SnmpVersion::from_wire(ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?);
        let community = r.expect(ber::TAG_OCTET_STRING)?.to_vec();

        let (tag, pdu_content) = r.read_tlv()?;
        let body = match tag {
            ber::TAG_TRAP_V1 => MessageBody::TrapV1(decode_trap_v1(pdu_content)?),
            ber::TAG_GET_REQUEST => MessageBody::Pdu(decode_pdu(PduType::GetRequest, pdu_content)?),
            ber::TAG_GET_NEXT_REQUEST => {
                MessageBody::Pdu(decode_pdu(PduType::GetNextRequest, pdu_content)?)
            }
            ber::TAG_RESPONSE => MessageBody::Pdu(decode_pdu(PduType::Response, pdu_content)?),
            ber::TAG_TRAP_V2 => MessageBody::Pdu(decode_pdu(PduType::TrapV2, pdu_content)?),
            other => {
                return Err(SnmpError::Decode(format!("unsupported PDU tag {other:#04x}")))
            }
        };

        Ok(Self {
            version,
            community,
            body,
        })
    }
}

fn encode_value(value: &SnmpValue) -> SnmpResult<Vec<u8>> {
    let encoded = match value {
        SnmpValue::Integer(v) => ber::encode_integer(*v),
        SnmpValue::Counter32(v) => ber::wrap(ber::TAG_COUNTER32, &ber::unsigned_content(u64::from(*v))),
        SnmpValue::Gauge32(v) => ber::wrap(ber::TAG_GAUGE32, &ber::unsigned_content(u64::from(*v))),
        SnmpValue::TimeTicks(v) => ber::wrap(ber::TAG_TIMETICKS, &ber::unsigned_content(u64::from(*v))),
        SnmpValue::Counter64(v) => ber::wrap(ber::TAG_COUNTER64, &ber::unsigned_content(*v)),
        SnmpValue::OctetString(bytes) => ber::encode_octet_string(bytes),
        SnmpValue::Oid(oid) => ber::encode_oid(oid)?,
        SnmpValue::IpAddress(octets) => ber::wrap(ber::TAG_IP_ADDRESS, octets),
        SnmpValue::Opaque(bytes) => ber::wrap(ber::TAG_OPAQUE, bytes),
        SnmpValue::Null => ber::encode_null(),
        SnmpValue::NoSuchObject => ber::wrap(ber::TAG_NO_SUCH_OBJECT, &[]),
        SnmpValue::NoSuchInstance => ber::wrap(ber::TAG_NO_SUCH_INSTANCE, &[]),
        SnmpValue::EndOfMibView => ber::wrap(ber::TAG_END_OF_MIB_VIEW, &[]),
    };
    Ok(encoded)
}

fn decode_pdu(kind: PduType, content: &[u8]) -> SnmpResult<Pdu> {
    let mut r = Reader::new(content);
    let request_id = ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?;
    let error_status = ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?;
    let error_index = ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?;
    let varbinds = decode_varbind_list(r.expect(ber::TAG_SEQUENCE)?)?;
    Ok(Pdu {
        kind,
        request_id,
        error_status,
        error_index,
        varbinds,
    })
}

fn decode_trap_v1(content: &[u8]) -> SnmpResult<TrapV1> {
    let mut r = Reader::new(content);
    let enterprise = ber::decode_oid(r.expect(ber::TAG_OID)?)?;
    let addr_bytes = r.expect(ber::TAG_IP_ADDRESS)?;
    let mut agent_addr = [0u8; 4];
    if addr_bytes.len() == 4 {
        agent_addr.copy_from_slice(addr_bytes);
    }
    let generic_trap = ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?;
    let specific_trap = ber::decode_integer(r.expect(ber::TAG_INTEGER)?)?;
    let timestamp = ber::decode_unsigned(r.expect(ber::TAG_TIMETICKS)?)?;
    let varbinds = decode_varbind_list(r.expect(ber::TAG_SEQUENCE)?)?;
    Ok(TrapV1 {
        enterprise,
        agent_addr,
        generic_trap,
        specific_trap,
        timestamp,
        varbinds,
    })
}

fn decode_varbind_list(content: &[u8]) -> SnmpResult<Vec<Varbind>> {
    let mut list = Reader::new(content);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = Reader::new(list.expect(ber::TAG_SEQUENCE)?);
        let oid = ber::decode_oid(vb.expect(ber::TAG_OID)?)?;
        let (tag, value_content) = vb.read_tlv()?;
        varbinds.push(Varbind {
            oid,
            value: decode_value(tag, value_content)?,
        });
    }
    Ok(varbinds)
}

fn decode_value(tag: u8, content: &[u8]) -> SnmpResult<SnmpValue> {
    let value = match tag {
        ber::TAG_INTEGER => SnmpValue::Integer(ber::decode_integer(content)?),
        ber::TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
        ber::TAG_NULL => SnmpValue::Null,
        ber::TAG_OID => SnmpValue::Oid(ber::decode_oid(content)?),
        ber::TAG_IP_ADDRESS => {
            let mut octets = [0u8; 4];
            if content.len() == 4 {
                octets.copy_from_slice(content);
            }
            SnmpValue::IpAddress(octets)
        }
        ber::TAG_COUNTER32 => SnmpValue::Counter32(ber::decode_unsigned(content)? as u32),
        ber::TAG_GAUGE32 => SnmpValue::Gauge32(ber::decode_unsigned(content)? as u32),
        ber::TAG_TIMETICKS => SnmpValue::TimeTicks(ber::decode_unsigned(content)? as u32),
        ber::TAG_OPAQUE => SnmpValue::Opaque(content.to_vec()),
        ber::TAG_COUNTER64 => SnmpValue::Counter64(ber::decode_unsigned(content)?),
        ber::TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        ber::TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        ber::TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        other => {
            return Err(SnmpError::Decode(format!("unsupported value tag {other:#04x}")))
        }
    };
    Ok(value)
}

/// A trap notification normalized across protocol generations.
#[derive(Debug, Clone)]
pub struct TrapMessage {
    /// 0 = v1, 1 = v2c.
    pub version: i32,
    pub community: Option<String>,
    /// snmpTrapOID.0 payload (v2c).
    pub trap_oid: Option<String>,
    /// Trap-PDU enterprise field (v1).
    pub enterprise_oid: Option<String>,
    pub varbinds: Vec<Varbind>,
}

/// Decode a trap datagram (either generation) into the normalized shape.
pub fn decode_trap(datagram: &[u8]) -> SnmpResult<TrapMessage> {
    let message = SnmpMessage::decode(datagram)?;
    let community = match std::str::from_utf8(&message.community) {
        Ok(s) if !s.is_empty() => Some(s.to_string()),
        _ => None,
    };

    match message.body {
        MessageBody::TrapV1(trap) => Ok(TrapMessage {
            version: 0,
            community,
            trap_oid: None,
            enterprise_oid: Some(trap.enterprise),
            varbinds: trap.varbinds,
        }),
        MessageBody::Pdu(pdu) if pdu.kind == PduType::TrapV2 => {
            let trap_oid = pdu.varbinds.iter().find_map(|vb| {
                if vb.oid == SNMP_TRAP_OID {
                    match &vb.value {
                        SnmpValue::Oid(oid) => Some(oid.clone()),
                        other => other.as_text(),
                    }
                } else {
                    None
                }
            });
            Ok(TrapMessage {
                version: message.version.as_wire() as i32,
                community,
                trap_oid,
                enterprise_oid: None,
                varbinds: pdu.varbinds,
            })
        }
        _ => Err(SnmpError::Decode("not a trap PDU".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber;

    fn encode_varbind(oid: &str, value_tlv: Vec<u8>) -> Vec<u8> {
        let mut one = ber::encode_oid(oid).unwrap();
        one.extend_from_slice(&value_tlv);
        ber::wrap(ber::TAG_SEQUENCE, &one)
    }

    /// Build a response datagram by hand, the way an agent would.
    fn fake_response(request_id: i64, varbinds: &[Vec<u8>]) -> Vec<u8> {
        let mut vb_list = Vec::new();
        for vb in varbinds {
            vb_list.extend_from_slice(vb);
        }
        let mut body = Vec::new();
        body.extend_from_slice(&ber::encode_integer(request_id));
        body.extend_from_slice(&ber::encode_integer(0));
        body.extend_from_slice(&ber::encode_integer(0));
        body.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &vb_list));

        let mut msg = Vec::new();
        msg.extend_from_slice(&ber::encode_integer(1));
        msg.extend_from_slice(&ber::encode_octet_string(b"public"));
        msg.extend_from_slice(&ber::wrap(ber::TAG_RESPONSE, &body));
        ber::wrap(ber::TAG_SEQUENCE, &msg)
    }

    #[test]
    fn test_request_encodes_and_decodes() {
        let msg = SnmpMessage::request(
            PduType::GetRequest,
            SnmpVersion::V2c,
            "public",
            42,
            &["1.3.6.1.2.1.1.3.0".to_string()],
        );
        let bytes = msg.encode().unwrap();
        let decoded = SnmpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.version, SnmpVersion::V2c);
        assert_eq!(decoded.community, b"public");
        match decoded.body {
            MessageBody::Pdu(pdu) => {
                assert_eq!(pdu.kind, PduType::GetRequest);
                assert_eq!(pdu.request_id, 42);
                assert_eq!(pdu.varbinds.len(), 1);
                assert_eq!(pdu.varbinds[0].oid, "1.3.6.1.2.1.1.3.0");
                assert_eq!(pdu.varbinds[0].value, SnmpValue::Null);
            }
            _ => panic!("wrong body"),
        }
    }

    #[test]
    fn test_response_with_gauge_decodes() {
        let vb = encode_varbind(
            "1.3.6.1.4.1.31946.4.2.6.10.14.0",
            ber::wrap(ber::TAG_GAUGE32, &ber::unsigned_content(9580)),
        );
        let datagram = fake_response(7, &[vb]);
        let decoded = SnmpMessage::decode(&datagram).unwrap();
        let MessageBody::Pdu(pdu) = decoded.body else {
            panic!("wrong body");
        };
        assert_eq!(pdu.varbinds[0].value, SnmpValue::Gauge32(9580));
    }

    #[test]
    fn test_exception_tags_decode() {
        let vb = encode_varbind(
            "1.3.6.1.4.1.31946.4.2.6.10.2.0",
            vec![ber::TAG_NO_SUCH_INSTANCE, 0x00],
        );
        let datagram = fake_response(8, &[vb]);
        let MessageBody::Pdu(pdu) = SnmpMessage::decode(&datagram).unwrap().body else {
            panic!("wrong body");
        };
        assert_eq!(pdu.varbinds[0].value, SnmpValue::NoSuchInstance);
    }

    #[test]
    fn test_v2c_trap_normalizes() {
        let trap_id = encode_varbind(
            SNMP_TRAP_OID,
            ber::encode_oid("1.3.6.1.6.3.1.1.5.3").unwrap(),
        );
        let payload = encode_varbind(
            "1.3.6.1.4.1.31946.4.2.6.10.1.0",
            ber::wrap(ber::TAG_GAUGE32, &ber::unsigned_content(0)),
        );

        let mut vb_list = Vec::new();
        vb_list.extend_from_slice(&trap_id);
        vb_list.extend_from_slice(&payload);
        let mut body = Vec::new();
        body.extend_from_slice(&ber::encode_integer(99));
        body.extend_from_slice(&ber::encode_integer(0));
        body.extend_from_slice(&ber::encode_integer(0));
        body.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &vb_list));
        let mut msg = Vec::new();
        msg.extend_from_slice(&ber::encode_integer(1));
        msg.extend_from_slice(&ber::encode_octet_string(b"public"));
        msg.extend_from_slice(&ber::wrap(ber::TAG_TRAP_V2, &body));
        let datagram = ber::wrap(ber::TAG_SEQUENCE, &msg);

        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.version, 1);
        assert_eq!(trap.community.as_deref(), Some("public"));
        assert_eq!(trap.trap_oid.as_deref(), Some("1.3.6.1.6.3.1.1.5.3"));
        assert_eq!(trap.enterprise_oid, None);
        assert_eq!(trap.varbinds.len(), 2);
    }

    #[test]
    fn test_v1_trap_normalizes() {
        let payload = encode_varbind(
            "1.3.6.1.4.1.31946.4.2.6.10.13.0",
            ber::encode_integer(2),
        );
        let mut body = Vec::new();
        body.extend_from_slice(&ber::encode_oid("1.3.6.1.4.1.31946").unwrap());
        body.extend_from_slice(&ber::wrap(ber::TAG_IP_ADDRESS, &[10, 0, 0, 5]));
        body.extend_from_slice(&ber::encode_integer(6));
        body.extend_from_slice(&ber::encode_integer(17));
        body.extend_from_slice(&ber::wrap(ber::TAG_TIMETICKS, &ber::unsigned_content(12345)));
        body.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &payload));
        let mut msg = Vec::new();
        msg.extend_from_slice(&ber::encode_integer(0));
        msg.extend_from_slice(&ber::encode_octet_string(b"private"));
        msg.extend_from_slice(&ber::wrap(ber::TAG_TRAP_V1, &body));
        let datagram = ber::wrap(ber::TAG_SEQUENCE, &msg);

        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.version, 0);
        assert_eq!(trap.community.as_deref(), Some("private"));
        assert_eq!(trap.enterprise_oid.as_deref(), Some("1.3.6.1.4.1.31946"));
        assert_eq!(trap.trap_oid, None);
        assert_eq!(trap.varbinds.len(), 1);
    }

    #[test]
    fn test_garbage_datagram_is_an_error() {
        assert!(SnmpMessage::decode(&[0xFF, 0x00, 0x12]).is_err());
        assert!(decode_trap(&[]).is_err());
    }
}
