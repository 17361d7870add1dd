//! Protocol data units.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};
use std::fmt;

/// PDU type, identified by its context-specific tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    /// SNMPv1 Trap-PDU. Carried as [`TrapV1Pdu`], never as [`Pdu`].
    TrapV1,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    pub fn from_tag(t: u8) -> Option<Self> {
        Some(match t {
            tag::pdu::GET_REQUEST => Self::GetRequest,
            tag::pdu::GET_NEXT_REQUEST => Self::GetNextRequest,
            tag::pdu::RESPONSE => Self::Response,
            tag::pdu::SET_REQUEST => Self::SetRequest,
            tag::pdu::TRAP_V1 => Self::TrapV1,
            tag::pdu::GET_BULK_REQUEST => Self::GetBulkRequest,
            tag::pdu::INFORM_REQUEST => Self::InformRequest,
            tag::pdu::TRAP_V2 => Self::TrapV2,
            tag::pdu::REPORT => Self::Report,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::GetRequest => tag::pdu::GET_REQUEST,
            Self::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            Self::Response => tag::pdu::RESPONSE,
            Self::SetRequest => tag::pdu::SET_REQUEST,
            Self::TrapV1 => tag::pdu::TRAP_V1,
            Self::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            Self::InformRequest => tag::pdu::INFORM_REQUEST,
            Self::TrapV2 => tag::pdu::TRAP_V2,
            Self::Report => tag::pdu::REPORT,
        }
    }

    /// Confirmed class (RFC 3411 2.8): the sender expects a Response.
    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            Self::GetRequest
                | Self::GetNextRequest
                | Self::SetRequest
                | Self::GetBulkRequest
                | Self::InformRequest
        )
    }

    /// Response class: completes an outstanding request.
    pub fn is_response(self) -> bool {
        matches!(self, Self::Response | Self::Report)
    }

    pub fn is_notification(self) -> bool {
        matches!(self, Self::TrapV1 | Self::TrapV2 | Self::InformRequest)
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "Trap",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "SNMPv2-Trap",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Generic PDU (every type except the SNMPv1 trap).
///
/// For GETBULK, `error_status` and `error_index` hold non-repeaters and
/// max-repetitions, which share their wire positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn new(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::new(
            PduType::GetRequest,
            request_id,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::new(
            PduType::GetNextRequest,
            request_id,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::new(PduType::SetRequest, request_id, varbinds)
    }

    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    pub fn is_error(&self) -> bool {
        self.pdu_type != PduType::GetBulkRequest && self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Response echoing this PDU's request ID and varbinds.
    ///
    /// Used to acknowledge an InformRequest (RFC 3416 4.2.7).
    pub fn to_response(&self) -> Self {
        Self::new(PduType::Response, self.request_id, self.varbinds.clone())
    }

    pub fn to_error_response(&self, status: ErrorStatus, index: i32) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: status.as_i32(),
            error_index: index,
            varbinds: self.varbinds.clone(),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.pdu_type.is_notification()
    }

    pub fn is_confirmed(&self) -> bool {
        self.pdu_type.is_confirmed()
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let (t, mut body) = decoder.read_tlv()?;
        let pdu_type = match PduType::from_tag(t) {
            Some(PduType::TrapV1) | None => {
                return Err(Error::decode(at, DecodeErrorKind::UnknownPduType(t)));
            }
            Some(pt) => pt,
        };
        Self::decode_body(pdu_type, &mut body)
    }

    fn decode_body(pdu_type: PduType, body: &mut Decoder) -> Result<Self> {
        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(body)?;
        body.finish()?;
        Ok(Self {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// SNMPv1 generic-trap values (RFC 1157).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericTrap {
    ColdStart,
    WarmStart,
    LinkDown,
    LinkUp,
    AuthenticationFailure,
    EgpNeighborLoss,
    EnterpriseSpecific,
}

impl GenericTrap {
    pub fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::ColdStart,
            1 => Self::WarmStart,
            2 => Self::LinkDown,
            3 => Self::LinkUp,
            4 => Self::AuthenticationFailure,
            5 => Self::EgpNeighborLoss,
            6 => Self::EnterpriseSpecific,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv1 Trap-PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapV1Pdu {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    /// Raw generic-trap value; see [`TrapV1Pdu::generic`].
    pub generic_trap: i32,
    pub specific_trap: i32,
    pub time_stamp: u32,
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    pub fn generic(&self) -> Option<GenericTrap> {
        GenericTrap::from_i32(self.generic_trap)
    }

    /// Equivalent SNMPv2 `snmpTrapOID.0` value (RFC 3584 3.1).
    pub fn v2_trap_oid(&self) -> Oid {
        match self.generic() {
            Some(GenericTrap::EnterpriseSpecific) | None => self
                .enterprise
                .extend(&[0, self.specific_trap as u32]),
            Some(g) => crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 5).child(g.as_i32() as u32 + 1),
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut body = decoder.read_constructed(tag::pdu::TRAP_V1)?;
        let enterprise = body.read_oid()?;
        body.expect_tag(tag::application::IP_ADDRESS)?;
        let len = body.read_length()?;
        let agent_addr = body.read_ip_address_value(len)?;
        let generic_trap = body.read_integer()?;
        let specific_trap = body.read_integer()?;
        let time_stamp = body.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut body)?;
        body.finish()?;
        Ok(Self {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}

/// Either PDU shape a community message can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyPdu {
    Generic(Pdu),
    TrapV1(TrapV1Pdu),
}

impl AnyPdu {
    pub fn pdu_type(&self) -> PduType {
        match self {
            Self::Generic(p) => p.pdu_type,
            Self::TrapV1(_) => PduType::TrapV1,
        }
    }

    pub fn varbinds(&self) -> &[VarBind] {
        match self {
            Self::Generic(p) => &p.varbinds,
            Self::TrapV1(t) => &t.varbinds,
        }
    }

    /// Request ID, or 0 for an SNMPv1 trap (which has none).
    pub fn request_id(&self) -> i32 {
        match self {
            Self::Generic(p) => p.request_id,
            Self::TrapV1(_) => 0,
        }
    }

    pub fn as_pdu(&self) -> Option<&Pdu> {
        match self {
            Self::Generic(p) => Some(p),
            Self::TrapV1(_) => None,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Self::Generic(p) => p.encode(buf),
            Self::TrapV1(t) => t.encode(buf),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        match decoder.peek_tag() {
            Some(tag::pdu::TRAP_V1) => TrapV1Pdu::decode(decoder).map(Self::TrapV1),
            _ => Pdu::decode(decoder).map(Self::Generic),
        }
    }
}

impl From<Pdu> for AnyPdu {
    fn from(p: Pdu) -> Self {
        Self::Generic(p)
    }
}

impl From<TrapV1Pdu> for AnyPdu {
    fn from(t: TrapV1Pdu) -> Self {
        Self::TrapV1(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    fn reencode(pdu: &Pdu) -> Pdu {
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        Pdu::decode(&mut Decoder::new(buf.finish())).unwrap()
    }

    #[test]
    fn get_request_wire_bytes() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3)]);
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        assert_eq!(
            &buf.finish()[..],
            &[
                0xA0, 0x12, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x07,
                0x30, 0x05, 0x06, 0x01, 0x2B, 0x05, 0x00
            ]
        );
    }

    #[test]
    fn getbulk_fields() {
        let pdu = Pdu::get_bulk(7, 1, 25, &[oid!(1, 3, 6, 1, 2, 1, 2, 2)]);
        let back = reencode(&pdu);
        assert_eq!(back.non_repeaters(), 1);
        assert_eq!(back.max_repetitions(), 25);
        assert!(!back.is_error());
    }

    #[test]
    fn inform_response_echoes() {
        let inform = Pdu::new(
            PduType::InformRequest,
            99,
            vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(5))],
        );
        let resp = inform.to_response();
        assert_eq!(resp.pdu_type, PduType::Response);
        assert_eq!(resp.request_id, 99);
        assert_eq!(resp.varbinds, inform.varbinds);
        assert!(inform.is_confirmed());
        assert!(inform.is_notification());
    }

    #[test]
    fn unknown_pdu_tag_rejected() {
        let err = Pdu::decode(&mut Decoder::from_slice(&[0xAF, 0x00])).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownPduType(0xAF),
                ..
            }
        ));
    }

    #[test]
    fn trap_v1_round_trip_and_mapping() {
        let trap = TrapV1Pdu {
            enterprise: oid!(1, 3, 6, 1, 4, 1, 9999),
            agent_addr: [127, 0, 0, 1],
            generic_trap: 6,
            specific_trap: 17,
            time_stamp: 4200,
            varbinds: vec![VarBind::new(oid!(1, 3, 6, 1, 4, 1, 9999, 1), 3)],
        };
        let mut buf = EncodeBuf::new();
        trap.encode(&mut buf);
        let any = AnyPdu::decode(&mut Decoder::new(buf.finish())).unwrap();
        assert_eq!(any, AnyPdu::TrapV1(trap.clone()));
        assert_eq!(trap.v2_trap_oid(), oid!(1, 3, 6, 1, 4, 1, 9999, 0, 17));

        let cold = TrapV1Pdu {
            generic_trap: 0,
            ..trap
        };
        assert_eq!(cold.v2_trap_oid(), oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1));
    }
}
