//! Community-based messages (SNMPv1 and SNMPv2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, data PDU }`

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, EncodeErrorKind, Error, Result};
use crate::pdu::{AnyPdu, PduType};
use crate::version::Version;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: AnyPdu,
}

/// Whether `version` may carry a PDU of this type.
///
/// SNMPv1 has no GetBulk, Inform, v2 Trap or Report; SNMPv2c has no v1 Trap.
pub(crate) fn pdu_allowed(version: Version, pdu_type: PduType) -> bool {
    match version {
        Version::V1 => matches!(
            pdu_type,
            PduType::GetRequest
                | PduType::GetNextRequest
                | PduType::SetRequest
                | PduType::Response
                | PduType::TrapV1
        ),
        _ => pdu_type != PduType::TrapV1,
    }
}

impl CommunityMessage {
    /// Build a message, checking the version/PDU combination.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: impl Into<AnyPdu>) -> Result<Self> {
        let pdu = pdu.into();
        if !version.is_community() || !pdu_allowed(version, pdu.pdu_type()) {
            return Err(Error::encode(EncodeErrorKind::PduNotAllowed));
        }
        Ok(Self {
            version,
            community: community.into(),
            pdu,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let at = seq.offset();
        let raw = seq.read_integer()?;
        let version = Version::from_i32(raw)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownVersion(raw)))?;
        Self::decode_from_sequence(&mut seq, version)
    }

    /// Decode the remainder of a message whose version has already been read.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        if !version.is_community() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version.as_i32()),
            ));
        }
        let community = seq.read_octet_string()?;
        let at = seq.offset();
        let pdu_tag = seq.peek_tag().unwrap_or(0);
        let pdu = AnyPdu::decode(seq)?;
        if !pdu_allowed(version, pdu.pdu_type()) {
            return Err(Error::decode(
                at,
                DecodeErrorKind::PduNotAllowed {
                    version,
                    tag: pdu_tag,
                },
            ));
        }
        seq.finish()?;
        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}
