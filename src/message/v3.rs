//! SNMPv3 message envelope (RFC 3412 section 6).
//!
//! ```text
//! SNMPv3Message ::= SEQUENCE {
//!     msgVersion            INTEGER (3),
//!     msgGlobalData         HeaderData,
//!     msgSecurityParameters OCTET STRING,  -- USM, opaque here
//!     msgData               ScopedPduData  -- plaintext or encrypted
//! }
//! ```

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{Pdu, PduType};
use bytes::Bytes;

/// Smallest msgMaxSize a conforming engine may advertise.
pub const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// Security models this crate understands (RFC 3411).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SecurityModel {
    /// SNMPv1 community
    V1 = 1,
    /// SNMPv2c community
    V2c = 2,
    /// User-based security model
    Usm = 3,
}

impl SecurityModel {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2c),
            3 => Some(Self::Usm),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// v3 security level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecurityLevel {
    #[default]
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Level encoded in the low two msgFlags bits; `None` for priv without auth.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags & 0x03 {
            0x00 => Some(Self::NoAuthNoPriv),
            0x01 => Some(Self::AuthNoPriv),
            0x03 => Some(Self::AuthPriv),
            _ => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoAuthNoPriv => "noAuthNoPriv",
            Self::AuthNoPriv => "authNoPriv",
            Self::AuthPriv => "authPriv",
        })
    }
}

const REPORTABLE: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(Self {
            security_level: SecurityLevel::from_flags(byte)?,
            reportable: byte & REPORTABLE != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        let reportable = if self.reportable { REPORTABLE } else { 0 };
        self.security_level.to_flags() | reportable
    }
}

/// HeaderData.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let at = seq.offset();
        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(Error::decode(at, DecodeErrorKind::InvalidMsgId { value: msg_id }));
        }

        let at = seq.offset();
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                at,
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MINIMUM,
                },
            ));
        }

        let at = seq.offset();
        let flags = seq.read_octet_string()?;
        let msg_flags = match flags.as_ref() {
            [byte] => MsgFlags::from_byte(*byte),
            _ => None,
        }
        .ok_or_else(|| Error::decode(at, DecodeErrorKind::InvalidMsgFlags))?;

        let at = seq.offset();
        let model = seq.read_integer()?;
        // Only USM may appear inside a v3 envelope.
        let msg_security_model = match SecurityModel::from_i32(model) {
            Some(SecurityModel::Usm) => SecurityModel::Usm,
            _ => {
                return Err(Error::decode(
                    at,
                    DecodeErrorKind::UnknownSecurityModel(model),
                ));
            }
        };
        seq.finish()?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// ScopedPDU: context plus PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        seq.finish()?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }

    /// Decode a decrypted ScopedPDU.
    ///
    /// Block ciphers pad the plaintext, so bytes after the SEQUENCE are
    /// ignored here.
    pub fn decode_decrypted(plaintext: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(plaintext);
        Self::decode(&mut decoder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// BER-encoded `UsmSecurityParameters`.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    pub fn new_encrypted(global_data: MsgGlobalData, security_params: Bytes, encrypted: Bytes) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(encrypted),
        }
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(s) => Some(s),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn pdu(&self) -> Option<&Pdu> {
        self.scoped_pdu().map(|s| &s.pdu)
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(data) => buf.push_octet_string(data),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(crate::version::Version::V3.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let at = seq.offset();
        let version = seq.read_integer()?;
        if version != crate::version::Version::V3.as_i32() {
            return Err(Error::decode(at, DecodeErrorKind::UnknownVersion(version)));
        }
        Self::decode_from_sequence(&mut seq)
    }

    /// Decode the remainder of a message whose version has already been read.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let at = seq.offset();
        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            if seq.peek_tag() == Some(tag::universal::OCTET_STRING) {
                return Err(Error::decode(at, DecodeErrorKind::UnexpectedEncryption));
            }
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };
        seq.finish()?;

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Engine ID discovery probe (RFC 3414 section 4).
    ///
    /// noAuthNoPriv, reportable, empty USM parameters and an empty GET.
    pub fn discovery_request(msg_id: i32, request_id: i32, msg_max_size: i32) -> Self {
        let global = MsgGlobalData::new(
            msg_id,
            msg_max_size,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );
        let params = crate::v3::UsmSecurityParams::empty().encode();
        let pdu = Pdu::new(PduType::GetRequest, request_id, Vec::new());
        Self::new(global, params, ScopedPdu::new(Bytes::new(), Bytes::new(), pdu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn global(level: SecurityLevel) -> MsgGlobalData {
        MsgGlobalData::new(1234, 65507, MsgFlags::new(level, true))
    }

    #[test]
    fn flags_byte() {
        let f = MsgFlags::new(SecurityLevel::AuthPriv, true);
        assert_eq!(f.to_byte(), 0x07);
        assert_eq!(MsgFlags::from_byte(0x07), Some(f));
        assert_eq!(MsgFlags::from_byte(0x02), None);
        assert_eq!(
            MsgFlags::from_byte(0x01),
            Some(MsgFlags::new(SecurityLevel::AuthNoPriv, false))
        );
    }

    #[test]
    fn level_ordering() {
        assert!(SecurityLevel::AuthPriv > SecurityLevel::AuthNoPriv);
        assert!(SecurityLevel::AuthNoPriv.requires_auth());
        assert!(!SecurityLevel::AuthNoPriv.requires_priv());
    }

    #[test]
    fn plaintext_round_trip() {
        let scoped = ScopedPdu::new(
            &b"\x80\x00\x1f\x88\x04"[..],
            Bytes::new(),
            Pdu::get_request(5, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        );
        let msg = V3Message::new(global(SecurityLevel::NoAuthNoPriv), Bytes::from_static(&[0x30, 0x00]), scoped);
        assert_eq!(V3Message::decode(msg.encode()).unwrap(), msg);
    }

    #[test]
    fn encrypted_round_trip() {
        let msg = V3Message::new_encrypted(
            global(SecurityLevel::AuthPriv),
            Bytes::from_static(&[0x30, 0x00]),
            Bytes::from_static(&[1, 2, 3, 4]),
        );
        let back = V3Message::decode(msg.encode()).unwrap();
        assert!(back.scoped_pdu().is_none());
        assert_eq!(back, msg);
    }

    #[test]
    fn small_max_size_rejected() {
        let mut g = global(SecurityLevel::NoAuthNoPriv);
        g.msg_max_size = 100;
        let mut buf = EncodeBuf::new();
        g.encode(&mut buf);
        assert!(MsgGlobalData::decode(&mut Decoder::new(buf.finish())).is_err());
    }

    #[test]
    fn non_usm_model_rejected() {
        let mut g = global(SecurityLevel::NoAuthNoPriv);
        g.msg_security_model = SecurityModel::V2c;
        let mut buf = EncodeBuf::new();
        g.encode(&mut buf);
        let err = MsgGlobalData::decode(&mut Decoder::new(buf.finish())).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownSecurityModel(2),
                ..
            }
        ));
    }

    #[test]
    fn discovery_probe_shape() {
        let msg = V3Message::discovery_request(1, 2, 65507);
        let back = V3Message::decode(msg.encode()).unwrap();
        assert!(back.global_data.msg_flags.reportable);
        assert_eq!(back.security_level(), SecurityLevel::NoAuthNoPriv);
        assert!(back.pdu().unwrap().varbinds.is_empty());
    }

    #[test]
    fn v2c_tag_rejected_by_v3_decoder() {
        let msg = crate::message::CommunityMessage::new(
            crate::version::Version::V2c,
            &b"public"[..],
            Pdu::get_request(1, &[oid!(1, 3)]),
        )
        .unwrap();
        assert!(V3Message::decode(msg.encode()).is_err());
    }
}
