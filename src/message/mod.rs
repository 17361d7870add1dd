//! Message envelopes for each SNMP version.

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MSG_MAX_SIZE_MINIMUM, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel,
    V3Message, V3MessageData,
};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::version::Version;
use bytes::Bytes;

/// A decoded message of any version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    /// Decode a datagram, choosing the decoder from the version tag.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let version = read_version(&mut seq)?;
        let msg = match version {
            Version::V1 | Version::V2c => {
                Self::Community(CommunityMessage::decode_from_sequence(&mut seq, version)?)
            }
            Version::V3 => Self::V3(V3Message::decode_from_sequence(&mut seq)?),
        };
        decoder.finish()?;
        Ok(msg)
    }

    pub fn version(&self) -> Version {
        match self {
            Self::Community(m) => m.version,
            Self::V3(_) => Version::V3,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Community(m) => m.encode(),
            Self::V3(m) => m.encode(),
        }
    }
}

fn read_version(seq: &mut Decoder) -> Result<Version> {
    let at = seq.offset();
    let raw = seq.read_integer()?;
    Version::from_i32(raw).ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownVersion(raw)))
}

/// Read only the version of a datagram.
///
/// Used to count `snmpInBadVersions` without decoding the rest.
pub fn peek_version(data: &[u8]) -> Result<Version> {
    let mut decoder = Decoder::from_slice(data);
    let mut seq = decoder.read_sequence()?;
    read_version(&mut seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::Pdu;

    #[test]
    fn routes_by_version() {
        let v1 = CommunityMessage::new(Version::V1, &b"c"[..], Pdu::get_request(1, &[oid!(1, 3)]))
            .unwrap();
        assert_eq!(Message::decode(v1.encode()).unwrap().version(), Version::V1);

        let v3 = V3Message::discovery_request(1, 1, 65507);
        let decoded = Message::decode(v3.encode()).unwrap();
        assert!(matches!(decoded, Message::V3(_)));
        assert_eq!(peek_version(&v3.encode()).unwrap(), Version::V3);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(Message::decode(Bytes::from_static(b"not snmp")).is_err());
        assert!(Message::decode(Bytes::new()).is_err());
        assert!(peek_version(&[0x30, 0x03, 0x02, 0x01, 0x02]).is_err());
    }

    #[test]
    fn trailing_garbage_rejected() {
        let msg = CommunityMessage::new(Version::V2c, &b"c"[..], Pdu::get_request(1, &[oid!(1, 3)]))
            .unwrap();
        let mut raw = msg.encode().to_vec();
        raw.push(0);
        assert!(Message::decode(Bytes::from(raw)).is_err());
    }
}
