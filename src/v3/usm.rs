//! `UsmSecurityParameters` (RFC 3414 section 2.4).

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};

/// USM security parameters carried in msgSecurityParameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// All-empty parameters, as sent in a discovery probe.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reserve a zero-filled MAC slot of `mac_len` bytes.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.auth_params.len());
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_integer(clamp_i32(self.engine_time));
            buf.push_integer(clamp_i32(self.engine_boots));
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let at = seq.offset();
        let boots = seq.read_integer()?;
        let engine_boots = u32::try_from(boots)
            .map_err(|_| Error::decode(at, DecodeErrorKind::InvalidEngineBoots { value: boots }))?;

        let at = seq.offset();
        let time = seq.read_integer()?;
        let engine_time = u32::try_from(time)
            .map_err(|_| Error::decode(at, DecodeErrorKind::InvalidEngineTime { value: time }))?;

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;
        seq.finish()?;
        decoder.finish()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters inside a whole encoded v3
    /// message.
    ///
    /// Returns the absolute offset and length of the parameter's content so
    /// the MAC can be written or checked in place.
    pub fn find_auth_params_offset(message: &[u8]) -> Option<(usize, usize)> {
        let mut decoder = Decoder::from_slice(message);
        let mut outer = decoder.read_sequence().ok()?;
        outer.skip_tlv().ok()?; // msgVersion
        outer.skip_tlv().ok()?; // msgGlobalData
        outer.expect_tag(tag::universal::OCTET_STRING).ok()?;
        outer.read_length().ok()?;
        let mut usm = outer.read_sequence().ok()?;
        for _ in 0..4 {
            usm.skip_tlv().ok()?;
        }
        usm.expect_tag(tag::universal::OCTET_STRING).ok()?;
        let len = usm.read_length().ok()?;
        let offset = usm.offset();
        (offset + len <= message.len()).then_some((offset, len))
    }
}

fn clamp_i32(v: u32) -> i32 {
    v.min(i32::MAX as u32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
    use crate::oid;
    use crate::pdu::Pdu;

    #[test]
    fn round_trip() {
        let params = UsmSecurityParams::new(&b"\x80\x00\x1f\x88\x04"[..], 3, 1234, &b"security"[..])
            .with_auth_placeholder(48)
            .with_priv_params(Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 9]));
        let back = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn empty_encoding() {
        let enc = UsmSecurityParams::empty().encode();
        assert_eq!(
            enc.as_ref(),
            &[0x30, 0x0E, 0x04, 0x00, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00, 0x04, 0x00]
        );
    }

    #[test]
    fn negative_boots_rejected() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(b"");
            buf.push_octet_string(b"");
            buf.push_octet_string(b"");
            buf.push_integer(0);
            buf.push_integer(-1);
            buf.push_octet_string(b"e");
        });
        let err = UsmSecurityParams::decode(buf.finish()).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::InvalidEngineBoots { value: -1 },
                ..
            }
        ));
    }

    #[test]
    fn locates_auth_params_in_message() {
        let params = UsmSecurityParams::new(&b"engine"[..], 1, 2, &b"user"[..]).with_auth_placeholder(12);
        let msg = V3Message::new(
            MsgGlobalData::new(7, 65507, MsgFlags::new(SecurityLevel::AuthNoPriv, true)),
            params.encode(),
            ScopedPdu::new(&b"engine"[..], Bytes::new(), Pdu::get_request(1, &[oid!(1, 3, 6)])),
        );
        let encoded = msg.encode();
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
        assert_eq!(len, 12);
        assert!(encoded[offset..offset + len].iter().all(|&b| b == 0));
        // the byte before the slot is the length
        assert_eq!(encoded[offset - 1], 12);
        assert_eq!(encoded[offset - 2], tag::universal::OCTET_STRING);
    }

    #[test]
    fn locate_fails_on_garbage() {
        assert!(UsmSecurityParams::find_auth_params_offset(b"\x30\x02\x02\x00").is_none());
    }
}
