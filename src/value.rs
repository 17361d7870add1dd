//! Typed varbind values.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::util::hex;
use bytes::Bytes;
use std::fmt;

/// A varbind value.
///
/// Each variant corresponds to exactly one BER tag, so decoding and
/// re-encoding a value always reproduces the wire type.
#[derive(Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    /// Gauge32, also used for Unsigned32.
    Gauge32(u32),
    /// Hundredths of a second.
    TimeTicks(u32),
    Opaque(Bytes),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// A tag this crate does not interpret, kept verbatim.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// Wire tag for this value.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Integer(_) => tag::universal::INTEGER,
            Self::OctetString(_) => tag::universal::OCTET_STRING,
            Self::Null => tag::universal::NULL,
            Self::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Self::IpAddress(_) => tag::application::IP_ADDRESS,
            Self::Counter32(_) => tag::application::COUNTER32,
            Self::Gauge32(_) => tag::application::GAUGE32,
            Self::TimeTicks(_) => tag::application::TIMETICKS,
            Self::Opaque(_) => tag::application::OPAQUE,
            Self::Counter64(_) => tag::application::COUNTER64,
            Self::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Self::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
            Self::EndOfMibView => tag::context::END_OF_MIB_VIEW,
            Self::Unknown { tag, .. } => *tag,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(*v),
            Self::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::OctetString(b) | Self::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// OCTET STRING content as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::OctetString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Self::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Self::IpAddress(a) => Some(std::net::Ipv4Addr::from(*a)),
            _ => None,
        }
    }

    /// True for noSuchObject, noSuchInstance and endOfMibView.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Self::Integer(v) => buf.push_integer(*v),
            Self::OctetString(b) => buf.push_octet_string(b),
            Self::Null => buf.push_null(),
            Self::ObjectIdentifier(oid) => buf.push_oid(oid),
            Self::IpAddress(a) => buf.push_ip_address(*a),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => {
                buf.push_unsigned32(self.tag(), *v)
            }
            Self::Opaque(b) => buf.push_primitive(tag::application::OPAQUE, b),
            Self::Counter64(v) => buf.push_counter64(*v),
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView => {
                buf.push_primitive(self.tag(), &[])
            }
            Self::Unknown { tag, data } => buf.push_primitive(*tag, data),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let t = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match t {
            tag::universal::INTEGER => Self::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Self::OctetString(decoder.read_bytes(len)?),
            tag::universal::OCTET_STRING_CONSTRUCTED => {
                return Err(Error::decode(at, DecodeErrorKind::ConstructedOctetString));
            }
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(at, DecodeErrorKind::InvalidNull));
                }
                Self::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Self::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => Self::IpAddress(decoder.read_ip_address_value(len)?),
            tag::application::COUNTER32 => Self::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Self::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Self::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Self::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Self::Counter64(decoder.read_counter64_value(len)?),
            tag::context::NO_SUCH_OBJECT
            | tag::context::NO_SUCH_INSTANCE
            | tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                match t {
                    tag::context::NO_SUCH_OBJECT => Self::NoSuchObject,
                    tag::context::NO_SUCH_INSTANCE => Self::NoSuchInstance,
                    _ => Self::EndOfMibView,
                }
            }
            other => {
                tracing::debug!(
                    target: "snmp_dispatch::ber",
                    {
                        snmp.offset = at,
                        tag = other,
                    },
                    "preserving unknown value tag"
                );
                Self::Unknown {
                    tag: other,
                    data: decoder.read_bytes(len)?,
                }
            }
        };
        Ok(value)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "Integer({})", v),
            Self::OctetString(b) => write!(f, "OctetString({})", hex::encode(b)),
            Self::Null => write!(f, "Null"),
            Self::ObjectIdentifier(o) => write!(f, "ObjectIdentifier({})", o),
            Self::IpAddress(a) => write!(f, "IpAddress({})", std::net::Ipv4Addr::from(*a)),
            Self::Counter32(v) => write!(f, "Counter32({})", v),
            Self::Gauge32(v) => write!(f, "Gauge32({})", v),
            Self::TimeTicks(v) => write!(f, "TimeTicks({})", v),
            Self::Opaque(b) => write!(f, "Opaque({})", hex::encode(b)),
            Self::Counter64(v) => write!(f, "Counter64({})", v),
            Self::NoSuchObject => write!(f, "NoSuchObject"),
            Self::NoSuchInstance => write!(f, "NoSuchInstance"),
            Self::EndOfMibView => write!(f, "EndOfMibView"),
            Self::Unknown { tag, data } => {
                write!(f, "Unknown(0x{:02X}, {})", tag, hex::encode(data))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::OctetString(b) => match std::str::from_utf8(b) {
                Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
                    write!(f, "{}", s)
                }
                _ => write!(f, "0x{}", hex::encode(b)),
            },
            Self::Null => write!(f, "Null"),
            Self::ObjectIdentifier(o) => write!(f, "{}", o),
            Self::IpAddress(a) => write!(f, "{}", std::net::Ipv4Addr::from(*a)),
            Self::Counter32(v) | Self::Gauge32(v) => write!(f, "{}", v),
            Self::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86_400,
                    (secs / 3600) % 24,
                    (secs / 60) % 60,
                    secs % 60
                )
            }
            Self::Opaque(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Counter64(v) => write!(f, "{}", v),
            Self::NoSuchObject => write!(f, "noSuchObject"),
            Self::NoSuchInstance => write!(f, "noSuchInstance"),
            Self::EndOfMibView => write!(f, "endOfMibView"),
            Self::Unknown { tag, data } => write!(f, "[0x{:02X}] 0x{}", tag, hex::encode(data)),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::OctetString(Bytes::from(s))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Self::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Self::IpAddress(addr.octets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn reencode(value: &Value) -> Value {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        let mut d = Decoder::new(buf.finish());
        let out = Value::decode(&mut d).unwrap();
        assert!(d.is_empty());
        out
    }

    #[test]
    fn tag_survives_reencoding() {
        let values = [
            Value::Integer(-5),
            Value::from("hello"),
            Value::Null,
            Value::from(oid!(1, 3, 6, 1)),
            Value::IpAddress([192, 168, 0, 1]),
            Value::Counter32(u32::MAX),
            Value::Gauge32(7),
            Value::TimeTicks(12345),
            Value::Opaque(Bytes::from_static(&[1, 2])),
            Value::Counter64(u64::MAX),
            Value::NoSuchObject,
            Value::NoSuchInstance,
            Value::EndOfMibView,
        ];
        for v in &values {
            let out = reencode(v);
            assert_eq!(out.tag(), v.tag());
            assert_eq!(&out, v);
        }
    }

    #[test]
    fn unknown_tag_preserved() {
        let mut d = Decoder::from_slice(&[0x47, 0x02, 0xAA, 0xBB]);
        let v = Value::decode(&mut d).unwrap();
        assert_eq!(
            v,
            Value::Unknown {
                tag: 0x47,
                data: Bytes::from_static(&[0xAA, 0xBB])
            }
        );
        assert_eq!(reencode(&v), v);
    }

    #[test]
    fn ip_address_length_checked() {
        let mut d = Decoder::from_slice(&[0x40, 0x03, 1, 2, 3]);
        assert!(Value::decode(&mut d).is_err());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("Linux").to_string(), "Linux");
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0x00, 0xFF])).to_string(),
            "0x00ff"
        );
        assert_eq!(Value::TimeTicks(9_000_000).to_string(), "1d 1h 0m 0s");
        assert_eq!(Value::NoSuchInstance.to_string(), "noSuchInstance");
        assert_eq!(Value::IpAddress([10, 0, 0, 1]).to_string(), "10.0.0.1");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Gauge32(3).as_u32(), Some(3));
        assert_eq!(Value::Integer(-1).as_u32(), None);
        assert_eq!(Value::Counter64(9).as_u64(), Some(9));
        assert!(Value::EndOfMibView.is_exception());
        assert!(!Value::Null.is_exception());
    }
}
