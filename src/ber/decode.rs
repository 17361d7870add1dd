//! BER decoding.
//!
//! The decoder is deliberately lenient where real agents are sloppy
//! (non-minimal lengths, oversized integers) and strict where sloppiness
//! would be unsafe (truncation, indefinite lengths, absurd sizes).

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// Cursor over a BER-encoded buffer.
///
/// Sub-decoders share the underlying `Bytes` allocation; reading an
/// OCTET STRING is a cheap slice.
#[derive(Debug, Clone)]
pub struct Decoder {
    data: Bytes,
    offset: usize,
    /// Absolute position of `data[0]` in the outermost buffer, for errors.
    base: usize,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Absolute offset of the cursor, for error reporting.
    pub fn offset(&self) -> usize {
        self.base + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn err(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(self.offset(), kind)
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .peek_tag()
            .ok_or_else(|| self.err(DecodeErrorKind::TruncatedData))?;
        self.offset += 1;
        Ok(tag)
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset())?;
        self.offset += consumed;
        Ok(len)
    }

    /// Take `len` bytes as a zero-copy slice.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let end = self.offset.saturating_add(len);
        if end > self.data.len() {
            return Err(self.err(DecodeErrorKind::TlvOverflow));
        }
        let out = self.data.slice(self.offset..end);
        self.offset = end;
        Ok(out)
    }

    pub fn expect_tag(&mut self, expected: u8) -> Result<()> {
        let at = self.offset();
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        Ok(())
    }

    /// Read tag and length, returning the tag and a decoder over the content.
    pub fn read_tlv(&mut self) -> Result<(u8, Decoder)> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        let base = self.offset();
        let content = self.read_bytes(len)?;
        Ok((
            tag,
            Decoder {
                data: content,
                offset: 0,
                base,
            },
        ))
    }

    /// Read a constructed value with the given tag and return a sub-decoder.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let at = self.offset();
        let (actual, inner) = self.read_tlv()?;
        if actual != expected {
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        Ok(inner)
    }

    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Skip one complete TLV.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tlv().map(|_| ())
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        self.expect_tag(tag::universal::INTEGER)?;
        let len = self.read_length()?;
        self.read_integer_value(len)
    }

    /// Read INTEGER content octets of known length.
    ///
    /// More than four octets is accepted by keeping the first four, which is
    /// what net-snmp does for malformed agents.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.err(DecodeErrorKind::ZeroLengthInteger));
        }
        let at = self.offset();
        let content = self.read_bytes(len)?;
        if len > 4 {
            tracing::warn!(
                target: "snmp_dispatch::ber",
                {
                    snmp.offset = at,
                    length = len,
                },
                "integer longer than 4 octets, truncating"
            );
        }
        let used = &content[..len.min(4)];
        let seed: i32 = if used[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(used.iter().fold(seed, |acc, &b| (acc << 8) | b as i32))
    }

    /// Read a non-negative INTEGER-encoded value under `expected_tag`.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        self.expect_tag(expected_tag)?;
        let len = self.read_length()?;
        self.read_unsigned32_value(len)
    }

    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        let value = self.read_unsigned_value(len, 5)?;
        u32::try_from(value).map_err(|_| self.err(DecodeErrorKind::IntegerOverflow))
    }

    pub fn read_counter64_value(&mut self, len: usize) -> Result<u64> {
        if len > 9 {
            return Err(self.err(DecodeErrorKind::Integer64TooLong { length: len }));
        }
        self.read_unsigned_value(len, 9)
    }

    fn read_unsigned_value(&mut self, len: usize, max_len: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.err(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > max_len {
            return Err(self.err(DecodeErrorKind::IntegerOverflow));
        }
        let content = self.read_bytes(len)?;
        if len == max_len && content[0] != 0 {
            return Err(self.err(DecodeErrorKind::IntegerOverflow));
        }
        Ok(content.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let at = self.offset();
        let tag = self.read_tag()?;
        if tag == tag::universal::OCTET_STRING_CONSTRUCTED {
            return Err(Error::decode(at, DecodeErrorKind::ConstructedOctetString));
        }
        if tag != tag::universal::OCTET_STRING {
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::OCTET_STRING,
                    actual: tag,
                },
            ));
        }
        let len = self.read_length()?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.expect_tag(tag::universal::NULL)?;
        let len = self.read_length()?;
        if len != 0 {
            return Err(self.err(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        let len = self.read_length()?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let at = self.offset();
        let content = self.read_bytes(len)?;
        Oid::from_ber(&content).map_err(|e| match e {
            Error::Decode { offset, kind } => Error::decode(at + offset, kind),
            other => other,
        })
    }

    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.err(DecodeErrorKind::InvalidIpAddressLength { length: len }));
        }
        let content = self.read_bytes(4)?;
        Ok([content[0], content[1], content[2], content[3]])
    }

    /// Underlying buffer (the full content this decoder was created over).
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Error if any bytes are left.
    pub fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.err(DecodeErrorKind::TrailingData {
                remaining: self.remaining(),
            }))
        }
    }
}
