//! BER encoding into a reverse buffer.
//!
//! Content is written back to front, so a constructed value's length is
//! known by the time its header is written and no second pass is needed.
//! Callers therefore push the fields of a SEQUENCE in reverse order.

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;
use bytes::Bytes;

/// Reverse-order BER writer.
#[derive(Debug)]
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Prepend one byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Prepend `bytes`, keeping their forward order in the output.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    pub fn push_length(&mut self, len: usize) {
        let (octets, n) = encode_length(len);
        self.buf.extend_from_slice(&octets[..n]);
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend a complete primitive TLV.
    pub fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    /// Encode a constructed value; `f` pushes the contents (last field first).
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let mark = self.len();
        f(self);
        let content_len = self.len() - mark;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    pub fn push_integer(&mut self, value: i32) {
        let be = value.to_be_bytes();
        let skip = signed_skip(&be);
        self.push_primitive(tag::universal::INTEGER, &be[skip..]);
    }

    /// Unsigned 32-bit value under an application tag (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let (arr, n) = unsigned_content(value as u64);
        self.push_primitive(tag, &arr[9 - n..]);
    }

    /// Counter64.
    pub fn push_counter64(&mut self, value: u64) {
        let (arr, n) = unsigned_content(value);
        self.push_primitive(tag::application::COUNTER64, &arr[9 - n..]);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &ber);
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Reverse the buffer into wire order.
    pub fn finish(self) -> Bytes {
        Bytes::from(self.finish_vec())
    }

    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Leading octets of a big-endian two's complement value that can be dropped
/// while keeping the sign bit intact.
#[inline]
fn signed_skip(be: &[u8; 4]) -> usize {
    let mut skip = 0;
    while skip < 3 {
        let redundant = (be[skip] == 0x00 && be[skip + 1] & 0x80 == 0)
            || (be[skip] == 0xFF && be[skip + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        skip += 1;
    }
    skip
}

/// Minimal content octets of a non-negative INTEGER.
///
/// The valid octets are the last `n` of the returned array; a leading 0x00 is
/// kept when the top bit of the first significant octet is set.
#[inline]
fn unsigned_content(value: u64) -> ([u8; 9], usize) {
    let mut arr = [0u8; 9];
    arr[1..].copy_from_slice(&value.to_be_bytes());
    let significant = 8 - (value.leading_zeros() as usize / 8).min(7);
    let first = arr[9 - significant];
    let n = if first & 0x80 != 0 {
        significant + 1
    } else {
        significant
    };
    (arr, n)
}
