//! BER definite-length encoding (X.690 8.1.3).

use crate::error::{DecodeErrorKind, Error, Result};

/// Largest content length accepted on decode (2 MiB).
///
/// A UDP datagram can never come close; this bounds allocations driven by
/// hostile length fields.
pub const MAX_LENGTH: usize = 0x20_0000;

/// Encode a length for the reverse encode buffer.
///
/// Returns the octets in *reverse* order together with the number of valid
/// octets, so they can be pushed directly onto an `EncodeBuf`.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut out = [0u8; 5];
    if len < 0x80 {
        out[0] = len as u8;
        return (out, 1);
    }

    let mut n = 0;
    let mut rest = len;
    while rest > 0 && n < 4 {
        out[n] = (rest & 0xFF) as u8;
        rest >>= 8;
        n += 1;
    }
    out[n] = 0x80 | n as u8;
    (out, n + 1)
}

/// Number of octets the length field for `len` occupies.
pub fn length_size(len: usize) -> usize {
    encode_length(len).1
}

/// Decode a length field at the start of `data`.
///
/// `base_offset` is only used for error reporting. Returns the content length
/// and the number of octets consumed by the length field.
///
/// Non-minimal long forms (e.g. `0x81 0x05`) are accepted; several agents
/// in the field emit them.
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    };

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(Error::decode(base_offset, DecodeErrorKind::IndefiniteLength));
    }
    if count > 4 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthTooLong { octets: count },
        ));
    }
    let Some(octets) = data.get(1..1 + count) else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    };

    let len = octets.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        ));
    }

    Ok((len, 1 + count))
}
