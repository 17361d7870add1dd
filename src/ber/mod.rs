//! BER (Basic Encoding Rules) codec for SNMP.
//!
//! Only the subset of X.690 that SNMP uses: single-octet tags and definite
//! lengths.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length, length_size};
