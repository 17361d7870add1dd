//! BER identifier octets used by SNMP.
//!
//! SNMP only uses single-octet (low tag number) identifiers, so a tag is a
//! plain `u8`: two class bits, the constructed bit, then the tag number.

/// Class bits (bits 8-7 of the identifier octet).
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const PRIVATE: u8 = 0xC0;
}

/// Constructed bit (bit 6).
pub const CONSTRUCTED: u8 = 0x20;

/// ASN.1 universal types.
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    /// Constructed OCTET STRING. Never valid in SNMP.
    pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// SMIv2 application types (RFC 2578).
pub mod application {
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    /// Gauge32 and Unsigned32 share this tag.
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
}

/// Varbind exception markers (RFC 3416).
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// PDU tags: context-specific, constructed.
pub mod pdu {
    use super::CONSTRUCTED;
    use super::class::CONTEXT_SPECIFIC;

    const BASE: u8 = CONTEXT_SPECIFIC | CONSTRUCTED;

    pub const GET_REQUEST: u8 = BASE;
    pub const GET_NEXT_REQUEST: u8 = BASE | 0x01;
    pub const RESPONSE: u8 = BASE | 0x02;
    pub const SET_REQUEST: u8 = BASE | 0x03;
    pub const TRAP_V1: u8 = BASE | 0x04;
    pub const GET_BULK_REQUEST: u8 = BASE | 0x05;
    pub const INFORM_REQUEST: u8 = BASE | 0x06;
    pub const TRAP_V2: u8 = BASE | 0x07;
    pub const REPORT: u8 = BASE | 0x08;
}

#[inline]
pub const fn is_constructed(tag: u8) -> bool {
    tag & CONSTRUCTED != 0
}

#[inline]
pub const fn tag_class(tag: u8) -> u8 {
    tag & 0xC0
}

#[inline]
pub const fn tag_number(tag: u8) -> u8 {
    tag & 0x1F
}
