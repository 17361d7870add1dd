//! Error types for snmp-dispatch.
//!
//! [`Error`] is the single error type of the crate. Sub-kinds keep the enum
//! small and `Copy` where possible; see the `*ErrorKind` types.

use std::net::SocketAddr;
use std::time::Duration;

use crate::version::Version;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Cipher failures while encrypting or decrypting a scoped PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoErrorKind {
    #[error("no privacy key available")]
    NoPrivKey,
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("cipher operation failed")]
    CipherError,
    #[error("invalid privParameters length: expected {expected}, got {actual}")]
    InvalidPrivParamsLength { expected: usize, actual: usize },
    #[error("ciphertext length {length} not multiple of block size {block_size}")]
    InvalidCiphertextLength { length: usize, block_size: usize },
}

/// Why a datagram could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    #[error("expected tag 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("unexpected end of data")]
    TruncatedData,
    #[error("indefinite length encoding not supported")]
    IndefiniteLength,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("zero-length integer")]
    ZeroLengthInteger,
    #[error("invalid OID encoding")]
    InvalidOidEncoding,
    #[error("OID has {count} arcs, exceeds maximum {max}")]
    OidTooLong { count: usize, max: usize },
    #[error("unknown SNMP version: {0}")]
    UnknownVersion(i32),
    #[error("unknown PDU type: 0x{0:02X}")]
    UnknownPduType(u8),
    #[error("PDU type 0x{tag:02X} not allowed in {version}")]
    PduNotAllowed { version: Version, tag: u8 },
    #[error("constructed OCTET STRING (0x24) not supported")]
    ConstructedOctetString,
    /// Privacy flag set without authentication.
    #[error("invalid msgFlags: privacy without authentication")]
    InvalidMsgFlags,
    #[error("unknown security model: {0}")]
    UnknownSecurityModel(i32),
    /// msgMaxSize below 484 octets (RFC 3412).
    #[error("msgMaxSize {value} below minimum {minimum}")]
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    #[error("msgID {value} outside range 0..2147483647")]
    InvalidMsgId { value: i32 },
    #[error("engine boots {value} outside range 0..2147483647")]
    InvalidEngineBoots { value: i32 },
    #[error("engine time {value} outside range 0..2147483647")]
    InvalidEngineTime { value: i32 },
    #[error("NULL with non-zero length")]
    InvalidNull,
    /// Plaintext scoped PDU expected but the privacy flag was not set.
    #[error("expected plaintext scoped PDU")]
    UnexpectedEncryption,
    #[error("IP address must be 4 bytes, got {length}")]
    InvalidIpAddressLength { length: usize },
    #[error("length encoding too long ({octets} octets)")]
    LengthTooLong { octets: usize },
    #[error("length {length} exceeds maximum {max}")]
    LengthExceedsMax { length: usize, max: usize },
    #[error("integer64 too long: {length} bytes")]
    Integer64TooLong { length: usize },
    #[error("TLV extends past end of data")]
    TlvOverflow,
    #[error("{remaining} trailing bytes after message")]
    TrailingData { remaining: usize },
    /// Engine discovery Report without an authoritative engine ID.
    #[error("empty engine ID in discovery response")]
    EmptyEngineId,
    /// Notification whose second varbind is not `snmpTrapOID.0`.
    #[error("notification has no snmpTrapOID.0")]
    MissingTrapOid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeErrorKind {
    #[error("engine not discovered")]
    EngineNotDiscovered,
    #[error("auth key not available for encoding")]
    MissingAuthKey,
    #[error("privacy key not available")]
    NoPrivKey,
    #[error("could not find auth params position in encoded message")]
    MissingAuthParams,
    /// Wrong PDU class for the operation or message version.
    #[error("PDU type not allowed here")]
    PduNotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OidErrorKind {
    #[error("empty OID")]
    Empty,
    #[error("invalid arc value")]
    InvalidArc,
    #[error("first arc must be 0, 1, or 2, got {0}")]
    InvalidFirstArc(u32),
    #[error("second arc {second} too large for first arc {first}")]
    InvalidSecondArc { first: u32, second: u32 },
    #[error("OID has {count} arcs, exceeds maximum {max}")]
    TooManyArcs { count: usize, max: usize },
}

/// USM failure reported by a remote engine, or detected locally.
///
/// Each kind corresponds to one of the `usmStats` counters (RFC 3414).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UsmErrorKind {
    #[error("unsupported security level")]
    UnsupportedSecurityLevel,
    #[error("not in time window")]
    NotInTimeWindow,
    #[error("unknown user name")]
    UnknownUserName,
    #[error("unknown engine ID")]
    UnknownEngineId,
    #[error("wrong digest")]
    WrongDigest,
    #[error("decryption error")]
    DecryptionError,
}

macro_rules! error_status {
    ($($code:literal => $variant:ident : $name:literal,)*) => {
        /// SNMP error-status codes (RFC 3416).
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum ErrorStatus {
            $($variant,)*
            /// Code outside 0..=18.
            Unknown(i32),
        }

        impl ErrorStatus {
            pub fn from_i32(value: i32) -> Self {
                match value {
                    $($code => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }

            pub fn as_i32(&self) -> i32 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unknown(code) => *code,
                }
            }
        }

        impl std::fmt::Display for ErrorStatus {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($name),)*
                    Self::Unknown(code) => write!(f, "unknown({code})"),
                }
            }
        }
    };
}

error_status! {
    0 => NoError: "noError",
    1 => TooBig: "tooBig",
    2 => NoSuchName: "noSuchName",
    3 => BadValue: "badValue",
    4 => ReadOnly: "readOnly",
    5 => GenErr: "genErr",
    6 => NoAccess: "noAccess",
    7 => WrongType: "wrongType",
    8 => WrongLength: "wrongLength",
    9 => WrongEncoding: "wrongEncoding",
    10 => WrongValue: "wrongValue",
    11 => NoCreation: "noCreation",
    12 => InconsistentValue: "inconsistentValue",
    13 => ResourceUnavailable: "resourceUnavailable",
    14 => CommitFailed: "commitFailed",
    15 => UndoFailed: "undoFailed",
    16 => AuthorizationError: "authorizationError",
    17 => NotWritable: "notWritable",
    18 => InconsistentName: "inconsistentName",
}

fn peer(target: &Option<SocketAddr>, prefix: &str) -> String {
    target.map(|t| format!(" {prefix} {t}")).unwrap_or_default()
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error{}: {source}", peer(target, "communicating with"))]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// No Response after the last retransmission.
    #[error("timeout after {elapsed:?}{} (request_id={request_id}, retries={retries})", peer(target, "waiting for"))]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        retries: u32,
    },

    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>,
    },

    #[error("decode error at offset {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// USM processing failure, either detected locally or signalled by a
    /// Report PDU from the remote engine.
    #[error("USM error{}: {kind}", peer(target, "from"))]
    Usm {
        target: Option<SocketAddr>,
        kind: UsmErrorKind,
    },

    /// Community not accepted by this dispatcher.
    #[error("invalid community{}", peer(target, "from"))]
    InvalidCommunity { target: Option<SocketAddr> },

    /// Security name not present in the user table.
    #[error("unknown USM user '{name}'")]
    UnknownUser { name: Box<str> },

    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// The dispatcher was shut down while the request was in flight.
    #[error("dispatcher shut down")]
    Cancelled,
}

impl Error {
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    pub fn usm(target: Option<SocketAddr>, kind: UsmErrorKind) -> Self {
        Self::Usm { target, kind }
    }

    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Invalid OID error keeping the text that failed to parse.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    pub fn config(msg: impl Into<Box<str>>) -> Self {
        Self::Config(msg.into())
    }

    /// Peer address the error relates to, if any.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. }
            | Self::Timeout { target, .. }
            | Self::DecryptionFailed { target, .. }
            | Self::EncryptionFailed { target, .. }
            | Self::Usm { target, .. }
            | Self::InvalidCommunity { target } => *target,
            _ => None,
        }
    }

    /// Fill in the peer address on variants that carry one.
    pub(crate) fn with_target(mut self, addr: SocketAddr) -> Self {
        match &mut self {
            Self::Io { target, .. }
            | Self::Timeout { target, .. }
            | Self::DecryptionFailed { target, .. }
            | Self::EncryptionFailed { target, .. }
            | Self::Usm { target, .. }
            | Self::InvalidCommunity { target } => *target = Some(addr),
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_roundtrips_known_codes() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::NotWritable.to_string(), "notWritable");
    }

    #[test]
    fn timeout_display_includes_target() {
        let err = Error::Timeout {
            target: Some("127.0.0.1:161".parse().unwrap()),
            elapsed: Duration::from_millis(2000),
            request_id: 42,
            retries: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:161"));
        assert!(msg.contains("request_id=42"));
        assert!(msg.contains("retries=3"));
    }

    #[test]
    fn with_target_sets_address() {
        let addr: SocketAddr = "10.0.0.1:162".parse().unwrap();
        let err = Error::usm(None, UsmErrorKind::WrongDigest).with_target(addr);
        assert_eq!(err.target(), Some(addr));
        assert_eq!(err.to_string(), "USM error from 10.0.0.1:162: wrong digest");

        let err = Error::decode(0, DecodeErrorKind::TruncatedData).with_target(addr);
        assert_eq!(err.target(), None);
    }
}
