//! User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! - USM security parameter encoding and auth-parameter location
//! - password to key derivation and key localization
//! - HMAC authentication (MD5, SHA-1, SHA-2 family)
//! - DES-CBC and AES-CFB privacy
//! - engine state, time windows and discovery
//! - the user table

pub mod auth;
mod engine;
mod privacy;
mod user;
mod usm;

pub use auth::{LocalizedKey, MasterKey};
pub use engine::{
    DEFAULT_MSG_MAX_SIZE, EngineCache, EngineState, LocalEngine, MAX_ENGINE_TIME, TIME_WINDOW,
    report_kind, report_oids, report_pdu,
};
pub use privacy::{PrivKey, SaltCounter};
pub use user::{UsmAuthUserBuilder, UsmPrivUserBuilder, UsmUser, UsmUserBuilder, UserKeys, UserTable};
pub use usm::UsmSecurityParams;

/// Key extension strategy for privacy key derivation.
///
/// Chosen automatically from the auth/priv protocol pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum KeyExtension {
    /// Plain RFC 3414 localized key.
    #[default]
    None,
    /// Blumenthal extension (draft-blumenthal-aes-usm-04) for AES-192/256.
    Blumenthal,
}

/// Unrecognized protocol name in [`AuthProtocol`] or [`PrivProtocol`] parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseProtocolError {
    #[error("unknown authentication protocol '{0}'; expected one of: MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512")]
    Auth(String),
    #[error("unknown privacy protocol '{0}'; expected one of: DES, AES, AES-192, AES-256")]
    Priv(String),
}

/// Authentication protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthProtocol {
    /// HMAC-MD5-96 (RFC 3414)
    Md5,
    /// HMAC-SHA-96 (RFC 3414)
    Sha1,
    /// HMAC-SHA-224 (usmHMAC128SHA224AuthProtocol)
    Sha224,
    /// HMAC-SHA-256 (usmHMAC192SHA256AuthProtocol)
    Sha256,
    /// HMAC-SHA-384 (usmHMAC256SHA384AuthProtocol)
    Sha384,
    /// HMAC-SHA-512 (usmHMAC384SHA512AuthProtocol)
    Sha512,
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

impl std::str::FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA224" | "SHA-224" => Ok(Self::Sha224),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(ParseProtocolError::Auth(s.to_string())),
        }
    }
}

impl AuthProtocol {
    /// Digest length, which is also the localized key length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated MAC length carried in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

/// Privacy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414). 56-bit keys; kept for old agents only.
    Des,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    /// AES-192-CFB (draft-blumenthal-aes-usm-04)
    Aes192,
    /// AES-256-CFB (draft-blumenthal-aes-usm-04)
    Aes256,
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Des => "DES",
            Self::Aes128 => "AES",
            Self::Aes192 => "AES-192",
            Self::Aes256 => "AES-256",
        })
    }
}

impl std::str::FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DES" => Ok(Self::Des),
            "AES" | "AES128" | "AES-128" => Ok(Self::Aes128),
            "AES192" | "AES-192" => Ok(Self::Aes192),
            "AES256" | "AES-256" => Ok(Self::Aes256),
            _ => Err(ParseProtocolError::Priv(s.to_string())),
        }
    }
}

impl PrivProtocol {
    /// Key material needed, in bytes. DES uses 8 key bytes plus an 8-byte pre-IV.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des => 16,
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Length of msgPrivacyParameters.
    pub fn salt_len(self) -> usize {
        8
    }

    pub(crate) fn key_extension_for(self, auth_protocol: AuthProtocol) -> KeyExtension {
        match self {
            Self::Aes192 | Self::Aes256 if auth_protocol.digest_len() < self.key_len() => {
                KeyExtension::Blumenthal
            }
            _ => KeyExtension::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_protocol_names() {
        for p in [
            AuthProtocol::Md5,
            AuthProtocol::Sha1,
            AuthProtocol::Sha224,
            AuthProtocol::Sha256,
            AuthProtocol::Sha384,
            AuthProtocol::Sha512,
        ] {
            assert_eq!(p.to_string().parse::<AuthProtocol>().unwrap(), p);
        }
        assert_eq!("sha512".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha512);
        assert!("sha3".parse::<AuthProtocol>().is_err());
    }

    #[test]
    fn priv_protocol_names() {
        assert_eq!("aes-256".parse::<PrivProtocol>().unwrap(), PrivProtocol::Aes256);
        assert_eq!("AES".parse::<PrivProtocol>().unwrap(), PrivProtocol::Aes128);
        let err = "3des".parse::<PrivProtocol>().unwrap_err();
        assert!(err.to_string().contains("privacy protocol"));
    }

    #[test]
    fn mac_and_digest_lengths() {
        assert_eq!(AuthProtocol::Sha512.mac_len(), 48);
        assert_eq!(AuthProtocol::Sha512.digest_len(), 64);
        assert_eq!(AuthProtocol::Md5.mac_len(), 12);
    }

    #[test]
    fn key_extension_selection() {
        assert_eq!(
            PrivProtocol::Aes256.key_extension_for(AuthProtocol::Sha1),
            KeyExtension::Blumenthal
        );
        assert_eq!(
            PrivProtocol::Aes256.key_extension_for(AuthProtocol::Sha512),
            KeyExtension::None
        );
        assert_eq!(
            PrivProtocol::Aes128.key_extension_for(AuthProtocol::Md5),
            KeyExtension::None
        );
    }
}
