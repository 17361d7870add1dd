//! Key derivation and HMAC authentication (RFC 3414 section 6, RFC 7860).

use digest::Digest;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// Passwords shorter than this are rejected by net-snmp; we only warn.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const EXPANSION_SIZE: usize = 1_048_576;

/// Full-length HMAC with a concrete digest type. HMAC accepts keys of any
/// length, so the constructor never fails in practice.
macro_rules! hmac_with {
    ($digest:ty, $key:expr, $data:expr) => {{
        match <Hmac<$digest> as KeyInit>::new_from_slice($key) {
            Ok(mut mac) => {
                Mac::update(&mut mac, $data);
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        }
    }};
}

/// Non-localized key `Ku` derived from a password.
///
/// Deriving `Ku` costs a 1 MiB hash; it is done once per user and then
/// localized cheaply for every engine the user talks to.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl MasterKey {
    pub fn from_password(protocol: AuthProtocol, password: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(
                target: "snmp_dispatch::usm",
                password_len = password.len(),
                min_len = MIN_PASSWORD_LENGTH,
                "USM password shorter than recommended minimum"
            );
        }
        let key = match protocol {
            AuthProtocol::Md5 => expand_password::<md5::Md5>(password),
            AuthProtocol::Sha1 => expand_password::<sha1::Sha1>(password),
            AuthProtocol::Sha224 => expand_password::<sha2::Sha224>(password),
            AuthProtocol::Sha256 => expand_password::<sha2::Sha256>(password),
            AuthProtocol::Sha384 => expand_password::<sha2::Sha384>(password),
            AuthProtocol::Sha512 => expand_password::<sha2::Sha512>(password),
        };
        Self { key, protocol }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// `Kul = H(Ku || engineID || Ku)`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        let key = hash_parts(self.protocol, &[self.key.as_slice(), engine_id, self.key.as_slice()]);
        LocalizedKey {
            key,
            protocol: self.protocol,
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Key bound to one authoritative engine, used for HMAC and as privacy
/// key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        MasterKey::from_password(protocol, password).localize(engine_id)
    }

    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Truncated HMAC of `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        let full = match self.protocol {
            AuthProtocol::Md5 => hmac_with!(md5::Md5, &self.key, data),
            AuthProtocol::Sha1 => hmac_with!(sha1::Sha1, &self.key, data),
            AuthProtocol::Sha224 => hmac_with!(sha2::Sha224, &self.key, data),
            AuthProtocol::Sha256 => hmac_with!(sha2::Sha256, &self.key, data),
            AuthProtocol::Sha384 => hmac_with!(sha2::Sha384, &self.key, data),
            AuthProtocol::Sha512 => hmac_with!(sha2::Sha512, &self.key, data),
        };
        let mut mac = full;
        mac.truncate(self.mac_len());
        mac
    }

    /// Constant-time comparison of the HMAC of `data` with `expected`.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        computed.len() == expected.len() && bool::from(computed.ct_eq(expected))
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// RFC 3414 A.2: hash 1 MiB of the password repeated.
fn expand_password<D: Digest>(password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }
    let mut hasher = D::new();
    let mut block = [0u8; 64];
    let mut idx = 0;
    for _ in 0..EXPANSION_SIZE / block.len() {
        for b in block.iter_mut() {
            *b = password[idx];
            idx = (idx + 1) % password.len();
        }
        hasher.update(block);
    }
    hasher.finalize().to_vec()
}

fn hash_parts(protocol: AuthProtocol, parts: &[&[u8]]) -> Vec<u8> {
    fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
        let mut h = D::new();
        for p in parts {
            h.update(*p);
        }
        h.finalize().to_vec()
    }
    match protocol {
        AuthProtocol::Md5 => run::<md5::Md5>(parts),
        AuthProtocol::Sha1 => run::<sha1::Sha1>(parts),
        AuthProtocol::Sha224 => run::<sha2::Sha224>(parts),
        AuthProtocol::Sha256 => run::<sha2::Sha256>(parts),
        AuthProtocol::Sha384 => run::<sha2::Sha384>(parts),
        AuthProtocol::Sha512 => run::<sha2::Sha512>(parts),
    }
}

/// Blumenthal key extension: append `H(key so far)` until `target_len`
/// bytes are available, then truncate.
pub(crate) fn extend_key(protocol: AuthProtocol, key: &[u8], target_len: usize) -> Vec<u8> {
    let mut out = key.to_vec();
    while out.len() < target_len {
        let next = hash_parts(protocol, &[out.as_slice()]);
        out.extend_from_slice(&next);
    }
    out.truncate(target_len);
    out
}

/// Write the MAC of `message` into its zero-filled auth parameter slot.
pub fn authenticate_message(key: &LocalizedKey, message: &mut [u8], auth_offset: usize, auth_len: usize) {
    let mac = key.compute_hmac(message);
    if mac.len() == auth_len
        && let Some(slot) = message.get_mut(auth_offset..auth_offset + auth_len)
    {
        slot.copy_from_slice(&mac);
    }
}

/// Verify the MAC found at `auth_offset` against the rest of `message`.
pub fn verify_message(key: &LocalizedKey, message: &[u8], auth_offset: usize, auth_len: usize) -> bool {
    let Some(received) = message.get(auth_offset..auth_offset + auth_len) else {
        return false;
    };
    let mut zeroed = message.to_vec();
    zeroed[auth_offset..auth_offset + auth_len].fill(0);
    key.verify_hmac(&zeroed, received)
}
