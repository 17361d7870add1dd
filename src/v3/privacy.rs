//! USM privacy: DES-CBC (RFC 3414 8) and AES-CFB (RFC 3826).
//!
//! | protocol | msgPrivacyParameters     | IV                          |
//! |----------|--------------------------|-----------------------------|
//! | DES      | boots(4) \|\| counter(4) | preIV xor salt              |
//! | AES      | 64-bit counter           | boots(4) \|\| time(4) \|\| salt(8) |

use std::sync::atomic::{AtomicU64, Ordering};

use aes::{Aes128, Aes192, Aes256};
use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{MasterKey, extend_key};
use super::{KeyExtension, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result};

/// Per-engine salt source.
///
/// Starts at a random value so salts do not repeat across restarts with
/// the same boots value. Zero is skipped on wraparound.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn next(&self) -> u64 {
        loop {
            let v = self.0.fetch_add(1, Ordering::Relaxed);
            if v != 0 {
                return v;
            }
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        if getrandom::fill(&mut buf).is_err() {
            // No OS entropy: fall back to the clock. Salts only need to be
            // unique, not secret.
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1);
            return nanos.max(1);
        }
        let v = u64::from_ne_bytes(buf);
        if v != 0 {
            return v;
        }
    }
}

/// Localized privacy key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Localize a privacy key from the privacy password's master key.
    ///
    /// The master key is derived with the user's *authentication* protocol
    /// (RFC 3826 1.2); AES-192/256 keys are extended when that digest is too
    /// short.
    pub fn from_master_key(master: &MasterKey, protocol: PrivProtocol, engine_id: &[u8]) -> Self {
        let localized = master.localize(engine_id);
        let key = match protocol.key_extension_for(master.protocol()) {
            KeyExtension::None => localized.as_bytes().to_vec(),
            KeyExtension::Blumenthal => {
                extend_key(master.protocol(), localized.as_bytes(), protocol.key_len())
            }
        };
        Self { key, protocol }
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn material(&self, len: usize) -> Result<&[u8]> {
        self.key
            .get(..len)
            .ok_or(Error::EncryptionFailed {
                target: None,
                kind: CryptoErrorKind::InvalidKeyLength,
            })
    }

    /// Encrypt a serialized ScopedPDU.
    ///
    /// Returns the ciphertext and the msgPrivacyParameters to send with it.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        let counter = salt.next();
        match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, counter as u32),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let salt = counter.to_be_bytes();
                let iv = aes_iv(engine_boots, engine_time, &salt);
                let mut buf = plaintext.to_vec();
                self.aes_apply(&iv, &mut buf, true)?;
                Ok((Bytes::from(buf), Bytes::copy_from_slice(&salt)))
            }
        }
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        let salt: [u8; 8] = priv_params.try_into().map_err(|_| {
            Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            )
        })?;
        match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, &salt),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let iv = aes_iv(engine_boots, engine_time, &salt);
                let mut buf = ciphertext.to_vec();
                self.aes_apply(&iv, &mut buf, false)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                Ok(Bytes::from(buf))
            }
        }
    }

    fn des_iv(&self, salt: &[u8; 8]) -> Result<[u8; 8]> {
        let pre_iv = self.key.get(8..16).ok_or(Error::EncryptionFailed {
            target: None,
            kind: CryptoErrorKind::InvalidKeyLength,
        })?;
        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ salt[i];
        }
        Ok(iv)
    }

    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, counter: u32) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

        let mut salt = [0u8; 8];
        salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt[4..].copy_from_slice(&counter.to_be_bytes());
        let iv = self.des_iv(&salt)?;

        // Zero-pad to the block size; the receiver ignores trailing bytes
        // after the ScopedPDU.
        let padded = plaintext.len().div_ceil(8) * 8;
        let mut buf = plaintext.to_vec();
        buf.resize(padded, 0);

        let cipher = cbc::Encryptor::<des::Des>::new_from_slices(self.material(8)?, &iv)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let out = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, padded)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?
            .to_vec();
        Ok((Bytes::from(out), Bytes::copy_from_slice(&salt)))
    }

    fn decrypt_des(&self, ciphertext: &[u8], salt: &[u8; 8]) -> Result<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

        if !ciphertext.len().is_multiple_of(8) {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                },
            ));
        }
        let iv = self
            .des_iv(salt)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let key = self
            .material(8)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let cipher = cbc::Decryptor::<des::Des>::new_from_slices(key, &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let mut buf = ciphertext.to_vec();
        let plain = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?
            .to_vec();
        Ok(Bytes::from(plain))
    }

    fn aes_apply(&self, iv: &[u8; 16], buf: &mut [u8], encrypt: bool) -> Result<()> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        macro_rules! run {
            ($aes:ty) => {{
                let key = self.material(self.protocol.key_len())?;
                if encrypt {
                    cfb_mode::Encryptor::<$aes>::new_from_slices(key, iv)
                        .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?
                        .encrypt(buf);
                } else {
                    cfb_mode::Decryptor::<$aes>::new_from_slices(key, iv)
                        .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?
                        .decrypt(buf);
                }
            }};
        }

        match self.protocol {
            PrivProtocol::Aes128 => run!(Aes128),
            PrivProtocol::Aes192 => run!(Aes192),
            PrivProtocol::Aes256 => run!(Aes256),
            PrivProtocol::Des => {
                return Err(Error::encrypt(None, CryptoErrorKind::CipherError));
            }
        }
        Ok(())
    }
}

fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
