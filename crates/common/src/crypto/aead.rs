//! AES-GCM authenticated encryption with associated data.
//!
//! This module provides the **low-level primitive** the key ring builds on:
//!
//! - [`AeadCipher`]: AES-128-GCM or AES-256-GCM, selected by key length
//! - Random key and salt generation
//! - Password-based key derivation using Argon2
//!
//! Sealed output is laid out as `nonce (12) || ciphertext || tag (16)`.
//! Callers may ask for zeroed head/tail room around the sealed bytes so a
//! framing header can be written in place without another copy.
//!
//! ## Usage
//!
//! ```rust
//! use ringfence_common::crypto::aead::AeadCipher;
//!
//! let key = AeadCipher::generate_key(32);
//! let cipher = AeadCipher::new(&key)?;
//!
//! let sealed = cipher.seal(b"sensitive data", b"context", 0, 0)?;
//! let opened = cipher.open(&sealed, b"context")?;
//! assert_eq!(opened, b"sensitive data");
//! # Ok::<(), ringfence_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

/// AES-GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Minimum Argon2 salt length accepted by [`AeadCipher::derive_key_from_password`].
pub const MIN_SALT_SIZE: usize = 8;

enum CipherInner {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM cipher bound to a single key.
pub struct AeadCipher {
    inner: CipherInner,
    fingerprint: String,
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("key", &"[REDACTED]")
            .field("key_bits", &(self.key_len() * 8))
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl AeadCipher {
    /// Create a cipher from a raw 16-byte (AES-128) or 32-byte (AES-256) key.
    pub fn new(key: &[u8]) -> CommonResult<Self> {
        let inner = match key.len() {
            16 => CipherInner::Aes128(
                Aes128Gcm::new_from_slice(key)
                    .map_err(|_| CommonError::crypto("Failed to create AES-128-GCM cipher"))?,
            ),
            32 => CipherInner::Aes256(
                Aes256Gcm::new_from_slice(key)
                    .map_err(|_| CommonError::crypto("Failed to create AES-256-GCM cipher"))?,
            ),
            other => {
                return Err(CommonError::crypto(format!(
                    "AES-GCM key must be 16 or 32 bytes, got {other}"
                )))
            }
        };

        Ok(Self { inner, fingerprint: Self::key_fingerprint(key) })
    }

    /// Length of the bound key in bytes.
    pub const fn key_len(&self) -> usize {
        match self.inner {
            CipherInner::Aes128(_) => 16,
            CipherInner::Aes256(_) => 32,
        }
    }

    /// Short, non-reversible identifier of the bound key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encrypt `plaintext` bound to `aad`.
    ///
    /// The returned buffer holds `pre` zero bytes, the sealed payload, then
    /// `post` zero bytes.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8], pre: usize, post: usize) -> CommonResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);
        let payload = Payload { msg: plaintext, aad };

        let ciphertext = match &self.inner {
            CipherInner::Aes128(cipher) => cipher.encrypt(&nonce, payload),
            CipherInner::Aes256(cipher) => cipher.encrypt(&nonce, payload),
        }
        .map_err(|_| CommonError::crypto("Encryption failed"))?;

        let mut output = Vec::with_capacity(pre + NONCE_SIZE + ciphertext.len() + post);
        output.resize(pre, 0);
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        output.resize(output.len() + post, 0);
        Ok(output)
    }

    /// Decrypt a `nonce || ciphertext || tag` buffer bound to `aad`.
    ///
    /// Every failure (short input, tag mismatch) yields the same error.
    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> CommonResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CommonError::crypto("Decryption failed"));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let payload = Payload { msg: ciphertext, aad };

        match &self.inner {
            CipherInner::Aes128(cipher) => cipher.decrypt(nonce, payload),
            CipherInner::Aes256(cipher) => cipher.decrypt(nonce, payload),
        }
        .map_err(|_| CommonError::crypto("Decryption failed"))
    }

    /// Generate `len` random key bytes from the operating system RNG.
    pub fn generate_key(len: usize) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Generate a fresh random salt for password-based derivation.
    pub fn generate_salt() -> [u8; 16] {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Derive `len` key bytes from a password and salt using Argon2.
    pub fn derive_key_from_password(
        password: &[u8],
        salt: &[u8],
        len: usize,
    ) -> CommonResult<Zeroizing<Vec<u8>>> {
        if salt.len() < MIN_SALT_SIZE {
            return Err(CommonError::validation(
                "salt",
                format!("must be at least {MIN_SALT_SIZE} bytes"),
            ));
        }

        let mut key = Zeroizing::new(vec![0u8; len]);
        Argon2::default()
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| CommonError::crypto(format!("Key derivation failed: {e}")))?;
        Ok(key)
    }

    /// Generate a short fingerprint for a key.
    pub fn key_fingerprint(key: &[u8]) -> String {
        let digest = Sha256::digest(key);
        BASE64.encode(&digest[..8])
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for crypto::aead.
    use super::*;

    /// Validates both supported key sizes round-trip.
    #[test]
    fn seal_and_open_round_trip_for_both_key_sizes() {
        for len in [16, 32] {
            let key = AeadCipher::generate_key(len);
            let cipher = AeadCipher::new(&key).unwrap();
            assert_eq!(cipher.key_len(), len);

            let sealed = cipher.seal(b"hello world", b"aad", 0, 0).unwrap();
            assert_eq!(sealed.len(), NONCE_SIZE + 11 + TAG_SIZE);
            assert_eq!(cipher.open(&sealed, b"aad").unwrap(), b"hello world");
        }
    }

    /// Validates unsupported key lengths are rejected.
    #[test]
    fn new_rejects_invalid_key_size() {
        assert!(AeadCipher::new(&[0u8; 24]).is_err());
        assert!(AeadCipher::new(&[]).is_err());
    }

    /// Validates head and tail room are zero-filled around the sealed bytes.
    #[test]
    fn seal_reserves_head_and_tail_room() {
        let cipher = AeadCipher::new(&AeadCipher::generate_key(32)).unwrap();
        let sealed = cipher.seal(b"abc", b"", 20, 4).unwrap();

        assert_eq!(sealed.len(), 20 + NONCE_SIZE + 3 + TAG_SIZE + 4);
        assert!(sealed[..20].iter().all(|b| *b == 0));
        assert!(sealed[sealed.len() - 4..].iter().all(|b| *b == 0));
        assert_eq!(cipher.open(&sealed[20..sealed.len() - 4], b"").unwrap(), b"abc");
    }

    /// Validates a mismatched AAD fails authentication.
    #[test]
    fn open_rejects_wrong_aad() {
        let cipher = AeadCipher::new(&AeadCipher::generate_key(32)).unwrap();
        let sealed = cipher.seal(b"payload", b"purpose-a", 0, 0).unwrap();
        let err = cipher.open(&sealed, b"purpose-b").unwrap_err();
        assert_eq!(err, CommonError::crypto("Decryption failed"));
    }

    /// Validates short input reports the same failure as a tag mismatch.
    #[test]
    fn open_rejects_truncated_input_uniformly() {
        let cipher = AeadCipher::new(&AeadCipher::generate_key(16)).unwrap();
        let err = cipher.open(&[0u8; 10], b"").unwrap_err();
        assert_eq!(err, CommonError::crypto("Decryption failed"));
    }

    /// Validates Argon2 derivation is deterministic for a fixed salt.
    #[test]
    fn derive_key_is_deterministic() {
        let salt = AeadCipher::generate_salt();
        let a = AeadCipher::derive_key_from_password(b"passphrase", &salt, 32).unwrap();
        let b = AeadCipher::derive_key_from_password(b"passphrase", &salt, 32).unwrap();
        let c = AeadCipher::derive_key_from_password(b"other", &salt, 32).unwrap();

        assert_eq!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
        assert!(AeadCipher::derive_key_from_password(b"p", b"short", 32).is_err());
    }

    /// Validates fingerprints differ per key and never echo key bytes.
    #[test]
    fn fingerprint_identifies_key() {
        let k1 = AeadCipher::generate_key(32);
        let k2 = AeadCipher::generate_key(32);
        let cipher = AeadCipher::new(&k1).unwrap();

        assert_eq!(cipher.fingerprint(), AeadCipher::key_fingerprint(&k1));
        assert_ne!(AeadCipher::key_fingerprint(&k1), AeadCipher::key_fingerprint(&k2));
        assert!(!format!("{cipher:?}").contains(&BASE64.encode(k1.as_slice())));
    }
}
