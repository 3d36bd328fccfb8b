//! Passphrase-based at-rest protection of key descriptors
//!
//! Each wrapped descriptor is `salt (16) || nonce (12) || ciphertext || tag`.
//! The wrapping key is derived from the passphrase with Argon2 under the
//! record's own salt, so no two records share a wrapping key.

use std::fmt;

use ringfence_common::AeadCipher;
use ringfence_core::DescriptorProtector;
use ringfence_domain::{DataProtectionError, Result};
use zeroize::Zeroizing;

/// Id recorded next to descriptors wrapped by this protector.
pub const PASSPHRASE_PROTECTOR_ID: &str = "ringfence.passphrase.v1";

const SALT_SIZE: usize = 16;
const WRAPPING_KEY_SIZE: usize = 32;
const WRAPPING_CONTEXT: &[u8] = b"ringfence.key-descriptor";

/// Wraps descriptors under a key derived from a passphrase.
pub struct PassphraseDescriptorProtector {
    passphrase: Zeroizing<Vec<u8>>,
}

impl PassphraseDescriptorProtector {
    pub fn new(passphrase: impl Into<Vec<u8>>) -> Result<Self> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(DataProtectionError::configuration("at-rest passphrase cannot be empty"));
        }
        Ok(Self { passphrase })
    }

    /// Read the passphrase from the environment variable `name`.
    pub fn from_env(name: &str) -> Result<Self> {
        let value = std::env::var(name).map_err(|_| {
            DataProtectionError::configuration(format!(
                "at-rest passphrase variable {name} is not set"
            ))
        })?;
        Self::new(value)
    }

    fn wrapping_cipher(&self, salt: &[u8]) -> Result<AeadCipher> {
        let key = AeadCipher::derive_key_from_password(&self.passphrase, salt, WRAPPING_KEY_SIZE)?;
        Ok(AeadCipher::new(&key)?)
    }
}

impl fmt::Debug for PassphraseDescriptorProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseDescriptorProtector")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl DescriptorProtector for PassphraseDescriptorProtector {
    fn id(&self) -> &str {
        PASSPHRASE_PROTECTOR_ID
    }

    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let salt = AeadCipher::generate_salt();
        let cipher = self.wrapping_cipher(&salt)?;
        let mut wrapped = cipher.seal(plaintext, WRAPPING_CONTEXT, SALT_SIZE, 0)?;
        wrapped[..SALT_SIZE].copy_from_slice(&salt);
        Ok(wrapped)
    }

    fn unprotect(&self, protected: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if protected.len() <= SALT_SIZE {
            return Err(DataProtectionError::cryptography("wrapped descriptor is truncated"));
        }
        let (salt, sealed) = protected.split_at(SALT_SIZE);
        let cipher = self.wrapping_cipher(salt)?;
        cipher
            .open(sealed, WRAPPING_CONTEXT)
            .map(Zeroizing::new)
            .map_err(|_| DataProtectionError::cryptography("wrapped descriptor could not be opened"))
    }
}
