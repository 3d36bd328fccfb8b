//! Purpose-bound payload protection
//!
//! A protector binds payloads to its purpose chain: a payload protected
//! under one chain fails authentication under any other. The payload names
//! the key that protected it, so rotation never strands old payloads.

use std::sync::Arc;

use arc_swap::ArcSwap;
use ringfence_domain::constants::PAYLOAD_HEADER_SIZE;
use ringfence_domain::{DataProtectionError, KeyId, Result};
use tracing::{debug, warn};

use super::aad::AadTemplate;
use super::payload::{read_header, write_header};
use crate::key_management::ports::KeyRingProvider;

/// Result of [`Protector::dangerous_unprotect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprotectOutcome {
    pub plaintext: Vec<u8>,

    /// The payload should be re-protected: its key is no longer the default
    /// or has been revoked.
    pub requires_migration: bool,

    pub was_revoked: bool,
}

/// Protects and unprotects payloads for one purpose chain.
pub struct Protector {
    provider: Arc<dyn KeyRingProvider>,
    purposes: Arc<[String]>,
    aad: ArcSwap<AadTemplate>,
}

impl Protector {
    pub(crate) fn new(provider: Arc<dyn KeyRingProvider>, purposes: Vec<String>) -> Self {
        let aad = ArcSwap::from_pointee(AadTemplate::new(&purposes));
        Self { provider, purposes: purposes.into(), aad }
    }

    /// Purpose chain, outermost first.
    pub fn purposes(&self) -> &[String] {
        &self.purposes
    }

    /// Child protector with `purpose` appended to this chain.
    pub fn create_protector(&self, purpose: impl Into<String>) -> Self {
        let mut purposes = self.purposes.to_vec();
        purposes.push(purpose.into());
        Self::new(Arc::clone(&self.provider), purposes)
    }

    /// Protect `plaintext` with the current default key.
    ///
    /// Key ring errors surface as-is; any failure of the primitive itself
    /// is reported as [`DataProtectionError::EncryptionFailed`].
    pub fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key_ring = self.provider.current_key_ring()?;
        let key_id = key_ring.default_key_id();
        let encryptor = key_ring.default_encryptor().ok_or_else(|| {
            warn!(key_id = %key_id, "Default key has no encryptor");
            DataProtectionError::EncryptionFailed
        })?;

        let aad = self.aad_for(key_id, true);
        let mut protected = encryptor
            .encrypt(plaintext, aad.as_bytes(), PAYLOAD_HEADER_SIZE, 0)
            .map_err(|err| {
                debug!(key_id = %key_id, error = %err, "Encryption failed");
                DataProtectionError::EncryptionFailed
            })?;
        if protected.len() < PAYLOAD_HEADER_SIZE {
            return Err(DataProtectionError::EncryptionFailed);
        }

        write_header(&mut protected, key_id);
        Ok(protected)
    }

    /// Recover the plaintext of a payload protected under this chain.
    ///
    /// Payloads protected with a revoked key are refused.
    pub fn unprotect(&self, protected: &[u8]) -> Result<Vec<u8>> {
        self.dangerous_unprotect(protected, false).map(|outcome| outcome.plaintext)
    }

    /// Like [`unprotect`](Self::unprotect), optionally accepting revoked
    /// keys, and reporting whether the payload should be re-protected.
    pub fn dangerous_unprotect(
        &self,
        protected: &[u8],
        ignore_revocation: bool,
    ) -> Result<UnprotectOutcome> {
        let key_id = read_header(protected)?;

        let mut key_ring = self.provider.current_key_ring()?;
        let mut lookup = key_ring.get_encryptor_by_key_id(key_id);
        if lookup.is_none() && self.provider.in_auto_refresh_window() {
            debug!(key_id = %key_id, "Key not in key ring; forcing a refresh");
            key_ring = self.provider.refresh_current_key_ring()?;
            lookup = key_ring.get_encryptor_by_key_id(key_id);
        }

        let Some(lookup) = lookup else {
            debug!(key_id = %key_id, "Key not found in key ring");
            return Err(DataProtectionError::KeyNotFound { key_id });
        };

        if lookup.is_revoked {
            if !ignore_revocation {
                warn!(key_id = %key_id, "Payload was protected with a revoked key");
                return Err(DataProtectionError::KeyRevoked { key_id });
            }
            debug!(key_id = %key_id, "Unprotecting with revoked key as explicitly requested");
        }

        let aad = self.aad_for(key_id, false);
        let plaintext = lookup
            .encryptor
            .decrypt(&protected[PAYLOAD_HEADER_SIZE..], aad.as_bytes())
            .map_err(|err| {
                debug!(key_id = %key_id, error = %err, "Decryption failed");
                DataProtectionError::DecryptionFailed
            })?;

        Ok(UnprotectOutcome {
            plaintext,
            requires_migration: lookup.is_revoked || key_id != key_ring.default_key_id(),
            was_revoked: lookup.is_revoked,
        })
    }

    /// AAD naming `key_id`. With `publish`, the patched template replaces
    /// the cached one.
    fn aad_for(&self, key_id: KeyId, publish: bool) -> Arc<AadTemplate> {
        let current = self.aad.load_full();
        if current.key_id() == key_id {
            return current;
        }

        let patched = Arc::new(current.with_key_id(key_id));
        if publish {
            self.aad.store(Arc::clone(&patched));
        }
        patched
    }
}

impl std::fmt::Debug for Protector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protector").field("purposes", &self.purposes).finish_non_exhaustive()
    }
}
