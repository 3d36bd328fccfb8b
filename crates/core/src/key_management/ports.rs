//! Port interfaces for key management
//!
//! These traits define the boundaries between the key ring logic and the
//! storage, cryptography and policy implementations plugged into it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ringfence_domain::{DataProtectionError, KeyDescriptor, KeyId, Result};
use serde_json::Value;
use zeroize::Zeroizing;

use super::key::Key;
use super::key_ring::KeyRing;
use super::resolver::DefaultKeyResolution;
use super::signal::CancellationSignal;

/// Durable, append-only store of key event documents.
///
/// Documents are opaque to the repository; the catalog owns their schema.
pub trait KeyRepository: Send + Sync {
    /// Every stored document, in no particular order.
    fn get_all_elements(&self) -> Result<Vec<Value>>;

    /// Append a document. `friendly_name` is a storage hint (file name,
    /// row label) and carries no meaning for readers.
    fn store_element(&self, element: Value, friendly_name: &str) -> Result<()>;

    /// Whether [`delete_elements`](Self::delete_elements) is implemented.
    fn supports_deletion(&self) -> bool {
        false
    }

    /// Remove every document the selector picks. Returns how many were
    /// removed.
    fn delete_elements(&self, _selector: &mut dyn FnMut(&Value) -> bool) -> Result<usize> {
        Err(DataProtectionError::not_supported("delete_elements"))
    }
}

/// Wraps serialized key descriptors before they reach the repository.
pub trait DescriptorProtector: Send + Sync {
    /// Name recorded next to wrapped descriptors so the matching
    /// unprotector can be found when reading them back.
    fn id(&self) -> &str;

    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn unprotect(&self, protected: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Receives a copy of every newly created key descriptor before it is
/// wrapped for storage.
pub trait KeyEscrowSink: Send + Sync {
    fn store(&self, key_id: KeyId, descriptor: &KeyDescriptor) -> Result<()>;
}

/// Authenticated encryption bound to a single key.
pub trait AuthenticatedEncryptor: Send + Sync {
    /// Encrypt `plaintext` under `aad`, reserving `pre` zeroed bytes before
    /// and `post` zeroed bytes after the ciphertext.
    fn encrypt(&self, plaintext: &[u8], aad: &[u8], pre: usize, post: usize) -> Result<Vec<u8>>;

    /// Authenticate and decrypt `ciphertext` under `aad`.
    fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

/// Builds encryptors for the descriptors it understands.
pub trait EncryptorFactory: Send + Sync {
    /// `None` when the descriptor is not one this factory handles.
    fn create_encryptor(&self, descriptor: &KeyDescriptor)
        -> Option<Arc<dyn AuthenticatedEncryptor>>;
}

/// Produces descriptors (fresh secrets) for newly created keys.
pub trait AlgorithmConfiguration: Send + Sync {
    fn create_new_descriptor(&self) -> Result<KeyDescriptor>;
}

/// Source of keys for the key ring cache.
pub trait KeyManager: Send + Sync {
    /// Create and persist a key, returning it.
    fn create_new_key(
        &self,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
    ) -> Result<Arc<Key>>;

    /// Every key currently known, with revocations applied.
    fn get_all_keys(&self) -> Result<Vec<Arc<Key>>>;

    /// Signal fired the next time the key set changes.
    fn cache_expiration_token(&self) -> Arc<CancellationSignal>;

    fn revoke_key(&self, key_id: KeyId, reason: Option<&str>) -> Result<()>;

    /// Revoke every key created strictly before `revocation_date`.
    fn revoke_all_keys(&self, revocation_date: DateTime<Utc>, reason: Option<&str>) -> Result<()>;
}

/// Chooses the default key for a moment in time.
pub trait DefaultKeyPolicy: Send + Sync {
    fn resolve_default_key_policy(&self, now: DateTime<Utc>, keys: &[Arc<Key>])
        -> DefaultKeyResolution;
}

/// Hands out the key ring protectors operate against.
pub trait KeyRingProvider: Send + Sync {
    fn current_key_ring(&self) -> Result<Arc<KeyRing>>;

    /// Bypass any cached key ring and resolve a fresh one.
    fn refresh_current_key_ring(&self) -> Result<Arc<KeyRing>>;

    /// Whether an unknown key id should trigger a forced refresh.
    fn in_auto_refresh_window(&self) -> bool {
        false
    }
}
