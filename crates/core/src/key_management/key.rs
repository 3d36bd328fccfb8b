//! Keys as seen by the key ring
//!
//! A key's dates are fixed at creation. Its revocation flag is the only
//! mutable metadata, and its descriptor is materialized on first use so that
//! reading the key log never unwraps secrets nobody asks for.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ringfence_domain::{DataProtectionError, KeyDescriptor, KeyId, Result, StoredDescriptor};
use tracing::warn;

use super::ports::{AuthenticatedEncryptor, EncryptorFactory};

/// Ordered list of factories consulted when building a key's encryptor.
pub type EncryptorFactories = Arc<[Arc<dyn EncryptorFactory>]>;

/// Turns a stored descriptor back into key material.
pub trait DescriptorMaterializer: Send + Sync {
    fn materialize(&self, key_id: KeyId, stored: &StoredDescriptor) -> Result<KeyDescriptor>;
}

struct PendingDescriptor {
    stored: StoredDescriptor,
    materializer: Arc<dyn DescriptorMaterializer>,
}

/// A key with its lifetime, revocation state and lazily built encryptor.
pub struct Key {
    key_id: KeyId,
    creation_date: DateTime<Utc>,
    activation_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    revoked: AtomicBool,
    pending: Option<PendingDescriptor>,
    descriptor: OnceLock<KeyDescriptor>,
    descriptor_lock: Mutex<()>,
    encryptor: OnceLock<Option<Arc<dyn AuthenticatedEncryptor>>>,
    factories: EncryptorFactories,
}

impl Key {
    /// Key whose descriptor is already in hand.
    pub fn new(
        key_id: KeyId,
        creation_date: DateTime<Utc>,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
        descriptor: KeyDescriptor,
        factories: EncryptorFactories,
    ) -> Self {
        let key = Self::with_pending(
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            None,
            factories,
        );
        let _ = key.descriptor.set(descriptor);
        key
    }

    /// Key whose descriptor is materialized from storage on first use.
    pub fn deferred(
        key_id: KeyId,
        creation_date: DateTime<Utc>,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
        stored: StoredDescriptor,
        materializer: Arc<dyn DescriptorMaterializer>,
        factories: EncryptorFactories,
    ) -> Self {
        Self::with_pending(
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            Some(PendingDescriptor { stored, materializer }),
            factories,
        )
    }

    fn with_pending(
        key_id: KeyId,
        creation_date: DateTime<Utc>,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
        pending: Option<PendingDescriptor>,
        factories: EncryptorFactories,
    ) -> Self {
        Self {
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            revoked: AtomicBool::new(false),
            pending,
            descriptor: OnceLock::new(),
            descriptor_lock: Mutex::new(()),
            encryptor: OnceLock::new(),
            factories,
        }
    }

    pub const fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub const fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub const fn activation_date(&self) -> DateTime<Utc> {
        self.activation_date
    }

    pub const fn expiration_date(&self) -> DateTime<Utc> {
        self.expiration_date
    }

    /// Expired keys still decrypt; they are only unfit as a default.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Revocation is one-way.
    pub fn set_revoked(&self) {
        self.revoked.store(true, Ordering::Release);
    }

    /// The key's descriptor, materializing it on first call.
    ///
    /// Concurrent first calls materialize once. A failed materialization is
    /// not remembered, so a later call retries.
    pub fn descriptor(&self) -> Result<&KeyDescriptor> {
        if let Some(descriptor) = self.descriptor.get() {
            return Ok(descriptor);
        }

        let _guard = self.descriptor_lock.lock();
        if let Some(descriptor) = self.descriptor.get() {
            return Ok(descriptor);
        }

        let pending = self.pending.as_ref().ok_or_else(|| DataProtectionError::Internal {
            message: format!("key {} has no descriptor source", self.key_id),
        })?;
        let descriptor = pending.materializer.materialize(self.key_id, &pending.stored)?;
        Ok(self.descriptor.get_or_init(|| descriptor))
    }

    /// Encryptor for this key, built once from the first factory that
    /// accepts its descriptor. `None` when the descriptor cannot be read or
    /// no factory understands it; the outcome is remembered either way.
    pub fn create_encryptor(&self) -> Option<Arc<dyn AuthenticatedEncryptor>> {
        self.encryptor.get_or_init(|| self.build_encryptor()).clone()
    }

    fn build_encryptor(&self) -> Option<Arc<dyn AuthenticatedEncryptor>> {
        let descriptor = match self.descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(key_id = %self.key_id, error = %err, "Failed to materialize key descriptor");
                return None;
            }
        };

        let encryptor =
            self.factories.iter().find_map(|factory| factory.create_encryptor(descriptor));
        if encryptor.is_none() {
            warn!(
                key_id = %self.key_id,
                algorithm = %descriptor.algorithm(),
                "No encryptor factory accepted the key descriptor"
            );
        }
        encryptor
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("key_id", &self.key_id)
            .field("creation_date", &self.creation_date)
            .field("activation_date", &self.activation_date)
            .field("expiration_date", &self.expiration_date)
            .field("revoked", &self.is_revoked())
            .finish_non_exhaustive()
    }
}
