//! Immutable snapshot of the usable keys

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ringfence_domain::KeyId;

use super::key::Key;
use super::ports::AuthenticatedEncryptor;

/// Encryptor found for a key id, with the key's revocation state at the
/// time the ring was built.
#[derive(Clone)]
pub struct KeyLookup {
    pub encryptor: Arc<dyn AuthenticatedEncryptor>,
    pub is_revoked: bool,
}

struct KeyHolder {
    key: Arc<Key>,
    is_revoked: bool,
}

/// Default key plus every other key a payload might name.
///
/// Revocation flags are captured at construction, so a ring is a stable
/// snapshot even though keys themselves are shared.
pub struct KeyRing {
    default_key_id: KeyId,
    keys: HashMap<KeyId, KeyHolder>,
}

impl KeyRing {
    /// Build a ring around `default_key`. The default is added to the set
    /// when `all_keys` does not already contain it.
    pub fn new(default_key: &Arc<Key>, all_keys: &[Arc<Key>]) -> Self {
        let mut keys: HashMap<KeyId, KeyHolder> = HashMap::with_capacity(all_keys.len() + 1);
        for key in all_keys.iter().chain(std::iter::once(default_key)) {
            keys.entry(key.key_id()).or_insert_with(|| KeyHolder {
                key: Arc::clone(key),
                is_revoked: key.is_revoked(),
            });
        }
        Self { default_key_id: default_key.key_id(), keys }
    }

    pub const fn default_key_id(&self) -> KeyId {
        self.default_key_id
    }

    /// Encryptor of the default key.
    pub fn default_encryptor(&self) -> Option<Arc<dyn AuthenticatedEncryptor>> {
        self.keys.get(&self.default_key_id).and_then(|holder| holder.key.create_encryptor())
    }

    /// `None` when the key is absent from the ring or cannot encrypt.
    pub fn get_encryptor_by_key_id(&self, key_id: KeyId) -> Option<KeyLookup> {
        let holder = self.keys.get(&key_id)?;
        let encryptor = holder.key.create_encryptor()?;
        Some(KeyLookup { encryptor, is_revoked: holder.is_revoked })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key_id: KeyId) -> bool {
        self.keys.contains_key(&key_id)
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("default_key_id", &self.default_key_id)
            .field("keys", &self.keys.len())
            .finish()
    }
}
