//! Key catalog: the key set as an append-only event log
//!
//! Creating or revoking a key appends one document to the repository.
//! Reading the key set replays every document: keys come from creation
//! events, then individual and mass revocations are applied on top.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use ringfence_common::{Clock, SystemClock};
use ringfence_domain::constants::{
    AEAD_DESCRIPTOR_DESERIALIZER, KEY_RECORD_VERSION, REVOCATION_RECORD_VERSION,
};
use ringfence_domain::{
    DataProtectionError, KeyCreatedRecord, KeyDescriptor, KeyEvent, KeyId, Result,
    RevocationRecord, RevocationTarget, StoredDescriptor,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::key::{DescriptorMaterializer, EncryptorFactories, Key};
use super::ports::{
    AlgorithmConfiguration, DescriptorProtector, KeyEscrowSink, KeyManager, KeyRepository,
};
use super::signal::CancellationSignal;

/// Unwraps stored descriptors and remembers the result per key id.
#[derive(Clone, Default)]
struct DescriptorDecoder {
    unprotectors: HashMap<String, Arc<dyn DescriptorProtector>>,
    known: Arc<DashMap<KeyId, KeyDescriptor>>,
}

impl DescriptorDecoder {
    fn remember(&self, key_id: KeyId, descriptor: KeyDescriptor) {
        self.known.insert(key_id, descriptor);
    }
}

impl DescriptorMaterializer for DescriptorDecoder {
    fn materialize(&self, key_id: KeyId, stored: &StoredDescriptor) -> Result<KeyDescriptor> {
        if let Some(known) = self.known.get(&key_id) {
            return Ok(known.value().clone());
        }

        if stored.deserializer != AEAD_DESCRIPTOR_DESERIALIZER {
            return Err(DataProtectionError::serialization(format!(
                "unknown descriptor deserializer '{}'",
                stored.deserializer
            )));
        }

        let plaintext = match &stored.protector {
            None => Zeroizing::new(stored.payload.clone()),
            Some(protector_id) => {
                let unprotector = self.unprotectors.get(protector_id).ok_or_else(|| {
                    DataProtectionError::cryptography(format!(
                        "no unprotector registered for '{protector_id}'"
                    ))
                })?;
                unprotector.unprotect(&stored.payload)?
            }
        };

        let descriptor = KeyDescriptor::from_bytes(&plaintext)?;
        self.remember(key_id, descriptor.clone());
        Ok(descriptor)
    }
}

/// Keys rebuilt from one read of the repository.
struct Replay {
    keys: Vec<Key>,
    latest_mass_revocation: Option<DateTime<Utc>>,
}

/// Repository-backed [`KeyManager`].
pub struct KeyCatalog {
    repository: Arc<dyn KeyRepository>,
    algorithm: Arc<dyn AlgorithmConfiguration>,
    factories: EncryptorFactories,
    at_rest_protector: Option<Arc<dyn DescriptorProtector>>,
    escrow: Option<Arc<dyn KeyEscrowSink>>,
    decoder: Arc<DescriptorDecoder>,
    clock: Arc<dyn Clock>,
    expiration_signal: Mutex<Arc<CancellationSignal>>,
}

impl KeyCatalog {
    /// Create a catalog over `repository`, generating descriptors with
    /// `algorithm` and building encryptors with `factories`.
    pub fn new(
        repository: Arc<dyn KeyRepository>,
        algorithm: Arc<dyn AlgorithmConfiguration>,
        factories: EncryptorFactories,
    ) -> Self {
        Self {
            repository,
            algorithm,
            factories,
            at_rest_protector: None,
            escrow: None,
            decoder: Arc::new(DescriptorDecoder::default()),
            clock: Arc::new(SystemClock),
            expiration_signal: Mutex::new(Arc::new(CancellationSignal::new())),
        }
    }

    /// Wrap new descriptors with `protector`; it is also registered as an
    /// unprotector.
    pub fn with_at_rest_protector(mut self, protector: Arc<dyn DescriptorProtector>) -> Self {
        self = self.with_unprotector(Arc::clone(&protector));
        self.at_rest_protector = Some(protector);
        self
    }

    /// Register a protector able to unwrap descriptors stored under its id.
    pub fn with_unprotector(mut self, unprotector: Arc<dyn DescriptorProtector>) -> Self {
        Arc::make_mut(&mut self.decoder)
            .unprotectors
            .insert(unprotector.id().to_string(), unprotector);
        self
    }

    pub fn with_escrow(mut self, escrow: Arc<dyn KeyEscrowSink>) -> Self {
        self.escrow = Some(escrow);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delete every key `predicate` selects, together with revocations that
    /// no longer apply to a remaining key.
    ///
    /// Individual revocations of deleted (or never created) keys go, as do
    /// all mass revocations except the most recent one. Returns whether any
    /// document was removed.
    pub fn delete_keys(&self, predicate: &dyn Fn(&Key) -> bool) -> Result<bool> {
        if !self.repository.supports_deletion() {
            return Err(DataProtectionError::not_supported("delete_keys"));
        }

        let elements = self.repository.get_all_elements()?;
        let replay = self.replay(&elements)?;

        let mut doomed = HashSet::new();
        let mut retained = HashSet::new();
        for key in &replay.keys {
            if predicate(key) {
                doomed.insert(key.key_id());
            } else {
                retained.insert(key.key_id());
            }
        }
        let latest_mass_revocation = replay.latest_mass_revocation;

        let mut selector = |element: &Value| match parse_event(element) {
            Some(KeyEvent::KeyCreated(record)) => doomed.contains(&record.id),
            Some(KeyEvent::Revocation(record)) => match record.target {
                RevocationTarget::Key { key_id } => !retained.contains(&key_id),
                RevocationTarget::AllBefore => {
                    latest_mass_revocation.is_some_and(|latest| record.revocation_date < latest)
                }
            },
            None => false,
        };
        let deleted = self.repository.delete_elements(&mut selector)?;

        if deleted > 0 {
            for key_id in &doomed {
                self.decoder.known.remove(key_id);
            }
            info!(deleted, keys = doomed.len(), "Deleted key repository elements");
            self.invalidate();
        }
        Ok(deleted > 0)
    }

    fn store_event(&self, event: &KeyEvent, friendly_name: &str) -> Result<()> {
        let document = event.to_document()?;
        self.repository.store_element(document, friendly_name)
    }

    /// Fire the current signal and hand out a fresh one for the next
    /// generation of the key set.
    fn invalidate(&self) {
        let previous = {
            let mut current = self.expiration_signal.lock();
            std::mem::replace(&mut *current, Arc::new(CancellationSignal::new()))
        };
        previous.fire();
    }

    fn replay(&self, elements: &[Value]) -> Result<Replay> {
        let mut keys: Vec<Key> = Vec::new();
        let mut positions: HashMap<KeyId, usize> = HashMap::new();
        let mut revoked_ids: HashSet<KeyId> = HashSet::new();
        let mut latest_mass_revocation: Option<DateTime<Utc>> = None;

        for element in elements {
            match KeyEvent::document_tag(element) {
                Some(KeyEvent::KEY_CREATED_TAG) => {
                    let Some(key) = self.read_key(element) else { continue };
                    if positions.contains_key(&key.key_id()) {
                        return Err(DataProtectionError::corruption(format!(
                            "key {} is defined more than once",
                            key.key_id()
                        )));
                    }
                    positions.insert(key.key_id(), keys.len());
                    keys.push(key);
                }
                Some(KeyEvent::REVOCATION_TAG) => {
                    let record = read_revocation(element)?;
                    match record.target {
                        RevocationTarget::Key { key_id } => {
                            revoked_ids.insert(key_id);
                        }
                        RevocationTarget::AllBefore => {
                            let date = record.revocation_date;
                            latest_mass_revocation = Some(
                                latest_mass_revocation.map_or(date, |latest| latest.max(date)),
                            );
                        }
                    }
                }
                other => {
                    warn!(tag = ?other, "Skipping unrecognized key repository element");
                }
            }
        }

        if let Some(cutoff) = latest_mass_revocation {
            for key in keys.iter().filter(|key| key.creation_date() < cutoff) {
                debug!(key_id = %key.key_id(), %cutoff, "Key revoked by mass revocation");
                key.set_revoked();
            }
        }

        for key_id in &revoked_ids {
            match positions.get(key_id) {
                Some(&position) => keys[position].set_revoked(),
                None => warn!(key_id = %key_id, "Revocation references an unknown key"),
            }
        }

        Ok(Replay { keys, latest_mass_revocation })
    }

    /// `None` for unreadable or unsupported key records, after logging.
    fn read_key(&self, element: &Value) -> Option<Key> {
        let record = match serde_json::from_value::<KeyEvent>(element.clone()) {
            Ok(KeyEvent::KeyCreated(record)) => record,
            Ok(KeyEvent::Revocation(_)) => return None,
            Err(err) => {
                warn!(error = %err, "Skipping malformed key record");
                return None;
            }
        };

        if record.version != KEY_RECORD_VERSION {
            warn!(
                key_id = %record.id,
                version = record.version,
                "Skipping key record with unsupported version"
            );
            return None;
        }

        let materializer: Arc<dyn DescriptorMaterializer> = self.decoder.clone();
        Some(Key::deferred(
            record.id,
            record.creation_date,
            record.activation_date,
            record.expiration_date,
            record.descriptor,
            materializer,
            Arc::clone(&self.factories),
        ))
    }

    fn stored_descriptor(&self, descriptor: &KeyDescriptor) -> Result<StoredDescriptor> {
        let serialized = descriptor.to_bytes()?;
        let stored = match &self.at_rest_protector {
            Some(protector) => StoredDescriptor {
                deserializer: AEAD_DESCRIPTOR_DESERIALIZER.to_string(),
                protector: Some(protector.id().to_string()),
                payload: protector.protect(&serialized)?,
            },
            None => {
                warn!("No at-rest protector configured; key descriptor stored unencrypted");
                StoredDescriptor {
                    deserializer: AEAD_DESCRIPTOR_DESERIALIZER.to_string(),
                    protector: None,
                    payload: serialized.to_vec(),
                }
            }
        };
        Ok(stored)
    }
}

impl KeyManager for KeyCatalog {
    fn create_new_key(
        &self,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
    ) -> Result<Arc<Key>> {
        let key_id = KeyId::new_random();
        let creation_date = self.clock.now();
        let descriptor = self.algorithm.create_new_descriptor()?;

        if let Some(escrow) = &self.escrow {
            escrow.store(key_id, &descriptor)?;
        }

        let record = KeyCreatedRecord::new(
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            self.stored_descriptor(&descriptor)?,
        );
        self.store_event(&KeyEvent::KeyCreated(record), &format!("key-{key_id}"))?;
        self.decoder.remember(key_id, descriptor.clone());

        info!(
            key_id = %key_id,
            %creation_date,
            %activation_date,
            %expiration_date,
            "Created key"
        );
        self.invalidate();

        Ok(Arc::new(Key::new(
            key_id,
            creation_date,
            activation_date,
            expiration_date,
            descriptor,
            Arc::clone(&self.factories),
        )))
    }

    fn get_all_keys(&self) -> Result<Vec<Arc<Key>>> {
        let elements = self.repository.get_all_elements()?;
        let replay = self.replay(&elements)?;
        Ok(replay.keys.into_iter().map(Arc::new).collect())
    }

    fn cache_expiration_token(&self) -> Arc<CancellationSignal> {
        Arc::clone(&self.expiration_signal.lock())
    }

    fn revoke_key(&self, key_id: KeyId, reason: Option<&str>) -> Result<()> {
        let record = RevocationRecord::for_key(key_id, self.clock.now(), reason.map(str::to_owned));
        self.store_event(&KeyEvent::Revocation(record), &format!("revocation-{key_id}"))?;
        info!(key_id = %key_id, reason = reason.unwrap_or_default(), "Revoked key");
        self.invalidate();
        Ok(())
    }

    fn revoke_all_keys(&self, revocation_date: DateTime<Utc>, reason: Option<&str>) -> Result<()> {
        let record = RevocationRecord::all_before(revocation_date, reason.map(str::to_owned));
        let friendly_name = format!("revocation-{}", revocation_date.format("%Y%m%dT%H%M%S%.3fZ"));
        self.store_event(&KeyEvent::Revocation(record), &friendly_name)?;
        info!(
            %revocation_date,
            reason = reason.unwrap_or_default(),
            "Revoked all keys created before date"
        );
        self.invalidate();
        Ok(())
    }
}

fn parse_event(element: &Value) -> Option<KeyEvent> {
    serde_json::from_value(element.clone()).ok()
}

/// Unlike key records, unreadable revocations are errors.
fn read_revocation(element: &Value) -> Result<RevocationRecord> {
    let record = match serde_json::from_value::<KeyEvent>(element.clone()) {
        Ok(KeyEvent::Revocation(record)) => record,
        Ok(KeyEvent::KeyCreated(_)) => {
            return Err(DataProtectionError::serialization("revocation tag on a key record"));
        }
        Err(err) => {
            return Err(DataProtectionError::serialization(format!(
                "malformed revocation record: {err}"
            )));
        }
    };

    if record.version != REVOCATION_RECORD_VERSION {
        return Err(DataProtectionError::serialization(format!(
            "revocation record version {} is not supported",
            record.version
        )));
    }
    Ok(record)
}
