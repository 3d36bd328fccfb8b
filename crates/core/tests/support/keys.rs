//! Key-side mocks: encryptors, factories, a recording key manager and a
//! scripted default key policy

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ringfence_common::{AeadCipher, Clock, MockClock};
use ringfence_core::{
    AlgorithmConfiguration, AuthenticatedEncryptor, CancellationSignal, DefaultKeyPolicy,
    DefaultKeyResolution, EncryptorFactories, EncryptorFactory, Key, KeyManager,
};
use ringfence_domain::{AeadAlgorithm, DataProtectionError, KeyDescriptor, KeyId, Result};

use super::Gate;

/// Parse an RFC 3339 instant.
pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

/// `AuthenticatedEncryptor` over the real AES-GCM primitive.
pub struct CipherEncryptor {
    cipher: AeadCipher,
}

impl AuthenticatedEncryptor for CipherEncryptor {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8], pre: usize, post: usize) -> Result<Vec<u8>> {
        Ok(self.cipher.seal(plaintext, aad, pre, post)?)
    }

    fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        Ok(self.cipher.open(ciphertext, aad)?)
    }
}

/// Factory building `CipherEncryptor`s and counting how many it built.
#[derive(Default)]
pub struct CountingFactory {
    built: AtomicUsize,
}

impl CountingFactory {
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl EncryptorFactory for CountingFactory {
    fn create_encryptor(
        &self,
        descriptor: &KeyDescriptor,
    ) -> Option<Arc<dyn AuthenticatedEncryptor>> {
        let cipher = AeadCipher::new(descriptor.secret()).ok()?;
        self.built.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(CipherEncryptor { cipher }))
    }
}

pub fn factories() -> (Arc<CountingFactory>, EncryptorFactories) {
    let factory = Arc::new(CountingFactory::default());
    let factories: EncryptorFactories = Arc::new([factory.clone() as Arc<dyn EncryptorFactory>]);
    (factory, factories)
}

/// Fresh random descriptors of one algorithm.
pub struct RandomAlgorithm(pub AeadAlgorithm);

impl AlgorithmConfiguration for RandomAlgorithm {
    fn create_new_descriptor(&self) -> Result<KeyDescriptor> {
        KeyDescriptor::new(self.0, AeadCipher::generate_key(self.0.key_len()))
    }
}

pub fn descriptor() -> KeyDescriptor {
    RandomAlgorithm(AeadAlgorithm::Aes256Gcm).create_new_descriptor().unwrap()
}

/// Usable key with the given dates.
pub fn key(creation: DateTime<Utc>, activation: DateTime<Utc>, expiration: DateTime<Utc>) -> Arc<Key> {
    Arc::new(Key::new(
        KeyId::new_random(),
        creation,
        activation,
        expiration,
        descriptor(),
        factories().1,
    ))
}

/// `KeyManager` over a fixed list of keys that records every call.
pub struct RecordingKeyManager {
    keys: Mutex<Vec<Arc<Key>>>,
    calls: Mutex<Vec<&'static str>>,
    created: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    token: Mutex<Arc<CancellationSignal>>,
    clock: MockClock,
    fail_reads: AtomicBool,
    pub read_gate: Gate,
}

impl RecordingKeyManager {
    pub fn new(clock: MockClock, keys: Vec<Arc<Key>>) -> Self {
        Self {
            keys: Mutex::new(keys),
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            token: Mutex::new(Arc::new(CancellationSignal::new())),
            clock,
            fail_reads: AtomicBool::new(false),
            read_gate: Gate::default(),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|recorded| **recorded == call).count()
    }

    /// `(activation, expiration)` of every key created.
    pub fn created(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.created.lock().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fire the current expiration token, as a key set change would.
    pub fn invalidate(&self) {
        let previous =
            std::mem::replace(&mut *self.token.lock(), Arc::new(CancellationSignal::new()));
        previous.fire();
    }
}

impl KeyManager for RecordingKeyManager {
    fn create_new_key(
        &self,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
    ) -> Result<Arc<Key>> {
        self.calls.lock().push("create_new_key");
        self.created.lock().push((activation_date, expiration_date));
        let new_key = key(self.clock.now(), activation_date, expiration_date);
        self.keys.lock().push(Arc::clone(&new_key));
        self.invalidate();
        Ok(new_key)
    }

    fn get_all_keys(&self) -> Result<Vec<Arc<Key>>> {
        self.calls.lock().push("get_all_keys");
        self.read_gate.pass();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DataProtectionError::storage("read", "backend unavailable"));
        }
        Ok(self.keys.lock().clone())
    }

    fn cache_expiration_token(&self) -> Arc<CancellationSignal> {
        self.calls.lock().push("cache_expiration_token");
        Arc::clone(&self.token.lock())
    }

    fn revoke_key(&self, key_id: KeyId, _reason: Option<&str>) -> Result<()> {
        self.calls.lock().push("revoke_key");
        for key in self.keys.lock().iter().filter(|key| key.key_id() == key_id) {
            key.set_revoked();
        }
        self.invalidate();
        Ok(())
    }

    fn revoke_all_keys(&self, revocation_date: DateTime<Utc>, _reason: Option<&str>) -> Result<()> {
        self.calls.lock().push("revoke_all_keys");
        for key in self.keys.lock().iter().filter(|key| key.creation_date() < revocation_date) {
            key.set_revoked();
        }
        self.invalidate();
        Ok(())
    }
}

/// `DefaultKeyPolicy` replaying canned resolutions and recording the
/// instants it was asked about. The last resolution repeats once the
/// script runs out.
pub struct ScriptedResolver {
    script: Mutex<VecDeque<DefaultKeyResolution>>,
    last: Mutex<DefaultKeyResolution>,
    asked: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedResolver {
    pub fn new(script: Vec<DefaultKeyResolution>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(DefaultKeyResolution::default()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<DateTime<Utc>> {
        self.asked.lock().clone()
    }
}

impl DefaultKeyPolicy for ScriptedResolver {
    fn resolve_default_key_policy(
        &self,
        now: DateTime<Utc>,
        _keys: &[Arc<Key>],
    ) -> DefaultKeyResolution {
        self.asked.lock().push(now);
        let mut last = self.last.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

/// Resolution naming `key` as default.
pub fn resolved(key: &Arc<Key>) -> DefaultKeyResolution {
    DefaultKeyResolution {
        default_key: Some(Arc::clone(key)),
        fallback_key: None,
        should_generate_new_key: false,
    }
}

/// Resolution with no default, asking for a new key.
pub fn generate(fallback: Option<&Arc<Key>>) -> DefaultKeyResolution {
    DefaultKeyResolution {
        default_key: None,
        fallback_key: fallback.cloned(),
        should_generate_new_key: true,
    }
}
