//! Integration tests for the key catalog
//!
//! Exercises the event log end to end against an in-memory repository:
//! creation, revocation replay, malformed records, at-rest protection,
//! escrow and deletion.

mod support;

use std::sync::Arc;
use std::time::Duration;

use ringfence_common::{Clock, MockClock};
use ringfence_core::{KeyCatalog, KeyManager, KeyRepository};
use ringfence_domain::constants::AEAD_DESCRIPTOR_DESERIALIZER;
use ringfence_domain::{
    AeadAlgorithm, DataProtectionError, KeyCreatedRecord, KeyEvent, StoredDescriptor,
};
use serde_json::json;
use support::{
    descriptor, factories, ts, MemoryRepository, RandomAlgorithm, RecordingEscrow, XorProtector,
};

fn catalog(repository: &Arc<MemoryRepository>, clock: &MockClock) -> KeyCatalog {
    KeyCatalog::new(
        repository.clone() as Arc<dyn KeyRepository>,
        Arc::new(RandomAlgorithm(AeadAlgorithm::Aes256Gcm)),
        factories().1,
    )
    .with_clock(Arc::new(clock.clone()))
}

fn setup() -> (Arc<MemoryRepository>, MockClock, KeyCatalog) {
    let repository = Arc::new(MemoryRepository::new());
    let clock = MockClock::new(ts("2015-03-01T00:00:00Z"));
    let catalog = catalog(&repository, &clock);
    (repository, clock, catalog)
}

/// Validates a created key is persisted and read back with its dates.
#[test]
fn test_create_and_read_back() {
    let (repository, clock, catalog) = setup();
    let activation = ts("2015-03-02T00:00:00Z");
    let expiration = ts("2015-06-01T00:00:00Z");

    let created = catalog.create_new_key(activation, expiration).unwrap();

    assert_eq!(repository.len(), 1);
    assert_eq!(repository.friendly_names(), vec![format!("key-{}", created.key_id())]);
    assert_eq!(KeyEvent::document_tag(&repository.elements()[0]), Some("key_created"));

    let keys = catalog.get_all_keys().unwrap();
    assert_eq!(keys.len(), 1);
    let key = &keys[0];
    assert_eq!(key.key_id(), created.key_id());
    assert_eq!(key.creation_date(), clock.now());
    assert_eq!(key.activation_date(), activation);
    assert_eq!(key.expiration_date(), expiration);
    assert!(!key.is_revoked());
    assert_eq!(key.descriptor().unwrap().secret(), created.descriptor().unwrap().secret());
    assert!(key.create_encryptor().is_some());
}

/// Validates every read returns fresh key instances.
#[test]
fn test_reads_return_fresh_instances() {
    let (_, clock, catalog) = setup();
    catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();

    let first = catalog.get_all_keys().unwrap();
    let second = catalog.get_all_keys().unwrap();
    assert!(!Arc::ptr_eq(&first[0], &second[0]));
}

/// Validates each mutation fires the previously issued token.
#[test]
fn test_mutations_fire_expiration_token() {
    let (_, clock, catalog) = setup();

    let token = catalog.cache_expiration_token();
    assert!(!token.is_fired());
    let key = catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();
    assert!(token.is_fired());

    let token = catalog.cache_expiration_token();
    assert!(!token.is_fired());
    catalog.revoke_key(key.key_id(), Some("compromised")).unwrap();
    assert!(token.is_fired());

    let token = catalog.cache_expiration_token();
    catalog.revoke_all_keys(clock.now(), None).unwrap();
    assert!(token.is_fired());
}

/// Validates individual revocation applies to its key only.
#[test]
fn test_revoke_single_key() {
    let (_, clock, catalog) = setup();
    let expiration = clock.now() + chrono::TimeDelta::days(90);
    let k1 = catalog.create_new_key(clock.now(), expiration).unwrap();
    let k2 = catalog.create_new_key(clock.now(), expiration).unwrap();

    catalog.revoke_key(k1.key_id(), None).unwrap();

    let keys = catalog.get_all_keys().unwrap();
    let revoked: Vec<_> = keys.iter().filter(|key| key.is_revoked()).map(|key| key.key_id()).collect();
    assert_eq!(revoked, vec![k1.key_id()]);
    assert!(keys.iter().any(|key| key.key_id() == k2.key_id() && !key.is_revoked()));
}

/// Validates mass revocation uses a strict cutoff and the most recent
/// date wins.
#[test]
fn test_mass_revocation_cutoff() {
    let (_, clock, catalog) = setup();
    let expiration = clock.now() + chrono::TimeDelta::days(90);

    let early = catalog.create_new_key(clock.now(), expiration).unwrap();
    clock.advance(Duration::from_millis(59_999));
    let one_tick_before = catalog.create_new_key(clock.now(), expiration).unwrap();
    clock.advance(Duration::from_millis(1));
    let at_cutoff = catalog.create_new_key(clock.now(), expiration).unwrap();
    let cutoff = clock.now();
    clock.advance(Duration::from_secs(60));
    let late = catalog.create_new_key(clock.now(), expiration).unwrap();

    catalog.revoke_all_keys(cutoff, Some("rotation")).unwrap();
    catalog.revoke_all_keys(ts("2015-01-01T00:00:00Z"), None).unwrap();

    let keys = catalog.get_all_keys().unwrap();
    let is_revoked = |id: ringfence_domain::KeyId| {
        keys.iter().find(|key| key.key_id() == id).unwrap().is_revoked()
    };
    assert!(is_revoked(early.key_id()));
    assert!(is_revoked(one_tick_before.key_id()));
    assert!(!is_revoked(at_cutoff.key_id()));
    assert!(!is_revoked(late.key_id()));
}

/// Validates a revocation naming an unknown key is tolerated.
#[test]
fn test_revocation_of_unknown_key_ignored() {
    let (_, clock, catalog) = setup();
    let key = catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();
    catalog.revoke_key(ringfence_domain::KeyId::new_random(), None).unwrap();

    let keys = catalog.get_all_keys().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].key_id(), key.key_id());
    assert!(!keys[0].is_revoked());
}

/// Validates unreadable key records and unknown elements are skipped.
#[test]
fn test_unreadable_key_records_skipped() {
    let (repository, clock, catalog) = setup();
    let good = catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();

    let mut future = repository.elements()[0].clone();
    future["version"] = json!(2);
    future["id"] = json!(ringfence_domain::KeyId::new_random());
    repository.push(future);
    repository.push(json!({ "event": "key_created", "id": "not-a-guid" }));
    repository.push(json!({ "event": "audit", "message": "hello" }));
    repository.push(json!([1, 2, 3]));

    let keys = catalog.get_all_keys().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].key_id(), good.key_id());
}

/// Validates unreadable revocations fail the read.
#[test]
fn test_unreadable_revocation_is_error() {
    let (repository, clock, catalog) = setup();
    catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();
    repository.push(json!({ "event": "revocation", "version": 1, "target": { "kind": "galaxy" } }));

    let err = catalog.get_all_keys().unwrap_err();
    assert!(matches!(err, DataProtectionError::Serialization { .. }));

    let (repository, _, catalog) = setup();
    catalog.revoke_all_keys(ts("2015-01-01T00:00:00Z"), None).unwrap();
    let mut future = repository.elements()[0].clone();
    future["version"] = json!(9);
    repository.push(future);
    assert!(matches!(catalog.get_all_keys(), Err(DataProtectionError::Serialization { .. })));
}

/// Validates a key id defined twice is corruption.
#[test]
fn test_duplicate_key_id_is_corruption() {
    let (repository, clock, catalog) = setup();
    catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();
    repository.push(repository.elements()[0].clone());

    let err = catalog.get_all_keys().unwrap_err();
    assert!(matches!(err, DataProtectionError::RepositoryCorruption { .. }));
    assert!(err.is_integrity_failure());
}

/// Validates descriptors are wrapped at rest, unwrapped at most once per
/// catalog, and unusable without the matching unprotector.
#[test]
fn test_at_rest_protection() {
    let repository = Arc::new(MemoryRepository::new());
    let clock = MockClock::new(ts("2015-03-01T00:00:00Z"));
    let protector = Arc::new(XorProtector::new("xor", 0x5A));
    let writer = catalog(&repository, &clock).with_at_rest_protector(protector.clone());

    let created = writer.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();
    let stored = &repository.elements()[0]["descriptor"];
    assert_eq!(stored["protector"], json!("xor"));

    // The creating catalog already knows the descriptor.
    writer.get_all_keys().unwrap()[0].descriptor().unwrap();
    assert_eq!(protector.unprotects(), 0);

    let reader = catalog(&repository, &clock).with_unprotector(protector.clone());
    for _ in 0..3 {
        let keys = reader.get_all_keys().unwrap();
        assert_eq!(keys[0].descriptor().unwrap().secret(), created.descriptor().unwrap().secret());
    }
    assert_eq!(protector.unprotects(), 1);

    let stranger = catalog(&repository, &clock);
    let keys = stranger.get_all_keys().unwrap();
    assert!(matches!(keys[0].descriptor(), Err(DataProtectionError::Cryptography { .. })));
    assert!(keys[0].create_encryptor().is_none());
}

/// Validates escrow receives the unwrapped descriptor of each new key.
#[test]
fn test_escrow_receives_descriptor() {
    let repository = Arc::new(MemoryRepository::new());
    let clock = MockClock::new(ts("2015-03-01T00:00:00Z"));
    let escrow = Arc::new(RecordingEscrow::default());
    let catalog = catalog(&repository, &clock)
        .with_at_rest_protector(Arc::new(XorProtector::new("xor", 0x11)))
        .with_escrow(escrow.clone());

    let created = catalog.create_new_key(clock.now(), clock.now() + chrono::TimeDelta::days(90)).unwrap();

    let stored = escrow.stored.lock();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, created.key_id());
    assert_eq!(stored[0].1.secret(), created.descriptor().unwrap().secret());
}

/// Validates deletion removes the chosen keys with revocations that no
/// longer apply, keeping the latest mass revocation.
#[test]
fn test_delete_keys() {
    let (repository, clock, catalog) = setup();
    let expiration = clock.now() + chrono::TimeDelta::days(90);
    let step = Duration::from_secs(1);

    let k1 = catalog.create_new_key(clock.now(), expiration).unwrap();
    clock.advance(step);
    catalog.revoke_all_keys(clock.now(), None).unwrap();
    clock.advance(step);
    let k2 = catalog.create_new_key(clock.now(), expiration).unwrap();
    clock.advance(step);
    catalog.revoke_all_keys(clock.now(), None).unwrap();
    clock.advance(step);
    let k3 = catalog.create_new_key(clock.now(), expiration).unwrap();
    let k4 = catalog.create_new_key(clock.now(), expiration).unwrap();
    catalog.revoke_key(k2.key_id(), None).unwrap();
    catalog.revoke_key(k3.key_id(), None).unwrap();
    catalog.revoke_key(k3.key_id(), None).unwrap();
    assert_eq!(repository.len(), 9);

    let token = catalog.cache_expiration_token();
    let doomed = [k1.key_id(), k3.key_id()];
    assert!(catalog.delete_keys(&|key| doomed.contains(&key.key_id())).unwrap());
    assert!(token.is_fired());
    assert_eq!(repository.len(), 4);

    let keys = catalog.get_all_keys().unwrap();
    let mut ids: Vec<_> = keys.iter().map(|key| key.key_id()).collect();
    ids.sort();
    let mut expected = vec![k2.key_id(), k4.key_id()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(keys.iter().all(|key| key.is_revoked() == (key.key_id() == k2.key_id())));

    let tags: Vec<_> = repository
        .elements()
        .iter()
        .filter(|element| KeyEvent::document_tag(element) == Some("revocation"))
        .map(|element| element["target"]["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(tags.len(), 2);
    assert!(tags.contains(&"all_before".to_string()));
    assert!(tags.contains(&"key".to_string()));

    assert!(!catalog.delete_keys(&|_| false).unwrap());
}

/// Validates a deleted key's descriptor is forgotten, so a document later
/// restored under the same id is read from its own descriptor.
#[test]
fn test_delete_keys_forgets_descriptors() {
    let (repository, clock, catalog) = setup();
    let activation = clock.now();
    let expiration = clock.now() + chrono::TimeDelta::days(90);
    let deleted = catalog.create_new_key(activation, expiration).unwrap();
    assert!(catalog.delete_keys(&|key| key.key_id() == deleted.key_id()).unwrap());

    let replacement = descriptor();
    let restored = KeyEvent::KeyCreated(KeyCreatedRecord::new(
        deleted.key_id(),
        activation,
        activation,
        expiration,
        StoredDescriptor {
            deserializer: AEAD_DESCRIPTOR_DESERIALIZER.to_string(),
            protector: None,
            payload: replacement.to_bytes().unwrap().to_vec(),
        },
    ));
    repository.push(restored.to_document().unwrap());

    let keys = catalog.get_all_keys().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].descriptor().unwrap().secret(), replacement.secret());
    assert_ne!(replacement.secret(), deleted.descriptor().unwrap().secret());
}

/// Validates deletion is refused by repositories that cannot delete.
#[test]
fn test_delete_keys_not_supported() {
    let repository = Arc::new(MemoryRepository::without_deletion());
    let clock = MockClock::new(ts("2015-03-01T00:00:00Z"));
    let catalog = catalog(&repository, &clock);

    let err = catalog.delete_keys(&|_| true).unwrap_err();
    assert!(matches!(err, DataProtectionError::NotSupported { .. }));
}
