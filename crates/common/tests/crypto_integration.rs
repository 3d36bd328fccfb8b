//! Integration tests for the crypto module
//!
//! Validates the AES-GCM primitive across independent cipher instances,
//! password-derived keys and tamper detection.

#![cfg(feature = "runtime")]

use proptest::prelude::*;
use ringfence_common::crypto::aead::{AeadCipher, NONCE_SIZE, TAG_SIZE};
use ringfence_common::CommonError;

/// End-to-end round-trip using generated keys across distinct cipher
/// instances.
#[test]
fn aead_round_trip_across_instances() {
    let key = AeadCipher::generate_key(32);
    let sealer = AeadCipher::new(&key).expect("failed to init sealer");
    let opener = AeadCipher::new(&key).expect("failed to init opener with same key");

    let plaintext = b"crypto integration payload";
    let sealed = sealer.seal(plaintext, b"integration", 0, 0).expect("seal should succeed");

    assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    assert_eq!(sealer.fingerprint(), opener.fingerprint());

    let opened = opener.open(&sealed, b"integration").expect("open should succeed");
    assert_eq!(opened.as_slice(), plaintext);
}

/// Sealing the same plaintext twice must never repeat a nonce.
#[test]
fn repeated_seals_use_fresh_nonces() {
    let cipher = AeadCipher::new(&AeadCipher::generate_key(16)).expect("cipher");
    let a = cipher.seal(b"same", b"", 0, 0).expect("seal a");
    let b = cipher.seal(b"same", b"", 0, 0).expect("seal b");
    assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    assert_ne!(a, b);
}

/// A key derived from a passphrase opens what a sibling derivation sealed,
/// and a wrong passphrase does not.
#[test]
fn password_derived_keys_interoperate() {
    let salt = AeadCipher::generate_salt();
    let key = AeadCipher::derive_key_from_password(b"correct horse battery staple", &salt, 32)
        .expect("derivation should succeed");
    let sealed = AeadCipher::new(&key).expect("cipher").seal(b"descriptor", b"", 0, 0).expect("seal");

    let again = AeadCipher::derive_key_from_password(b"correct horse battery staple", &salt, 32)
        .expect("derivation should succeed");
    let opened = AeadCipher::new(&again).expect("cipher").open(&sealed, b"").expect("open");
    assert_eq!(opened, b"descriptor");

    let wrong = AeadCipher::derive_key_from_password(b"definitely-wrong", &salt, 32)
        .expect("derivation should succeed");
    let err = AeadCipher::new(&wrong).expect("cipher").open(&sealed, b"").unwrap_err();
    assert!(matches!(err, CommonError::Crypto { .. }));
}

proptest! {
    /// Flipping any single bit of the sealed bytes must fail authentication.
    #[test]
    fn any_bit_flip_is_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..64),
        bit in 0usize..((NONCE_SIZE + TAG_SIZE) * 8),
    ) {
        let cipher = AeadCipher::new(&AeadCipher::generate_key(32)).expect("cipher");
        let mut sealed = cipher.seal(&plaintext, b"aad", 0, 0).expect("seal");
        let bit = bit % (sealed.len() * 8);
        sealed[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(cipher.open(&sealed, b"aad").is_err());
    }
}
