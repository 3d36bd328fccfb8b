//! Shared cryptographic primitives used by the runtime tier.

pub mod aead;

pub use aead::{AeadCipher, NONCE_SIZE, TAG_SIZE};
