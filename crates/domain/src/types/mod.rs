//! Domain types and models
//!
//! - [`KeyId`]: stable identifier of a key, with its wire encoding
//! - [`AeadAlgorithm`] / [`KeyDescriptor`]: what a key is and its secret
//! - Persisted key event records replayed by the key catalog

pub mod descriptor;
pub mod key_id;
pub mod records;

pub use descriptor::{AeadAlgorithm, KeyDescriptor};
pub use key_id::KeyId;
pub use records::{
    KeyCreatedRecord, KeyEvent, RevocationRecord, RevocationTarget, StoredDescriptor,
};
