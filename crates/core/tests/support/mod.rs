//! Shared test helpers for `ringfence-core` integration tests.
//!
//! These helpers provide in-memory repositories, a real AES-GCM encryptor
//! factory, and a call-recording key manager so tests can focus on
//! behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod keys;
pub mod repositories;

pub use keys::*;
pub use repositories::*;
