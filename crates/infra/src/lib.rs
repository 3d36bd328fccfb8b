//! # Ringfence Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - AES-GCM encryptor factory and algorithm configuration
//! - Passphrase-based at-rest protection of key descriptors
//! - In-memory and file-system key repositories
//! - Configuration loading and tracing setup
//! - The composition root wiring a `Config` into a data protection provider
//!
//! ## Architecture
//! - Implements traits defined in `ringfence-core`
//! - Contains all "impure" code (file I/O, environment, OS randomness)

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod observability;
pub mod repositories;

// Re-export commonly used items
pub use adapters::{AesGcmAlgorithmConfiguration, AesGcmEncryptorFactory, PassphraseDescriptorProtector};
pub use bootstrap::{DataProtection, DataProtectionBuilder};
pub use repositories::{FileSystemKeyRepository, InMemoryKeyRepository};
