//! # Ringfence Core
//!
//! Key ring and payload protection logic - no storage or primitive
//! implementations.
//!
//! This crate contains:
//! - The key catalog replaying the key event log
//! - Default key resolution and the key ring cache
//! - Purpose-bound protectors and the protected payload format
//! - Port interfaces (traits) for repositories, at-rest protection and
//!   authenticated encryption
//!
//! ## Architecture Principles
//! - Depends only on `ringfence-common` and `ringfence-domain`
//! - No file system or configuration loading
//! - All external collaborators via traits

pub mod key_management;
pub mod protection;

// Re-export specific items to avoid ambiguity
pub use key_management::ports::{
    AlgorithmConfiguration, AuthenticatedEncryptor, DefaultKeyPolicy, DescriptorProtector,
    EncryptorFactory, KeyEscrowSink, KeyManager, KeyRepository, KeyRingProvider,
};
pub use key_management::{
    CacheEntry, CancellationSignal, DefaultKeyResolution, DefaultKeyResolver, EncryptorFactories,
    Key, KeyCatalog, KeyLookup, KeyRing, KeyRingCache,
};
pub use protection::{DataProtectionProvider, Protector, UnprotectOutcome};
