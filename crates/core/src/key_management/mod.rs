//! Key management: the key log, default key policy and key ring cache

pub mod cache;
pub mod catalog;
pub mod key;
pub mod key_ring;
pub mod ports;
pub mod resolver;
pub mod signal;

pub use cache::{CacheEntry, KeyRingCache};
pub use catalog::KeyCatalog;
pub use key::{DescriptorMaterializer, EncryptorFactories, Key};
pub use key_ring::{KeyLookup, KeyRing};
pub use resolver::{DefaultKeyResolution, DefaultKeyResolver};
pub use signal::CancellationSignal;
