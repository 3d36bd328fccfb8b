//! Cryptographic adapters for the core key management ports

pub mod aes_gcm;
pub mod passphrase;

pub use aes_gcm::{AesGcmAlgorithmConfiguration, AesGcmEncryptor, AesGcmEncryptorFactory};
pub use passphrase::PassphraseDescriptorProtector;
