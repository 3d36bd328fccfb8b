//! AES-GCM implementations of the encryptor and algorithm ports
//!
//! Both key sizes share [`AeadCipher`]; the descriptor's algorithm picks
//! the key length.

use std::fmt;
use std::sync::Arc;

use ringfence_common::AeadCipher;
use ringfence_core::{AlgorithmConfiguration, AuthenticatedEncryptor, EncryptorFactory};
use ringfence_domain::{AeadAlgorithm, DataProtectionError, KeyDescriptor, Result};
use tracing::debug;

/// Encryptor bound to one key's secret.
pub struct AesGcmEncryptor {
    cipher: AeadCipher,
}

impl AesGcmEncryptor {
    pub fn new(descriptor: &KeyDescriptor) -> Result<Self> {
        let cipher = AeadCipher::new(descriptor.secret())?;
        Ok(Self { cipher })
    }
}

impl fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryptor").field("cipher", &self.cipher).finish()
    }
}

impl AuthenticatedEncryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8], pre: usize, post: usize) -> Result<Vec<u8>> {
        self.cipher
            .seal(plaintext, aad, pre, post)
            .map_err(|_| DataProtectionError::EncryptionFailed)
    }

    fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        self.cipher.open(ciphertext, aad).map_err(|_| DataProtectionError::DecryptionFailed)
    }
}

/// Builds [`AesGcmEncryptor`]s for descriptors of the accepted algorithms.
#[derive(Debug, Clone)]
pub struct AesGcmEncryptorFactory {
    accepted: Vec<AeadAlgorithm>,
}

impl Default for AesGcmEncryptorFactory {
    fn default() -> Self {
        Self { accepted: vec![AeadAlgorithm::Aes128Gcm, AeadAlgorithm::Aes256Gcm] }
    }
}

impl AesGcmEncryptorFactory {
    /// Factory accepting both AES-GCM key sizes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that declines descriptors of any other algorithm.
    pub fn for_algorithms(accepted: &[AeadAlgorithm]) -> Self {
        Self { accepted: accepted.to_vec() }
    }
}

impl EncryptorFactory for AesGcmEncryptorFactory {
    fn create_encryptor(
        &self,
        descriptor: &KeyDescriptor,
    ) -> Option<Arc<dyn AuthenticatedEncryptor>> {
        if !self.accepted.contains(&descriptor.algorithm()) {
            return None;
        }
        match AesGcmEncryptor::new(descriptor) {
            Ok(encryptor) => Some(Arc::new(encryptor)),
            Err(err) => {
                debug!(algorithm = %descriptor.algorithm(), error = %err, "aes_gcm.encryptor_rejected");
                None
            }
        }
    }
}

/// Generates fresh random secrets for one algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmAlgorithmConfiguration {
    algorithm: AeadAlgorithm,
}

impl AesGcmAlgorithmConfiguration {
    pub const fn new(algorithm: AeadAlgorithm) -> Self {
        Self { algorithm }
    }

    pub const fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }
}

impl AlgorithmConfiguration for AesGcmAlgorithmConfiguration {
    fn create_new_descriptor(&self) -> Result<KeyDescriptor> {
        KeyDescriptor::new(self.algorithm, AeadCipher::generate_key(self.algorithm.key_len()))
    }
}
