//! Key descriptors: the algorithm and secret behind a key

use std::fmt;
use std::str::FromStr;

use ringfence_common::base64_bytes;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{DataProtectionError, Result};

/// Authenticated encryption algorithms a key can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl AeadAlgorithm {
    /// Secret length in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }

    /// Canonical name, as used in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for AeadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AeadAlgorithm {
    type Err = DataProtectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-128-gcm" | "aes128gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" | "aes256gcm" => Ok(Self::Aes256Gcm),
            other => Err(DataProtectionError::configuration(format!(
                "unsupported algorithm '{other}'"
            ))),
        }
    }
}

/// Everything needed to instantiate an encryptor for one key.
///
/// The secret is zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    algorithm: AeadAlgorithm,
    secret: Zeroizing<Vec<u8>>,
}

#[derive(Serialize)]
struct DescriptorView<'a> {
    algorithm: AeadAlgorithm,
    #[serde(with = "base64_bytes")]
    secret: &'a [u8],
}

#[derive(Deserialize)]
struct DescriptorOwned {
    algorithm: AeadAlgorithm,
    #[serde(with = "base64_bytes")]
    secret: Vec<u8>,
}

impl KeyDescriptor {
    /// Build a descriptor, checking the secret length matches the algorithm.
    pub fn new(algorithm: AeadAlgorithm, secret: Zeroizing<Vec<u8>>) -> Result<Self> {
        if secret.len() != algorithm.key_len() {
            return Err(DataProtectionError::cryptography(format!(
                "{algorithm} requires a {}-byte secret, got {}",
                algorithm.key_len(),
                secret.len()
            )));
        }
        Ok(Self { algorithm, secret })
    }

    pub const fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Serialize to the byte form stored (possibly wrapped) in key records.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let view = DescriptorView { algorithm: self.algorithm, secret: &self.secret };
        Ok(Zeroizing::new(serde_json::to_vec(&view)?))
    }

    /// Parse bytes produced by [`KeyDescriptor::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let owned: DescriptorOwned = serde_json::from_slice(bytes)?;
        Self::new(owned.algorithm, Zeroizing::new(owned.secret))
    }
}

impl fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("algorithm", &self.algorithm)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
