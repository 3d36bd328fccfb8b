//! Key identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::KEY_ID_SIZE;

/// Identifier of a key in the key ring.
///
/// Ordering follows the canonical (hyphenated string) order of the UUID,
/// which the default key resolver uses as its tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(Uuid);

impl KeyId {
    /// Generate a new random (v4) key id.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Bytes written into protected payloads and AAD.
    ///
    /// Uses the mixed-endian GUID layout (first three groups little-endian)
    /// so payloads interoperate with fleets that serialize ids that way.
    pub fn to_wire_bytes(&self) -> [u8; KEY_ID_SIZE] {
        self.0.to_bytes_le()
    }

    /// Inverse of [`KeyId::to_wire_bytes`].
    pub fn from_wire_bytes(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for KeyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for KeyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
