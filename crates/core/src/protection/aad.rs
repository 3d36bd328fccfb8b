//! Additional authenticated data
//!
//! ```text
//! [ magic (4) | key id (16) | purpose count (4, big-endian) |
//!   { 7-bit varint length | UTF-8 purpose }* ]
//! ```
//!
//! Only the key id varies between payloads of one protector, so the
//! template is built once and the id patched in place.

use ringfence_domain::constants::{KEY_ID_SIZE, MAGIC_HEADER_SIZE, MAGIC_HEADER_V0};
use ringfence_domain::KeyId;
use uuid::Uuid;

const KEY_ID_OFFSET: usize = MAGIC_HEADER_SIZE;

/// AAD bytes for one purpose chain and one key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AadTemplate {
    key_id: KeyId,
    bytes: Vec<u8>,
}

impl AadTemplate {
    /// Template for `purposes` with an all-zero key id.
    pub(crate) fn new(purposes: &[String]) -> Self {
        let key_id = KeyId::from_uuid(Uuid::nil());
        let mut bytes = Vec::with_capacity(
            MAGIC_HEADER_SIZE
                + KEY_ID_SIZE
                + 4
                + purposes.iter().map(|purpose| purpose.len() + 5).sum::<usize>(),
        );
        bytes.extend_from_slice(&MAGIC_HEADER_V0.to_be_bytes());
        bytes.extend_from_slice(&key_id.to_wire_bytes());
        let count = u32::try_from(purposes.len()).unwrap_or(u32::MAX);
        bytes.extend_from_slice(&count.to_be_bytes());
        for purpose in purposes {
            write_length_prefixed(&mut bytes, purpose.as_bytes());
        }
        Self { key_id, bytes }
    }

    pub(crate) const fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy of this template naming `key_id`.
    pub(crate) fn with_key_id(&self, key_id: KeyId) -> Self {
        let mut bytes = self.bytes.clone();
        bytes[KEY_ID_OFFSET..KEY_ID_OFFSET + KEY_ID_SIZE].copy_from_slice(&key_id.to_wire_bytes());
        Self { key_id, bytes }
    }
}

/// Length as a little-endian base-128 varint, then the bytes.
fn write_length_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    let mut remaining = data.len();
    while remaining >= 0x80 {
        out.push((remaining & 0x7F) as u8 | 0x80);
        remaining >>= 7;
    }
    out.push(remaining as u8);
    out.extend_from_slice(data);
}
