//! Protected payload header
//!
//! ```text
//! [ magic (4, big-endian) | key id (16) | ciphertext ... ]
//! ```
//!
//! The low nibble of the magic word is a format version; only version zero
//! exists.

use ringfence_domain::constants::{
    KEY_ID_SIZE, MAGIC_HEADER_SIZE, MAGIC_HEADER_V0, MAGIC_VERSION_MASK, PAYLOAD_HEADER_SIZE,
};
use ringfence_domain::{DataProtectionError, KeyId, PayloadDefect, Result};

/// Validate the header of `payload` and return the key id it names.
pub(crate) fn read_header(payload: &[u8]) -> Result<KeyId> {
    if payload.len() < PAYLOAD_HEADER_SIZE {
        return Err(DataProtectionError::MalformedPayload(PayloadDefect::TooShort));
    }

    let mut magic = [0u8; MAGIC_HEADER_SIZE];
    magic.copy_from_slice(&payload[..MAGIC_HEADER_SIZE]);
    let magic = u32::from_be_bytes(magic);

    if magic & !MAGIC_VERSION_MASK != MAGIC_HEADER_V0 & !MAGIC_VERSION_MASK {
        return Err(DataProtectionError::MalformedPayload(PayloadDefect::BadMagicHeader));
    }
    let version = magic & MAGIC_VERSION_MASK;
    if version != MAGIC_HEADER_V0 & MAGIC_VERSION_MASK {
        let version = u8::try_from(version).unwrap_or(u8::MAX);
        return Err(DataProtectionError::MalformedPayload(PayloadDefect::UnsupportedVersion(
            version,
        )));
    }

    let mut key_id = [0u8; KEY_ID_SIZE];
    key_id.copy_from_slice(&payload[MAGIC_HEADER_SIZE..PAYLOAD_HEADER_SIZE]);
    Ok(KeyId::from_wire_bytes(key_id))
}

/// Write the header into the first [`PAYLOAD_HEADER_SIZE`] bytes of `out`.
pub(crate) fn write_header(out: &mut [u8], key_id: KeyId) {
    out[..MAGIC_HEADER_SIZE].copy_from_slice(&MAGIC_HEADER_V0.to_be_bytes());
    out[MAGIC_HEADER_SIZE..PAYLOAD_HEADER_SIZE].copy_from_slice(&key_id.to_wire_bytes());
}
