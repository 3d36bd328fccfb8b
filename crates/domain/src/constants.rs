//! Wire-format and record constants
//!
//! Centralized location for the values that must stay stable across
//! releases: changing any of them breaks existing payloads or stored keys.

/// Magic header of protected payloads: top 28 bits identify the format, the
/// low 4 bits carry the version (only version 0 exists).
pub const MAGIC_HEADER_V0: u32 = 0x09F0_C9F0;

/// Mask selecting the version nibble of the magic header.
pub const MAGIC_VERSION_MASK: u32 = 0x0000_000F;

/// Size of the magic header in bytes.
pub const MAGIC_HEADER_SIZE: usize = 4;

/// Size of a serialized key id in bytes.
pub const KEY_ID_SIZE: usize = 16;

/// Size of the protected payload header (magic + key id).
pub const PAYLOAD_HEADER_SIZE: usize = MAGIC_HEADER_SIZE + KEY_ID_SIZE;

/// Version stamped on key creation records written by this crate.
pub const KEY_RECORD_VERSION: u32 = 1;

/// Version stamped on revocation records written by this crate.
pub const REVOCATION_RECORD_VERSION: u32 = 1;

/// Deserializer id attached to stored AEAD descriptors.
pub const AEAD_DESCRIPTOR_DESERIALIZER: &str = "ringfence.aead-descriptor.v1";

// Key management defaults
pub const DEFAULT_NEW_KEY_LIFETIME_DAYS: u64 = 90;
pub const MIN_NEW_KEY_LIFETIME_DAYS: u64 = 7;
pub const DEFAULT_KEY_PROPAGATION_WINDOW_HOURS: u64 = 48;
pub const DEFAULT_MAX_SERVER_CLOCK_SKEW_MINUTES: u64 = 5;
pub const DEFAULT_KEY_RING_REFRESH_PERIOD_HOURS: u64 = 24;
pub const DEFAULT_SHORT_KEY_RING_REFRESH_PERIOD_MINUTES: u64 = 2;
pub const DEFAULT_REFRESH_FAILURE_EXTENSION_MINUTES: u64 = 2;
pub const DEFAULT_UNPROTECT_REFRESH_WINDOW_MINUTES: u64 = 2;
pub const DEFAULT_REFRESH_JITTER_FLOOR: f64 = 0.8;
