//! Common utility helpers
//!
//! - **[`serde`]**: serialization helpers for durations and binary blobs

pub mod serde;

// Re-export commonly used items for convenience
pub use self::serde::{base64_bytes, duration_millis};
