//! Serialization utilities for common data types
//!
//! Reusable `#[serde(with = "...")]` modules for values that have no natural
//! JSON/TOML representation.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Custom serialization module for Duration as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use ringfence_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     refresh_period: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, SerializeResult, Serializer};

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Custom serialization module for byte buffers as standard base64 strings
///
/// Used for opaque blobs (key material, wrapped descriptors) embedded in
/// JSON records.
pub mod base64_bytes {
    use super::{Deserialize, Deserializer, Engine, SerializeResult, Serializer, BASE64};

    /// Serialize bytes as a base64 string
    pub fn serialize<S, T>(bytes: &T, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&BASE64.encode(bytes.as_ref()))
    }

    /// Deserialize a base64 string into bytes
    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: From<Vec<u8>>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map(T::from).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization utilities

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        #[serde(with = "duration_millis")]
        timeout: Duration,
        #[serde(with = "base64_bytes")]
        blob: Vec<u8>,
    }

    /// Tests that Duration serializes to milliseconds and bytes to base64
    #[test]
    fn test_serialize_shapes() {
        let data = TestStruct { timeout: Duration::from_millis(1500), blob: vec![0xde, 0xad] };

        let json = serde_json::to_string(&data).expect("Should serialize valid struct");
        assert_eq!(json, r#"{"timeout":1500,"blob":"3q0="}"#);
    }

    /// Tests that milliseconds and base64 deserialize back
    #[test]
    fn test_deserialize_shapes() {
        let json = r#"{"timeout":86400000,"blob":"AAEC"}"#;
        let data: TestStruct = serde_json::from_str(json).expect("Should deserialize valid JSON");

        assert_eq!(data.timeout, Duration::from_secs(86_400));
        assert_eq!(data.blob, vec![0, 1, 2]);
    }

    /// Validates that malformed base64 is rejected instead of truncated.
    #[test]
    fn test_base64_rejects_garbage() {
        let json = r#"{"timeout":0,"blob":"not base64!"}"#;
        let result: Result<TestStruct, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    /// Validates the duration millis deserialize invalid json scenario.
    #[test]
    fn test_duration_millis_deserialize_invalid_json() {
        let invalid_json = r#"{"timeout":"not_a_number","blob":""}"#;
        let result: Result<TestStruct, _> = serde_json::from_str(invalid_json);
        assert!(result.is_err());
    }
}
