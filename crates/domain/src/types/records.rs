//! Persisted key events
//!
//! The key repository is an append-only log of these records. Replaying the
//! log in any order yields the current key set.

use chrono::{DateTime, Utc};
use ringfence_common::base64_bytes;
use serde::{Deserialize, Serialize};

use super::KeyId;
use crate::constants::{KEY_RECORD_VERSION, REVOCATION_RECORD_VERSION};

/// A key descriptor as it sits in storage.
///
/// `payload` is the serialized descriptor, wrapped by the at-rest protector
/// named in `protector` when one was configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDescriptor {
    pub deserializer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protector: Option<String>,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// Creation of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCreatedRecord {
    pub version: u32,
    pub id: KeyId,
    pub creation_date: DateTime<Utc>,
    pub activation_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub descriptor: StoredDescriptor,
}

impl KeyCreatedRecord {
    /// Record stamped with the current record version.
    pub fn new(
        id: KeyId,
        creation_date: DateTime<Utc>,
        activation_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
        descriptor: StoredDescriptor,
    ) -> Self {
        Self {
            version: KEY_RECORD_VERSION,
            id,
            creation_date,
            activation_date,
            expiration_date,
            descriptor,
        }
    }
}

/// What a revocation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevocationTarget {
    /// A single key.
    Key { key_id: KeyId },
    /// Every key created strictly before the record's revocation date.
    AllBefore,
}

/// Revocation of one key or of every key created before a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub version: u32,
    pub revocation_date: DateTime<Utc>,
    pub target: RevocationTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RevocationRecord {
    /// Revocation of a single key.
    pub fn for_key(key_id: KeyId, revocation_date: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            version: REVOCATION_RECORD_VERSION,
            revocation_date,
            target: RevocationTarget::Key { key_id },
            reason,
        }
    }

    /// Revocation of every key created before `revocation_date`.
    pub fn all_before(revocation_date: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            version: REVOCATION_RECORD_VERSION,
            revocation_date,
            target: RevocationTarget::AllBefore,
            reason,
        }
    }
}

/// One entry of the key event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KeyEvent {
    KeyCreated(KeyCreatedRecord),
    Revocation(RevocationRecord),
}

impl KeyEvent {
    /// Tag value identifying the event kind in stored documents.
    pub const KEY_CREATED_TAG: &'static str = "key_created";
    /// Tag value identifying revocations in stored documents.
    pub const REVOCATION_TAG: &'static str = "revocation";
    /// Field carrying the tag.
    pub const TAG_FIELD: &'static str = "event";

    /// Encode as a stored document.
    pub fn to_document(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Tag of a stored document, if it has one.
    pub fn document_tag(document: &serde_json::Value) -> Option<&str> {
        document.get(Self::TAG_FIELD).and_then(serde_json::Value::as_str)
    }
}
