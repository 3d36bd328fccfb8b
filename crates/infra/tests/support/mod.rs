//! Shared helpers for infra integration tests

#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ringfence_core::KeyEscrowSink;
use ringfence_domain::{Config, KeyDescriptor, KeyId, Result, StorageConfig, StorageKind};

/// Parse an RFC 3339 instant.
pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

pub fn memory_config() -> Config {
    Config::default()
}

pub fn file_config(directory: &Path) -> Config {
    Config {
        storage: StorageConfig {
            kind: StorageKind::FileSystem,
            directory: Some(directory.to_path_buf()),
        },
        ..Config::default()
    }
}

/// Escrow sink keeping every descriptor it receives.
#[derive(Default)]
pub struct RecordingEscrow {
    pub stored: Mutex<Vec<(KeyId, KeyDescriptor)>>,
}

impl KeyEscrowSink for RecordingEscrow {
    fn store(&self, key_id: KeyId, descriptor: &KeyDescriptor) -> Result<()> {
        self.stored.lock().push((key_id, descriptor.clone()));
        Ok(())
    }
}
