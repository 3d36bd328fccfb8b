//! Key management configuration
//!
//! Durations are stored as `std::time::Duration` and serialized as
//! milliseconds; the key ring works in `chrono` time, so each duration has a
//! `TimeDelta` accessor.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use ringfence_common::duration_millis;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_KEY_PROPAGATION_WINDOW_HOURS, DEFAULT_KEY_RING_REFRESH_PERIOD_HOURS,
    DEFAULT_MAX_SERVER_CLOCK_SKEW_MINUTES, DEFAULT_NEW_KEY_LIFETIME_DAYS,
    DEFAULT_REFRESH_FAILURE_EXTENSION_MINUTES, DEFAULT_REFRESH_JITTER_FLOOR,
    DEFAULT_SHORT_KEY_RING_REFRESH_PERIOD_MINUTES, DEFAULT_UNPROTECT_REFRESH_WINDOW_MINUTES,
    MIN_NEW_KEY_LIFETIME_DAYS,
};
use crate::errors::{DataProtectionError, Result};
use crate::types::AeadAlgorithm;

const fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

const fn hours(n: u64) -> Duration {
    Duration::from_secs(n * 60 * 60)
}

const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Policy knobs for key rotation and key ring caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyManagementOptions {
    /// Lifetime of newly generated keys, measured from creation.
    #[serde(with = "duration_millis")]
    pub new_key_lifetime: Duration,

    /// Generate keys automatically when no usable default exists.
    pub auto_generate_keys: bool,

    /// Time assumed for a new key to reach every instance.
    #[serde(with = "duration_millis")]
    pub key_propagation_window: Duration,

    /// Tolerated clock disagreement between instances.
    #[serde(with = "duration_millis")]
    pub max_server_clock_skew: Duration,

    /// Upper bound on how long a resolved key ring is cached.
    #[serde(with = "duration_millis")]
    pub key_ring_refresh_period: Duration,

    /// Refresh period used while the default key may not have propagated.
    #[serde(with = "duration_millis")]
    pub short_key_ring_refresh_period: Duration,

    /// Grace period granted to a stale key ring after a failed refresh.
    #[serde(with = "duration_millis")]
    pub refresh_failure_extension: Duration,

    /// Window after start-up during which unknown key ids force a refresh.
    #[serde(with = "duration_millis")]
    pub unprotect_refresh_window: Duration,

    /// Lower bound of the refresh jitter factor, in `[0.0, 1.0]`.
    pub refresh_jitter_floor: f64,
}

impl Default for KeyManagementOptions {
    fn default() -> Self {
        Self {
            new_key_lifetime: days(DEFAULT_NEW_KEY_LIFETIME_DAYS),
            auto_generate_keys: true,
            key_propagation_window: hours(DEFAULT_KEY_PROPAGATION_WINDOW_HOURS),
            max_server_clock_skew: minutes(DEFAULT_MAX_SERVER_CLOCK_SKEW_MINUTES),
            key_ring_refresh_period: hours(DEFAULT_KEY_RING_REFRESH_PERIOD_HOURS),
            short_key_ring_refresh_period: minutes(DEFAULT_SHORT_KEY_RING_REFRESH_PERIOD_MINUTES),
            refresh_failure_extension: minutes(DEFAULT_REFRESH_FAILURE_EXTENSION_MINUTES),
            unprotect_refresh_window: minutes(DEFAULT_UNPROTECT_REFRESH_WINDOW_MINUTES),
            refresh_jitter_floor: DEFAULT_REFRESH_JITTER_FLOOR,
        }
    }
}

impl KeyManagementOptions {
    /// Reject values the key ring cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.new_key_lifetime < days(MIN_NEW_KEY_LIFETIME_DAYS) {
            return Err(DataProtectionError::configuration(format!(
                "new_key_lifetime must be at least {MIN_NEW_KEY_LIFETIME_DAYS} days"
            )));
        }
        if self.key_ring_refresh_period.is_zero() || self.short_key_ring_refresh_period.is_zero() {
            return Err(DataProtectionError::configuration("refresh periods must be positive"));
        }
        if self.short_key_ring_refresh_period > self.key_ring_refresh_period {
            return Err(DataProtectionError::configuration(
                "short_key_ring_refresh_period cannot exceed key_ring_refresh_period",
            ));
        }
        if !(0.0..=1.0).contains(&self.refresh_jitter_floor) {
            return Err(DataProtectionError::configuration(
                "refresh_jitter_floor must be within [0.0, 1.0]",
            ));
        }
        Ok(())
    }

    pub fn new_key_lifetime_delta(&self) -> TimeDelta {
        to_delta(self.new_key_lifetime)
    }

    pub fn key_propagation_window_delta(&self) -> TimeDelta {
        to_delta(self.key_propagation_window)
    }

    pub fn max_server_clock_skew_delta(&self) -> TimeDelta {
        to_delta(self.max_server_clock_skew)
    }

    pub fn key_ring_refresh_period_delta(&self) -> TimeDelta {
        to_delta(self.key_ring_refresh_period)
    }

    pub fn refresh_failure_extension_delta(&self) -> TimeDelta {
        to_delta(self.refresh_failure_extension)
    }

    pub fn unprotect_refresh_window_delta(&self) -> TimeDelta {
        to_delta(self.unprotect_refresh_window)
    }
}

/// Which key repository backs the key ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Ephemeral, process-local keys.
    #[default]
    Memory,
    /// One JSON document per key event in a directory.
    FileSystem,
}

/// Key repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub directory: Option<PathBuf>,
}

/// At-rest protection of stored key descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtRestConfig {
    /// Name of the environment variable holding the wrapping passphrase.
    /// Descriptors are stored unwrapped when unset.
    pub passphrase_env: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key_management: KeyManagementOptions,
    pub algorithm: AeadAlgorithm,
    pub storage: StorageConfig,
    pub at_rest: AtRestConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.key_management.validate()?;
        if self.storage.kind == StorageKind::FileSystem && self.storage.directory.is_none() {
            return Err(DataProtectionError::configuration(
                "file_system storage requires storage.directory",
            ));
        }
        Ok(())
    }
}
