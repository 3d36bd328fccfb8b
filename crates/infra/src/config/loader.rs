//! Configuration loader
//!
//! Loads key management configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the storage directory variable is missing, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `RINGFENCE_STORAGE_DIR`: Key directory (required; selects file-system storage)
//! - `RINGFENCE_ALGORITHM`: `aes-128-gcm` or `aes-256-gcm`
//! - `RINGFENCE_AUTO_GENERATE_KEYS`: Whether keys are generated automatically (true/false)
//! - `RINGFENCE_KEY_LIFETIME_DAYS`: Lifetime of new keys in days
//! - `RINGFENCE_PASSPHRASE_ENV`: Name of the variable holding the at-rest passphrase
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./ringfence.toml` or `./ringfence.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../ringfence.toml` or `../ringfence.json` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::time::Duration;

use ringfence_domain::{
    AeadAlgorithm, AtRestConfig, Config, DataProtectionError, KeyManagementOptions, Result,
    StorageConfig, StorageKind,
};

use crate::errors::InfraError;

pub const ENV_STORAGE_DIR: &str = "RINGFENCE_STORAGE_DIR";
pub const ENV_ALGORITHM: &str = "RINGFENCE_ALGORITHM";
pub const ENV_AUTO_GENERATE_KEYS: &str = "RINGFENCE_AUTO_GENERATE_KEYS";
pub const ENV_KEY_LIFETIME_DAYS: &str = "RINGFENCE_KEY_LIFETIME_DAYS";
pub const ENV_PASSPHRASE_ENV: &str = "RINGFENCE_PASSPHRASE_ENV";

const FILE_STEMS: [&str; 2] = ["ringfence", "config"];
const FILE_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `DataProtectionError::Configuration` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded values fail validation
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `RINGFENCE_STORAGE_DIR` is required; everything else falls back to
/// the defaults of [`Config`].
///
/// # Errors
/// Returns `DataProtectionError::Configuration` if the required variable is
/// missing or a value is invalid.
pub fn load_from_env() -> Result<Config> {
    let directory = env_var(ENV_STORAGE_DIR)?;

    let algorithm = match std::env::var(ENV_ALGORITHM) {
        Ok(value) => value.parse::<AeadAlgorithm>()?,
        Err(_) => AeadAlgorithm::default(),
    };

    let mut key_management = KeyManagementOptions {
        auto_generate_keys: env_bool(ENV_AUTO_GENERATE_KEYS, true),
        ..KeyManagementOptions::default()
    };
    if let Ok(days) = std::env::var(ENV_KEY_LIFETIME_DAYS) {
        let days = days.trim().parse::<u64>().map_err(|e| {
            DataProtectionError::configuration(format!("Invalid key lifetime: {e}"))
        })?;
        key_management.new_key_lifetime = Duration::from_secs(days.saturating_mul(86_400));
    }

    let config = Config {
        key_management,
        algorithm,
        storage: StorageConfig {
            kind: StorageKind::FileSystem,
            directory: Some(PathBuf::from(directory)),
        },
        at_rest: AtRestConfig { passphrase_env: std::env::var(ENV_PASSPHRASE_ENV).ok() },
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DataProtectionError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or values fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DataProtectionError::configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DataProtectionError::configuration(
                "No config file found in any of the standard locations",
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        DataProtectionError::configuration(format!("Failed to read config file: {e}"))
    })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents).map_err(|e| {
            DataProtectionError::configuration(format!("Invalid JSON format: {e}"))
        }),
        _ => Err(DataProtectionError::configuration(format!(
            "Unsupported config format: {extension}"
        ))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    candidate_paths(&roots).into_iter().find(|path| path.exists())
}

fn candidate_paths(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `DataProtectionError::Configuration` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        DataProtectionError::configuration(format!("Missing required environment variable: {key}"))
    })
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
