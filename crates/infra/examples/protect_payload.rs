//! Protect and unprotect a payload with a file-system key ring
//!
//! ```text
//! RINGFENCE_STORAGE_DIR=/tmp/ringfence-keys cargo run -p ringfence-infra --example protect_payload
//! ```
//!
//! Without `RINGFENCE_STORAGE_DIR` the loader falls back to a
//! `ringfence.toml` / `config.toml` next to the working directory.

use ringfence_core::KeyManager;
use ringfence_infra::observability::{init_tracing, LogFormat};
use ringfence_infra::DataProtectionBuilder;

fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env());

    let protection = DataProtectionBuilder::from_env()?.build()?;
    let protector = protection.create_protector("examples").create_protector("protect_payload");

    let protected = protector.protect(b"hello from ringfence")?;
    tracing::info!(bytes = protected.len(), "example.protected");

    let outcome = protector.dangerous_unprotect(&protected, false)?;
    tracing::info!(
        plaintext = %String::from_utf8_lossy(&outcome.plaintext),
        requires_migration = outcome.requires_migration,
        "example.unprotected"
    );

    for key in protection.key_catalog().get_all_keys()? {
        tracing::info!(
            key_id = %key.key_id(),
            activation = %key.activation_date(),
            expiration = %key.expiration_date(),
            revoked = key.is_revoked(),
            "example.key"
        );
    }
    Ok(())
}
