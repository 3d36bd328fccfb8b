//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events; binaries and
//! tests call [`init_tracing`] once to print them.
//!
//! - `RUST_LOG` overrides the default filter (`info` for the workspace
//!   crates, `warn` otherwise)
//! - `RINGFENCE_LOG_FORMAT=json` switches to one JSON object per line

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "RINGFENCE_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str =
    "warn,ringfence_core=info,ringfence_infra=info,ringfence_common=info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read the format from `RINGFENCE_LOG_FORMAT`.
    pub fn from_env() -> Self {
        match std::env::var(ENV_LOG_FORMAT) {
            Ok(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which is not an
/// error: tests and embedding applications may get there first.
pub fn init_tracing(format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed.is_ok()
}
