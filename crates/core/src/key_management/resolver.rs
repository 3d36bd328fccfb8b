//! Default key selection
//!
//! Given the full key set and a point in time, pick the key new payloads
//! should be protected with. The choice tolerates clock skew between
//! instances and prefers keys every instance has had time to see.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use ringfence_common::time::{saturating_add, saturating_sub};
use ringfence_domain::KeyManagementOptions;
use tracing::{debug, warn};

use super::key::Key;
use super::ports::DefaultKeyPolicy;

/// Outcome of default key resolution.
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyResolution {
    /// Key to protect with, if one qualifies.
    pub default_key: Option<Arc<Key>>,

    /// Best usable key when no default qualifies. Only set when
    /// `default_key` is `None`.
    pub fallback_key: Option<Arc<Key>>,

    /// Whether the caller should generate a key.
    pub should_generate_new_key: bool,
}

/// Stock [`DefaultKeyPolicy`].
#[derive(Debug, Clone)]
pub struct DefaultKeyResolver {
    key_propagation_window: TimeDelta,
    max_server_clock_skew: TimeDelta,
}

impl DefaultKeyResolver {
    pub fn new(options: &KeyManagementOptions) -> Self {
        Self {
            key_propagation_window: options.key_propagation_window_delta(),
            max_server_clock_skew: options.max_server_clock_skew_delta(),
        }
    }

    fn find_default_key(&self, now: DateTime<Utc>, keys: &[Arc<Key>]) -> Option<Arc<Key>> {
        let propagation_cutoff = saturating_sub(now, self.key_propagation_window);
        let activation_horizon = saturating_add(now, self.max_server_clock_skew);
        let activated = keys
            .iter()
            .filter(|key| key.activation_date() <= activation_horizon);

        // Latest activation among propagated keys, else earliest activation
        // among keys still propagating.
        let preferred = activated
            .clone()
            .filter(|key| key.creation_date() <= propagation_cutoff)
            .min_by_key(|key| (Reverse(key.activation_date()), key.key_id()))
            .or_else(|| {
                activated
                    .filter(|key| key.creation_date() > propagation_cutoff)
                    .min_by_key(|key| (key.activation_date(), key.key_id()))
            })?;

        if preferred.is_revoked() {
            debug!(key_id = %preferred.key_id(), "Preferred default key is revoked");
            return None;
        }
        if preferred.is_expired(now) {
            debug!(key_id = %preferred.key_id(), "Preferred default key has expired");
            return None;
        }
        if preferred.create_encryptor().is_none() {
            warn!(key_id = %preferred.key_id(), "Preferred default key cannot encrypt");
            return None;
        }

        Some(Arc::clone(preferred))
    }

    /// Newest propagated key, else oldest unpropagated key, that is neither
    /// revoked nor unable to encrypt. Expiry and activation are ignored.
    fn find_fallback_key(&self, now: DateTime<Utc>, keys: &[Arc<Key>]) -> Option<Arc<Key>> {
        let propagation_cutoff = saturating_sub(now, self.key_propagation_window);

        let mut propagated: Vec<&Arc<Key>> =
            keys.iter().filter(|key| key.creation_date() <= propagation_cutoff).collect();
        propagated.sort_by_key(|key| (Reverse(key.creation_date()), key.key_id()));

        let mut propagating: Vec<&Arc<Key>> =
            keys.iter().filter(|key| key.creation_date() > propagation_cutoff).collect();
        propagating.sort_by_key(|key| (key.creation_date(), key.key_id()));

        propagated
            .into_iter()
            .chain(propagating)
            .find(|key| !key.is_revoked() && key.create_encryptor().is_some())
            .cloned()
    }
}

impl DefaultKeyPolicy for DefaultKeyResolver {
    fn resolve_default_key_policy(
        &self,
        now: DateTime<Utc>,
        keys: &[Arc<Key>],
    ) -> DefaultKeyResolution {
        if let Some(default_key) = self.find_default_key(now, keys) {
            debug!(key_id = %default_key.key_id(), "Resolved default key");
            return DefaultKeyResolution {
                default_key: Some(default_key),
                fallback_key: None,
                should_generate_new_key: false,
            };
        }

        let fallback_key = self.find_fallback_key(now, keys);
        debug!(
            fallback_key_id = ?fallback_key.as_ref().map(|key| key.key_id()),
            "No default key qualifies; a new key should be generated"
        );
        DefaultKeyResolution { default_key: None, fallback_key, should_generate_new_key: true }
    }
}
