//! Key ring cache
//!
//! Resolving a key ring reads the whole key log, so the result is cached
//! until a jittered refresh deadline, the default key's expiration, or the
//! catalog's invalidation signal, whichever comes first.
//!
//! Refreshes run on a background thread. While one is in flight, callers
//! holding a stale ring keep using it; only callers with nothing usable
//! (cold start, forced refresh, a lapsed failure extension) wait for the
//! outcome. A failed refresh keeps the previous ring alive for
//! `refresh_failure_extension`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Condvar, Mutex};
use ringfence_common::time::{saturating_add, saturating_sub, scale_with_jitter};
use ringfence_common::{Clock, ErrorClassification, ErrorSeverity, SystemClock};
use ringfence_domain::{DataProtectionError, KeyManagementOptions, Result};
use tracing::{debug, error, info, warn};

use super::key::Key;
use super::key_ring::KeyRing;
use super::ports::{DefaultKeyPolicy, KeyManager, KeyRingProvider};
use super::signal::CancellationSignal;

const REFRESH_THREAD_NAME: &str = "ringfence-key-ring-refresh";

/// A resolved key ring with its validity bounds.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key_ring: Arc<KeyRing>,
    pub expiration_time: DateTime<Utc>,
    expiration_token: Arc<CancellationSignal>,
    extended: bool,
}

impl CacheEntry {
    /// Usable as-is: not past its deadline and not invalidated.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration_time && !self.expiration_token.is_fired()
    }

    /// Whether this entry is a stale ring kept alive after a failed refresh.
    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    fn with_temporary_extended_lifetime(&self, now: DateTime<Utc>, extension: TimeDelta) -> Self {
        Self {
            key_ring: Arc::clone(&self.key_ring),
            expiration_time: saturating_add(now, extension),
            expiration_token: Arc::new(CancellationSignal::new()),
            extended: true,
        }
    }
}

/// Outcome slot shared between the refresh thread and waiting callers.
#[derive(Default)]
struct RefreshTask {
    outcome: Mutex<Option<Result<Arc<KeyRing>>>>,
    done: Condvar,
}

impl RefreshTask {
    fn complete(&self, outcome: Result<Arc<KeyRing>>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Arc<KeyRing>> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut outcome);
        }
    }
}

struct CacheInner {
    key_manager: Arc<dyn KeyManager>,
    policy: Arc<dyn DefaultKeyPolicy>,
    options: KeyManagementOptions,
    clock: Arc<dyn Clock>,
    current: ArcSwapOption<CacheEntry>,
    in_flight: Mutex<Option<Arc<RefreshTask>>>,
    auto_refresh_window_end: DateTime<Utc>,
}

/// Caching [`KeyRingProvider`] over a [`KeyManager`] and a
/// [`DefaultKeyPolicy`].
#[derive(Clone)]
pub struct KeyRingCache {
    inner: Arc<CacheInner>,
}

impl KeyRingCache {
    /// Create a cache on the system clock.
    pub fn new(
        key_manager: Arc<dyn KeyManager>,
        policy: Arc<dyn DefaultKeyPolicy>,
        options: KeyManagementOptions,
    ) -> Self {
        Self::with_clock(key_manager, policy, options, Arc::new(SystemClock))
    }

    /// Create a cache driven by `clock`. The auto-refresh window starts now.
    pub fn with_clock(
        key_manager: Arc<dyn KeyManager>,
        policy: Arc<dyn DefaultKeyPolicy>,
        options: KeyManagementOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auto_refresh_window_end =
            saturating_add(clock.now(), options.unprotect_refresh_window_delta());
        Self {
            inner: Arc::new(CacheInner {
                key_manager,
                policy,
                options,
                clock,
                current: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
                auto_refresh_window_end,
            }),
        }
    }

    /// Current key ring, refreshing it when stale.
    pub fn get_current_key_ring(&self) -> Result<Arc<KeyRing>> {
        self.get_current_key_ring_at(self.inner.clock.now(), false)
    }

    /// Key ring as of `now`. With `force_refresh` the cached entry is
    /// ignored and the caller waits for a fresh resolution.
    pub fn get_current_key_ring_at(
        &self,
        now: DateTime<Utc>,
        force_refresh: bool,
    ) -> Result<Arc<KeyRing>> {
        if !force_refresh {
            if let Some(entry) = self.inner.current.load_full() {
                if entry.is_valid(now) {
                    return Ok(Arc::clone(&entry.key_ring));
                }
            }
        }

        let (task, stale) = {
            let mut in_flight = self.inner.in_flight.lock();
            let existing = self.inner.current.load_full();

            // Another caller may have published while we waited for the lock.
            if let Some(entry) = existing.as_ref().filter(|entry| entry.is_valid(now)) {
                if !force_refresh {
                    return Ok(Arc::clone(&entry.key_ring));
                }
            }

            let task = match in_flight.as_ref() {
                Some(task) => Arc::clone(task),
                None => {
                    let task = Arc::new(RefreshTask::default());
                    self.spawn_refresh(Arc::clone(&task), now)?;
                    *in_flight = Some(Arc::clone(&task));
                    task
                }
            };
            (task, existing)
        };

        match stale {
            Some(entry) if !force_refresh && !entry.is_extended() => {
                debug!("Serving stale key ring while a refresh is in flight");
                Ok(Arc::clone(&entry.key_ring))
            }
            _ => task.wait(),
        }
    }

    /// Resolve a cache entry for `now` directly, without consulting or
    /// updating the cache.
    pub fn resolve_cache_entry(&self, now: DateTime<Utc>) -> Result<CacheEntry> {
        self.inner.resolve_key_ring(now, None)
    }

    /// End of the start-up window during which an unknown key id forces a
    /// refresh.
    pub fn auto_refresh_window_end(&self) -> DateTime<Utc> {
        self.inner.auto_refresh_window_end
    }

    /// Currently published entry, valid or not.
    pub fn cached_entry(&self) -> Option<Arc<CacheEntry>> {
        self.inner.current.load_full()
    }

    fn spawn_refresh(&self, task: Arc<RefreshTask>, now: DateTime<Utc>) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name(REFRESH_THREAD_NAME.to_string())
            .spawn(move || inner.run_refresh(&task, now))
            .map(|_| ())
            .map_err(|err| DataProtectionError::Internal {
                message: format!("failed to start key ring refresh: {err}"),
            })
    }
}

impl KeyRingProvider for KeyRingCache {
    fn current_key_ring(&self) -> Result<Arc<KeyRing>> {
        self.get_current_key_ring()
    }

    fn refresh_current_key_ring(&self) -> Result<Arc<KeyRing>> {
        self.get_current_key_ring_at(self.inner.clock.now(), true)
    }

    fn in_auto_refresh_window(&self) -> bool {
        self.inner.clock.now() < self.inner.auto_refresh_window_end
    }
}

impl CacheInner {
    /// Body of the refresh thread: resolve, publish, then wake waiters.
    fn run_refresh(&self, task: &Arc<RefreshTask>, now: DateTime<Utc>) {
        let resolved = panic::catch_unwind(AssertUnwindSafe(|| self.resolve_key_ring(now, None)))
            .unwrap_or_else(|_| {
                Err(DataProtectionError::Internal { message: "key ring refresh panicked".into() })
            })
            .map_err(|err| {
                if err.is_integrity_failure() || matches!(err, DataProtectionError::Internal { .. }) {
                    err
                } else {
                    DataProtectionError::refresh_failed(err.to_string())
                }
            });

        let outcome = {
            let mut in_flight = self.in_flight.lock();
            let outcome = match resolved {
                Ok(entry) => {
                    let key_ring = Arc::clone(&entry.key_ring);
                    self.current.store(Some(Arc::new(entry)));
                    Ok(key_ring)
                }
                Err(err) => {
                    log_refresh_failure(&err);
                    if let Some(previous) = self.current.load_full() {
                        let extension = self.options.refresh_failure_extension_delta();
                        warn!(%extension, "Extending lifetime of the previous key ring");
                        self.current.store(Some(Arc::new(
                            previous.with_temporary_extended_lifetime(now, extension),
                        )));
                    }
                    Err(err)
                }
            };
            if in_flight.as_ref().is_some_and(|current| Arc::ptr_eq(current, task)) {
                *in_flight = None;
            }
            outcome
        };

        task.complete(outcome);
    }

    /// Read every key, choose a default and build a cache entry, generating
    /// a key first when policy asks for one.
    fn resolve_key_ring(
        &self,
        now: DateTime<Utc>,
        key_just_added: Option<Arc<Key>>,
    ) -> Result<CacheEntry> {
        // Taken before reading so that a mutation racing the read fires it.
        let expiration_token = self.key_manager.cache_expiration_token();
        let all_keys = self.key_manager.get_all_keys()?;
        let resolution = self.policy.resolve_default_key_policy(now, &all_keys);

        if let Some(just_added) = key_just_added {
            // Never generate twice in one resolution.
            let chosen = resolution
                .default_key
                .or(resolution.fallback_key)
                .unwrap_or_else(|| Arc::clone(&just_added));
            return self.create_cache_entry(
                now,
                &chosen,
                &all_keys,
                expiration_token,
                Some(&just_added),
            );
        }

        let default_key = resolution.default_key.clone();
        let should_generate = match &default_key {
            None => true,
            Some(_) if resolution.should_generate_new_key => true,
            Some(default_key) => self.needs_successor(now, default_key, &all_keys),
        };

        if !should_generate {
            if let Some(default_key) = default_key {
                return self.create_cache_entry(
                    now,
                    &default_key,
                    &all_keys,
                    expiration_token,
                    None,
                );
            }
        }

        if !self.options.auto_generate_keys {
            let Some(usable) = default_key.or(resolution.fallback_key) else {
                error!("No usable default key and automatic key generation is disabled");
                return Err(DataProtectionError::NoUsableDefaultKey);
            };
            warn!(
                key_id = %usable.key_id(),
                expiration_date = %usable.expiration_date(),
                "A new key is needed but automatic key generation is disabled; using existing key"
            );
            return self.create_cache_entry(now, &usable, &all_keys, expiration_token, None);
        }

        let activation_date = default_key.as_ref().map_or(now, |key| key.expiration_date());
        let expiration_date = saturating_add(now, self.options.new_key_lifetime_delta());
        info!(%activation_date, %expiration_date, "Generating a new key");
        let new_key = self.key_manager.create_new_key(activation_date, expiration_date)?;

        self.resolve_key_ring(now, Some(new_key))
    }

    /// A default key close to expiry needs a successor unless one already
    /// exists that will itself outlive the lookahead.
    fn needs_successor(&self, now: DateTime<Utc>, default_key: &Key, all_keys: &[Arc<Key>]) -> bool {
        let lookahead = saturating_add(
            saturating_add(now, self.options.key_ring_refresh_period_delta()),
            self.options.key_propagation_window_delta(),
        );
        if default_key.expiration_date() > lookahead {
            return false;
        }

        let successor =
            self.policy.resolve_default_key_policy(default_key.expiration_date(), all_keys);
        successor.default_key.map_or(true, |successor| successor.expiration_date() <= lookahead)
    }

    fn create_cache_entry(
        &self,
        now: DateTime<Utc>,
        default_key: &Arc<Key>,
        all_keys: &[Arc<Key>],
        expiration_token: Arc<CancellationSignal>,
        key_just_added: Option<&Arc<Key>>,
    ) -> Result<CacheEntry> {
        if default_key.is_revoked() {
            return Err(DataProtectionError::invalid_key_ring(format!(
                "default key {} is revoked",
                default_key.key_id()
            )));
        }
        if default_key.create_encryptor().is_none() {
            return Err(DataProtectionError::invalid_key_ring(format!(
                "default key {} cannot encrypt",
                default_key.key_id()
            )));
        }

        let propagation_cutoff = saturating_sub(now, self.options.key_propagation_window_delta());
        let unpropagated = default_key.creation_date() > propagation_cutoff;
        let just_added =
            key_just_added.is_some_and(|added| added.key_id() == default_key.key_id());
        let period = if unpropagated || just_added {
            self.options.short_key_ring_refresh_period
        } else {
            self.options.key_ring_refresh_period
        };
        let jittered = scale_with_jitter(period, self.options.refresh_jitter_floor);
        let next_refresh =
            saturating_add(now, TimeDelta::from_std(jittered).unwrap_or(TimeDelta::MAX));

        let expiration_time = if default_key.expiration_date() <= now {
            next_refresh
        } else {
            default_key.expiration_date().min(next_refresh)
        };

        debug!(
            default_key_id = %default_key.key_id(),
            keys = all_keys.len(),
            %expiration_time,
            "Resolved key ring"
        );
        Ok(CacheEntry {
            key_ring: Arc::new(KeyRing::new(default_key, all_keys)),
            expiration_time,
            expiration_token,
            extended: false,
        })
    }
}

fn log_refresh_failure(err: &DataProtectionError) {
    match err.severity() {
        ErrorSeverity::Critical | ErrorSeverity::Error => {
            error!(error = %err, "Key ring refresh failed");
        }
        ErrorSeverity::Warning | ErrorSeverity::Info => {
            warn!(error = %err, "Key ring refresh failed");
        }
    }
}
