//! Composition root
//!
//! Turns a [`Config`] into a ready [`DataProtectionProvider`]: repository,
//! at-rest protection, algorithm, key catalog, default key resolver and key
//! ring cache, wired in that order.

use std::sync::Arc;

use ringfence_common::{Clock, SystemClock};
use ringfence_core::{
    DataProtectionProvider, DefaultKeyResolver, DescriptorProtector, EncryptorFactories,
    EncryptorFactory, KeyCatalog, KeyEscrowSink, KeyRepository, KeyRingCache, Protector,
};
use ringfence_domain::{Config, DataProtectionError, Result, StorageKind};
use tracing::{info, warn};

use crate::adapters::{
    AesGcmAlgorithmConfiguration, AesGcmEncryptorFactory, PassphraseDescriptorProtector,
};
use crate::config;
use crate::repositories::{FileSystemKeyRepository, InMemoryKeyRepository};

/// A wired key ring: the catalog for key administration, the cache and the
/// provider handing out protectors.
#[derive(Clone)]
pub struct DataProtection {
    catalog: Arc<KeyCatalog>,
    cache: KeyRingCache,
    provider: DataProtectionProvider,
}

impl DataProtection {
    pub fn provider(&self) -> &DataProtectionProvider {
        &self.provider
    }

    pub fn create_protector(&self, purpose: impl Into<String>) -> Protector {
        self.provider.create_protector(purpose)
    }

    /// Key administration: create, revoke and delete keys.
    pub fn key_catalog(&self) -> &Arc<KeyCatalog> {
        &self.catalog
    }

    pub fn key_ring_cache(&self) -> &KeyRingCache {
        &self.cache
    }
}

impl std::fmt::Debug for DataProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProtection").finish_non_exhaustive()
    }
}

/// Builder for [`DataProtection`].
///
/// Anything not supplied explicitly is derived from the [`Config`].
pub struct DataProtectionBuilder {
    config: Config,
    repository: Option<Arc<dyn KeyRepository>>,
    at_rest_protector: Option<Arc<dyn DescriptorProtector>>,
    unprotectors: Vec<Arc<dyn DescriptorProtector>>,
    escrow: Option<Arc<dyn KeyEscrowSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl DataProtectionBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            repository: None,
            at_rest_protector: None,
            unprotectors: Vec::new(),
            escrow: None,
            clock: None,
        }
    }

    /// Builder over the configuration found by [`config::load`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(config::load()?))
    }

    /// Use `repository` instead of the configured storage.
    pub fn with_repository(mut self, repository: Arc<dyn KeyRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Use `protector` instead of the configured passphrase.
    pub fn with_at_rest_protector(mut self, protector: Arc<dyn DescriptorProtector>) -> Self {
        self.at_rest_protector = Some(protector);
        self
    }

    /// Accept descriptors wrapped by `unprotector`, e.g. a retired protector.
    pub fn with_unprotector(mut self, unprotector: Arc<dyn DescriptorProtector>) -> Self {
        self.unprotectors.push(unprotector);
        self
    }

    pub fn with_escrow(mut self, escrow: Arc<dyn KeyEscrowSink>) -> Self {
        self.escrow = Some(escrow);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<DataProtection> {
        self.config.validate()?;

        let repository = match self.repository {
            Some(repository) => repository,
            None => open_repository(&self.config)?,
        };
        let at_rest_protector = match self.at_rest_protector {
            Some(protector) => Some(protector),
            None => configured_protector(&self.config)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let factory: Arc<dyn EncryptorFactory> = Arc::new(AesGcmEncryptorFactory::new());
        let factories: EncryptorFactories = vec![factory].into();
        let algorithm = Arc::new(AesGcmAlgorithmConfiguration::new(self.config.algorithm));

        let mut catalog =
            KeyCatalog::new(repository, algorithm, factories).with_clock(Arc::clone(&clock));
        for unprotector in self.unprotectors {
            catalog = catalog.with_unprotector(unprotector);
        }
        if let Some(protector) = at_rest_protector.clone() {
            catalog = catalog.with_at_rest_protector(protector);
        }
        if let Some(escrow) = self.escrow {
            catalog = catalog.with_escrow(escrow);
        }
        let catalog = Arc::new(catalog);

        let options = self.config.key_management.clone();
        let resolver = Arc::new(DefaultKeyResolver::new(&options));
        let cache = KeyRingCache::with_clock(catalog.clone(), resolver, options, clock);
        let provider = DataProtectionProvider::new(Arc::new(cache.clone()));

        info!(
            storage = ?self.config.storage.kind,
            algorithm = %self.config.algorithm,
            protected_at_rest = at_rest_protector.is_some(),
            "data_protection.bootstrapped"
        );

        Ok(DataProtection { catalog, cache, provider })
    }
}

fn open_repository(config: &Config) -> Result<Arc<dyn KeyRepository>> {
    match config.storage.kind {
        StorageKind::Memory => {
            warn!("Keys are held in memory only; protected payloads will not survive a restart");
            Ok(Arc::new(InMemoryKeyRepository::new()))
        }
        StorageKind::FileSystem => {
            let directory = config.storage.directory.clone().ok_or_else(|| {
                DataProtectionError::configuration("file_system storage requires storage.directory")
            })?;
            Ok(Arc::new(FileSystemKeyRepository::new(directory)?))
        }
    }
}

fn configured_protector(config: &Config) -> Result<Option<Arc<dyn DescriptorProtector>>> {
    match &config.at_rest.passphrase_env {
        Some(variable) => {
            let protector = PassphraseDescriptorProtector::from_env(variable)?;
            Ok(Some(Arc::new(protector)))
        }
        None => Ok(None),
    }
}
