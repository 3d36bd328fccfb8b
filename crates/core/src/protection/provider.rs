//! Entry point handing out protectors

use std::sync::Arc;

use super::protector::Protector;
use crate::key_management::ports::KeyRingProvider;

/// Root of every purpose chain.
#[derive(Clone)]
pub struct DataProtectionProvider {
    key_ring_provider: Arc<dyn KeyRingProvider>,
}

impl DataProtectionProvider {
    pub fn new(key_ring_provider: Arc<dyn KeyRingProvider>) -> Self {
        Self { key_ring_provider }
    }

    /// Protector whose chain is the single `purpose`.
    pub fn create_protector(&self, purpose: impl Into<String>) -> Protector {
        Protector::new(Arc::clone(&self.key_ring_provider), vec![purpose.into()])
    }

    /// Protector for a whole purpose chain at once.
    pub fn create_protector_for<I, S>(&self, purposes: I) -> Protector
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Protector::new(
            Arc::clone(&self.key_ring_provider),
            purposes.into_iter().map(Into::into).collect(),
        )
    }
}

impl std::fmt::Debug for DataProtectionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProtectionProvider").finish_non_exhaustive()
    }
}
