//! Process-local key repository
//!
//! Keys stored here die with the process; payloads protected under them
//! cannot be read after a restart.

use parking_lot::RwLock;
use ringfence_core::KeyRepository;
use ringfence_domain::Result;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    elements: RwLock<Vec<Value>>,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }
}

impl KeyRepository for InMemoryKeyRepository {
    fn get_all_elements(&self) -> Result<Vec<Value>> {
        Ok(self.elements.read().clone())
    }

    fn store_element(&self, element: Value, friendly_name: &str) -> Result<()> {
        debug!(name = friendly_name, "key_repository.memory.stored");
        self.elements.write().push(element);
        Ok(())
    }

    fn supports_deletion(&self) -> bool {
        true
    }

    fn delete_elements(&self, selector: &mut dyn FnMut(&Value) -> bool) -> Result<usize> {
        let mut elements = self.elements.write();
        let before = elements.len();
        elements.retain(|element| !selector(element));
        Ok(before - elements.len())
    }
}
