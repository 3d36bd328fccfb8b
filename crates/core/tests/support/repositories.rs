//! In-memory implementations of the repository-side ports

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex, RwLock};
use ringfence_core::{DescriptorProtector, KeyEscrowSink, KeyRepository};
use ringfence_domain::{DataProtectionError, KeyDescriptor, KeyId, Result};
use serde_json::Value;
use zeroize::Zeroizing;

/// Vec-backed `KeyRepository` with failure injection.
pub struct MemoryRepository {
    elements: RwLock<Vec<(String, Value)>>,
    deletable: bool,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(Vec::new()),
            deletable: true,
            fail_reads: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn without_deletion() -> Self {
        Self { deletable: false, ..Self::new() }
    }

    /// Append a raw document, bypassing the catalog.
    pub fn push(&self, element: Value) {
        self.elements.write().push(("raw".to_string(), element));
    }

    pub fn elements(&self) -> Vec<Value> {
        self.elements.read().iter().map(|(_, element)| element.clone()).collect()
    }

    pub fn friendly_names(&self) -> Vec<String> {
        self.elements.read().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl KeyRepository for MemoryRepository {
    fn get_all_elements(&self) -> Result<Vec<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DataProtectionError::storage("read", "backend unavailable"));
        }
        Ok(self.elements())
    }

    fn store_element(&self, element: Value, friendly_name: &str) -> Result<()> {
        self.elements.write().push((friendly_name.to_string(), element));
        Ok(())
    }

    fn supports_deletion(&self) -> bool {
        self.deletable
    }

    fn delete_elements(&self, selector: &mut dyn FnMut(&Value) -> bool) -> Result<usize> {
        let mut elements = self.elements.write();
        let before = elements.len();
        elements.retain(|(_, element)| !selector(element));
        Ok(before - elements.len())
    }
}

/// Reversible at-rest protector that counts unwraps.
pub struct XorProtector {
    id: String,
    mask: u8,
    unprotects: AtomicUsize,
}

impl XorProtector {
    pub fn new(id: &str, mask: u8) -> Self {
        Self { id: id.to_string(), mask, unprotects: AtomicUsize::new(0) }
    }

    pub fn unprotects(&self) -> usize {
        self.unprotects.load(Ordering::SeqCst)
    }
}

impl DescriptorProtector for XorProtector {
    fn id(&self) -> &str {
        &self.id
    }

    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.iter().map(|byte| byte ^ self.mask).collect())
    }

    fn unprotect(&self, protected: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.unprotects.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(protected.iter().map(|byte| byte ^ self.mask).collect()))
    }
}

/// Escrow sink remembering what it was given.
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

/// Gate that blocks callers while closed.
#[derive(Default)]
pub struct Gate {
    closed: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    pub fn open(&self) {
        *self.closed.lock() = false;
        self.opened.notify_all();
    }

    pub fn pass(&self) {
        let mut closed = self.closed.lock();
        while *closed {
            self.opened.wait(&mut closed);
        }
    }
}
