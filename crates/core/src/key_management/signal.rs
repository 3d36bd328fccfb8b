//! One-shot invalidation signal

use std::sync::atomic::{AtomicBool, Ordering};

/// Fires at most once; observers poll [`is_fired`](Self::is_fired).
///
/// The catalog hands one out per generation of the key set and fires it on
/// the next mutation, which is how cached key rings learn they are stale.
#[derive(Debug, Default)]
pub struct CancellationSignal {
    fired: AtomicBool,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
