//! Thread-safe primitives shared between the tick loop and its observers.

use std::sync::atomic::{AtomicBool, Ordering};

/// A boolean gate that can be read and written from different threads.
///
/// Meant for a single writer and any number of readers. It does not order
/// other memory accesses and must not guard compound state.
#[derive(Debug, Default)]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(init: bool) -> Self {
        Self {
            value: AtomicBool::new(init),
        }
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }
}
