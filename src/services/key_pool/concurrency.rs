//! In-flight usage tracking
//!
//! Bounds how many operations may use the same key at once.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-key count of in-flight uses, bounded by `max_per_key`
#[derive(Debug)]
pub struct ConcurrencyTracker {
    max_per_key: u32,
    active: Mutex<HashMap<String, u32>>,
}

impl ConcurrencyTracker {
    pub fn new(max_per_key: u32) -> Self {
        Self {
            max_per_key,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_per_key(&self) -> u32 {
        self.max_per_key
    }

    /// Try to take a slot for `key`
    ///
    /// Returns `false` without changing anything when the key is at its bound.
    pub fn acquire(&self, key: &str) -> bool {
        let mut active = self.lock();
        let current = active.get(key).copied().unwrap_or(0);
        if current >= self.max_per_key {
            return false;
        }
        active.insert(key.to_string(), current + 1);
        true
    }

    /// Give back a slot for `key`; releasing an idle key is a no-op
    pub fn release(&self, key: &str) {
        let mut active = self.lock();
        if let Some(current) = active.get_mut(key) {
            *current = current.saturating_sub(1);
        }
    }

    /// Whether a slot is currently free for `key`
    pub fn can_acquire(&self, key: &str) -> bool {
        self.get_active(key) < self.max_per_key
    }

    /// Number of in-flight uses of `key`
    pub fn get_active(&self, key: &str) -> u32 {
        self.lock().get(key).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
