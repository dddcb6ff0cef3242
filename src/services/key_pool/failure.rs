//! Consecutive failure tracking
//!
//! A key becomes unhealthy after `max_failures` consecutive failures and is
//! fully restored by a single success.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-key consecutive failure counter
#[derive(Debug)]
pub struct FailureTracker {
    max_failures: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl FailureTracker {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Record a failure and return the new consecutive count
    pub fn mark_failed(&self, key: &str) -> u32 {
        let mut failures = self.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Reset the failure count for `key`
    /// Reset the failure count, returning the count before the reset
    pub fn mark_success(&self, key: &str) -> u32 {
        self.lock().insert(key.to_string(), 0).unwrap_or(0)
    }

    pub fn is_healthy(&self, key: &str) -> bool {
        self.get_failure_count(key) < self.max_failures
    }

    pub fn get_failure_count(&self, key: &str) -> u32 {
        self.lock().get(key).copied().unwrap_or(0)
    }

    /// Clear every key's failure count
    pub fn reset_all(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
