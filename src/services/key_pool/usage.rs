//! Daily usage tracking
//!
//! Counts how many times each key was used today. Counts are cleared lazily:
//! every accessor first checks whether the calendar day has changed since
//! the last reset, under the same lock as the access itself.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct UsageState {
    usage: HashMap<String, u32>,
    last_reset: DateTime<Local>,
}

impl UsageState {
    /// Clear all counts if `now` falls on a later day than the last reset
    fn check_daily_reset(&mut self) {
        let now = Local::now();
        if now.date_naive() > self.last_reset.date_naive() {
            self.usage.clear();
            self.last_reset = now;
        }
    }
}

/// Per-key usage counter with a daily limit
#[derive(Debug)]
pub struct KeyUsageTracker {
    daily_limit: u32,
    state: Mutex<UsageState>,
}

impl KeyUsageTracker {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            state: Mutex::new(UsageState {
                usage: HashMap::new(),
                last_reset: Local::now(),
            }),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Increment today's usage count for `key`
    pub fn increment(&self, key: &str) {
        let mut state = self.lock();
        *state.usage.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Today's usage count for `key` (0 if never used)
    pub fn get_usage(&self, key: &str) -> u32 {
        self.lock().usage.get(key).copied().unwrap_or(0)
    }

    /// Whether `key` is still under its daily limit
    pub fn is_available(&self, key: &str) -> bool {
        self.get_usage(key) < self.daily_limit
    }

    /// Keys still under the daily limit, in input order
    pub fn get_available_keys<'a>(&self, keys: &[&'a str]) -> Vec<&'a str> {
        keys.iter().copied().filter(|k| self.is_available(k)).collect()
    }

    /// Remaining uses for `key` today
    pub fn get_remaining(&self, key: &str) -> u32 {
        self.daily_limit.saturating_sub(self.get_usage(key))
    }

    /// Timestamp of the last daily reset
    pub fn last_reset(&self) -> DateTime<Local> {
        self.lock().last_reset
    }

    /// Override the last reset timestamp
    ///
    /// The next access compares against this value, so setting it to a past
    /// day forces a reset. Used by administration tooling and tests.
    pub fn set_last_reset(&self, at: DateTime<Local>) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_reset = at;
    }

    /// Lock the state, applying the daily rollover first
    fn lock(&self) -> MutexGuard<'_, UsageState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.check_daily_reset();
        state
    }
}
