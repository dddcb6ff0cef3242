//! API Key Pool Implementation
//!
//! This module provides `ApiKeyPool`, which combines the usage, concurrency
//! and failure trackers with a rotation strategy, and runs operations with
//! automatic failover to other keys.

use super::concurrency::ConcurrencyTracker;
use super::failure::FailureTracker;
use super::key::ApiKeyInfo;
use super::operation::KeyOperation;
use super::strategy::{self, RotationStrategy, RoundRobinCursor};
use super::usage::KeyUsageTracker;
use crate::error::PoolError;
use crate::utils::{truncate_with_suffix, BackoffConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;

/// Maximum error message length kept in failure logs
const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Callback invoked with the raw key after a successful operation
pub type OnSuccess<'a> = dyn Fn(&str) + Send + Sync + 'a;

// ============================================================================
// Pool Configuration
// ============================================================================

/// Configuration for key pool behavior
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Key rotation strategy
    pub strategy: RotationStrategy,
    /// Successful uses allowed per key per calendar day
    pub daily_limit: u32,
    /// Simultaneous in-flight uses allowed per key
    pub max_concurrent_per_key: u32,
    /// Consecutive failures before a key is considered unhealthy
    pub max_failures_per_key: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::RoundRobin,
            daily_limit: 10,
            max_concurrent_per_key: 2,
            max_failures_per_key: 3,
        }
    }
}

impl PoolConfig {
    pub fn new(strategy: RotationStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent_per_key = max;
        self
    }

    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_failures_per_key = max;
        self
    }
}

// ============================================================================
// API Key Pool
// ============================================================================

/// A pool of API keys with rotation, daily quotas, concurrency limits and
/// failure tracking
///
/// Bookkeeping is synchronous and cheap; each tracker and the round-robin
/// cursor sit behind their own lock, so one pool can be shared (e.g. in an
/// `Arc`) between many tasks and threads.
#[derive(Debug)]
pub struct ApiKeyPool {
    /// Keys in configured order
    keys: Vec<ApiKeyInfo>,
    /// Raw key value -> position in `keys` (last entry wins on duplicates)
    index: HashMap<String, usize>,
    config: PoolConfig,
    usage: KeyUsageTracker,
    concurrency: ConcurrencyTracker,
    failures: FailureTracker,
    cursor: RoundRobinCursor,
}

impl ApiKeyPool {
    /// Create a pool from parsed keys
    pub fn new(keys: Vec<ApiKeyInfo>, config: PoolConfig) -> Result<Self, PoolError> {
        if keys.is_empty() {
            return Err(PoolError::NoKeys);
        }

        let index = keys
            .iter()
            .enumerate()
            .map(|(idx, info)| (info.key().to_string(), idx))
            .collect();

        tracing::debug!(
            keys = keys.len(),
            strategy = %config.strategy,
            daily_limit = config.daily_limit,
            max_concurrent = config.max_concurrent_per_key,
            max_failures = config.max_failures_per_key,
            "Created API key pool"
        );

        Ok(Self {
            usage: KeyUsageTracker::new(config.daily_limit),
            concurrency: ConcurrencyTracker::new(config.max_concurrent_per_key),
            failures: FailureTracker::new(config.max_failures_per_key),
            cursor: RoundRobinCursor::new(),
            keys,
            index,
            config,
        })
    }

    /// Create a pool from `key[:alias[:project_id]]` entries
    ///
    /// Each entry's position is used for its default alias.
    pub fn from_key_strings<I, S>(entries: I, config: PoolConfig) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| ApiKeyInfo::parse(entry.as_ref(), idx, None))
            .collect();
        Self::new(keys, config)
    }

    /// All keys in configured order
    pub fn keys(&self) -> &[ApiKeyInfo] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn strategy(&self) -> RotationStrategy {
        self.config.strategy
    }

    pub fn daily_limit(&self) -> u32 {
        self.config.daily_limit
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Usage tracker, for administration (e.g. forcing a daily reset)
    pub fn usage_tracker(&self) -> &KeyUsageTracker {
        &self.usage
    }

    /// Look up a key's info by raw key value
    pub fn get_info(&self, key: &str) -> Option<&ApiKeyInfo> {
        self.index.get(key).map(|&idx| &self.keys[idx])
    }

    /// Alias for a raw key value, or `"unknown"`
    pub fn get_alias(&self, key: &str) -> &str {
        self.get_info(key).map_or("unknown", ApiKeyInfo::alias)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Get the next usable key according to the rotation strategy
    ///
    /// Only keys under their daily limit and below the failure threshold are
    /// considered. Concurrency slots are not checked here; see [`use_key`].
    ///
    /// [`use_key`]: ApiKeyPool::use_key
    pub fn get_key(&self) -> Result<&ApiKeyInfo, PoolError> {
        let eligible = self.eligibility();
        let candidates: Vec<usize> = positions(&eligible);

        if candidates.is_empty() {
            return Err(self.exhausted_error());
        }

        let picked = match self.config.strategy {
            RotationStrategy::RoundRobin => self.cursor.next(&eligible),
            RotationStrategy::LeastUsed => {
                strategy::least_used(&candidates, |idx| self.usage.get_usage(self.keys[idx].key()))
            }
            RotationStrategy::Random => strategy::random(&candidates),
        };

        Ok(&self.keys[picked.unwrap_or(candidates[0])])
    }

    /// Record one successful use of `key` against its daily quota
    pub fn mark_used(&self, key: &str) {
        self.usage.increment(key);
        tracing::debug!(
            alias = self.get_alias(key),
            remaining = self.usage.get_remaining(key),
            daily_limit = self.config.daily_limit,
            "API key used"
        );
    }

    /// Record a failure of `key`
    pub fn mark_failed(&self, key: &str, error: impl fmt::Display) {
        let failures = self.failures.mark_failed(key);
        let max_failures = self.failures.max_failures();
        let alias = self.get_alias(key);
        let error = truncate_with_suffix(&error.to_string(), MAX_LOGGED_ERROR_CHARS, "...");

        tracing::warn!(alias, failures, max_failures, error = %error, "API key failed");

        if failures == max_failures {
            tracing::warn!(alias, failures, "API key marked unhealthy due to max failures");
        }
    }

    /// Record a success of `key`, resetting its failure count
    pub fn mark_success(&self, key: &str) {
        let previous = self.failures.mark_success(key);
        if previous > 0 {
            tracing::debug!(alias = self.get_alias(key), previous_failures = previous, "API key recovered");
        }
    }

    /// Try to take a concurrency slot for `key`
    pub fn acquire(&self, key: &str) -> bool {
        self.concurrency.acquire(key)
    }

    /// Release a concurrency slot for `key`
    pub fn release(&self, key: &str) {
        self.concurrency.release(key);
    }

    /// Whether a concurrency slot is free for `key`
    pub fn can_acquire(&self, key: &str) -> bool {
        self.concurrency.can_acquire(key)
    }

    /// Take a key together with a concurrency slot
    ///
    /// The slot is held by the returned lease and released when it is
    /// dropped, on every exit path. If the strategy's pick has no free slot,
    /// other usable keys with a free slot are tried, at most once per key.
    pub fn use_key(&self) -> Result<KeyLease<'_>, PoolError> {
        let mut info = self.get_key()?;
        let mut attempts = 0;

        while !self.concurrency.acquire(info.key()) {
            if attempts >= self.keys.len() {
                return Err(self.no_concurrent_error());
            }
            attempts += 1;

            info = self
                .keys
                .iter()
                .find(|k| self.is_usable(k.key()) && self.concurrency.can_acquire(k.key()))
                .ok_or_else(|| self.no_concurrent_error())?;
        }

        tracing::debug!(alias = info.alias(), "API key acquired for use");
        Ok(KeyLease { pool: self, info })
    }

    // ------------------------------------------------------------------------
    // Retry with failover
    // ------------------------------------------------------------------------

    /// Run `operation` with a key, failing over to other keys on error
    ///
    /// Makes up to `max_retries` attempts. On success the key's failure count
    /// is reset, `on_success` is called with the key (typically wired to
    /// [`mark_used`]) and the result is returned. On error the failure is
    /// recorded against the key; retrying stops early once no key is both
    /// under quota and healthy.
    ///
    /// [`mark_used`]: ApiKeyPool::mark_used
    pub async fn execute_with_retry<T, O>(
        &self,
        operation: &O,
        max_retries: u32,
        on_success: Option<&OnSuccess<'_>>,
    ) -> Result<T, PoolError>
    where
        O: KeyOperation<T> + ?Sized,
    {
        self.run_with_failover(operation, max_retries, None, on_success)
            .await
    }

    /// Same as [`execute_with_retry`], sleeping a backoff delay between a
    /// failed attempt and the next one
    ///
    /// [`execute_with_retry`]: ApiKeyPool::execute_with_retry
    pub async fn execute_with_backoff<T, O>(
        &self,
        operation: &O,
        max_retries: u32,
        backoff: &BackoffConfig,
        on_success: Option<&OnSuccess<'_>>,
    ) -> Result<T, PoolError>
    where
        O: KeyOperation<T> + ?Sized,
    {
        self.run_with_failover(operation, max_retries, Some(backoff), on_success)
            .await
    }

    async fn run_with_failover<T, O>(
        &self,
        operation: &O,
        max_retries: u32,
        backoff: Option<&BackoffConfig>,
        on_success: Option<&OnSuccess<'_>>,
    ) -> Result<T, PoolError>
    where
        O: KeyOperation<T> + ?Sized,
    {
        let mut last_error: Option<anyhow::Error> = None;
        let mut tried: HashSet<&str> = HashSet::new();
        let mut tried_aliases: Vec<String> = Vec::new();
        let mut attempts = 0;

        for attempt in 0..max_retries {
            let mut info = match self.get_key() {
                Ok(info) => info,
                Err(err) => {
                    last_error = Some(err.into());
                    break;
                }
            };

            // Prefer a key not tried yet in this call
            if tried.contains(info.key()) {
                if let Some(untried) = self
                    .keys
                    .iter()
                    .find(|k| !tried.contains(k.key()) && self.is_usable(k.key()))
                {
                    info = untried;
                }
            }

            if tried.insert(info.key()) {
                tried_aliases.push(info.alias().to_string());
            }
            attempts += 1;

            tracing::info!(
                alias = info.alias(),
                attempt = attempt + 1,
                max_retries,
                "Executing operation with API key"
            );

            match operation.call(info.clone()).await {
                Ok(value) => {
                    self.mark_success(info.key());
                    if let Some(callback) = on_success {
                        callback(info.key());
                    }
                    tracing::info!(alias = info.alias(), attempt = attempt + 1, "Operation succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    self.mark_failed(info.key(), &err);
                    last_error = Some(err);

                    let remaining = self.usable_count();
                    if remaining == 0 {
                        tracing::warn!(
                            attempt = attempt + 1,
                            "No usable API keys left, giving up"
                        );
                        break;
                    }

                    if attempt + 1 < max_retries {
                        if let Some(backoff) = backoff {
                            let delay = backoff.calculate_delay(attempt);
                            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                            tokio::time::sleep(delay).await;
                        }
                        tracing::info!(remaining, "Retrying with a different API key");
                    }
                }
            }
        }

        Err(PoolError::RetriesExhausted {
            attempts,
            max_retries,
            tried: tried_aliases,
            source: last_error.unwrap_or_else(|| anyhow::anyhow!("no attempt was made")),
        })
    }

    // ------------------------------------------------------------------------
    // Status & administration
    // ------------------------------------------------------------------------

    /// Snapshot of every key, in configured order
    pub fn get_status(&self) -> Vec<KeyStatus> {
        self.keys.iter().map(|info| self.status_of(info)).collect()
    }

    /// Snapshot of the key with the given alias
    pub fn key_status(&self, alias: &str) -> Option<KeyStatus> {
        self.keys
            .iter()
            .find(|info| info.alias() == alias)
            .map(|info| self.status_of(info))
    }

    /// Remaining quota summed over healthy keys
    pub fn get_total_remaining(&self) -> u32 {
        self.keys
            .iter()
            .filter(|info| self.failures.is_healthy(info.key()))
            .map(|info| self.usage.get_remaining(info.key()))
            .sum()
    }

    /// Aggregate pool statistics
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total: self.keys.len(),
            available: 0,
            healthy: 0,
            exhausted: 0,
            active: 0,
            strategy: self.config.strategy,
        };
        for info in &self.keys {
            let key = info.key();
            let in_quota = self.usage.is_available(key);
            let healthy = self.failures.is_healthy(key);
            stats.healthy += usize::from(healthy);
            stats.exhausted += usize::from(!in_quota);
            stats.available += usize::from(in_quota && healthy);
            stats.active += self.concurrency.get_active(key);
        }
        stats
    }

    /// Clear all failure counts (e.g. after an upstream outage is fixed)
    pub fn reset_failures(&self) {
        self.failures.reset_all();
        tracing::info!("All API key failure counts reset");
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Under quota and healthy
    fn is_usable(&self, key: &str) -> bool {
        self.usage.is_available(key) && self.failures.is_healthy(key)
    }

    fn eligibility(&self) -> Vec<bool> {
        self.keys.iter().map(|info| self.is_usable(info.key())).collect()
    }

    fn usable_count(&self) -> usize {
        self.keys.iter().filter(|info| self.is_usable(info.key())).count()
    }

    fn status_of(&self, info: &ApiKeyInfo) -> KeyStatus {
        let key = info.key();
        KeyStatus {
            alias: info.alias().to_string(),
            key_preview: info.masked(),
            project_id: info.project_id().map(str::to_string),
            used: self.usage.get_usage(key),
            remaining: self.usage.get_remaining(key),
            available: self.usage.is_available(key),
            active_concurrent: self.concurrency.get_active(key),
            failure_count: self.failures.get_failure_count(key),
            healthy: self.failures.is_healthy(key),
        }
    }

    fn exhausted_error(&self) -> PoolError {
        let exhausted = self
            .keys
            .iter()
            .filter(|info| !self.usage.is_available(info.key()))
            .count();
        let failed = self
            .keys
            .iter()
            .filter(|info| !self.failures.is_healthy(info.key()))
            .count();

        PoolError::Exhausted {
            exhausted,
            failed,
            total: self.keys.len(),
            daily_limit: self.config.daily_limit,
        }
    }

    fn no_concurrent_error(&self) -> PoolError {
        PoolError::NoConcurrentKey {
            max_concurrent: self.concurrency.max_per_key(),
            total: self.keys.len(),
        }
    }
}

fn positions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(idx, ok)| ok.then_some(idx))
        .collect()
}

// ============================================================================
// Key Lease
// ============================================================================

/// A key held together with one of its concurrency slots
///
/// The slot is released when the lease is dropped.
#[derive(Debug)]
pub struct KeyLease<'a> {
    pool: &'a ApiKeyPool,
    info: &'a ApiKeyInfo,
}

impl<'a> KeyLease<'a> {
    pub fn info(&self) -> &'a ApiKeyInfo {
        self.info
    }

    pub fn key(&self) -> &'a str {
        self.info.key()
    }
}

impl Deref for KeyLease<'_> {
    type Target = ApiKeyInfo;

    fn deref(&self) -> &ApiKeyInfo {
        self.info
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.info.key());
        tracing::debug!(alias = self.info.alias(), "API key released");
    }
}

// ============================================================================
// Status
// ============================================================================

/// Point-in-time status of one key, safe for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub alias: String,
    pub key_preview: String,
    pub project_id: Option<String>,
    /// Uses today
    pub used: u32,
    /// Uses left today
    pub remaining: u32,
    /// Under the daily limit
    pub available: bool,
    pub active_concurrent: u32,
    pub failure_count: u32,
    pub healthy: bool,
}

/// Aggregate statistics about a key pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Total number of keys
    pub total: usize,
    /// Keys under quota and healthy
    pub available: usize,
    /// Keys below the failure threshold
    pub healthy: usize,
    /// Keys at their daily limit
    pub exhausted: usize,
    /// In-flight uses across all keys
    pub active: u32,
    pub strategy: RotationStrategy,
}

impl PoolStats {
    /// At least one key can currently be handed out
    pub fn is_healthy(&self) -> bool {
        self.available > 0
    }
}

// ============================================================================
// Tests
// ============================================================================
