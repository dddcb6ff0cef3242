//! API Key Pool Module
//!
//! This module manages a set of API keys for quota-limited generation
//! services (e.g. video generation with a small daily allowance per key).
//!
//! # Features
//! - Rotation strategies (RoundRobin, LeastUsed, Random)
//! - Daily usage limits with automatic reset at the day boundary
//! - Per-key concurrency limits with scoped, always-released leases
//! - Consecutive failure tracking and health
//! - Retry with automatic failover to other keys
//!
//! # Example
//! ```ignore
//! use tale_key_pool::services::key_pool::{ApiKeyInfo, ApiKeyPool, PoolConfig, RotationStrategy};
//!
//! let pool = ApiKeyPool::from_key_strings(
//!     ["key1:prod:project-a", "key2:backup"],
//!     PoolConfig::new(RotationStrategy::RoundRobin).with_daily_limit(10),
//! )?;
//!
//! let mark_used = |key: &str| pool.mark_used(key);
//! let video = pool
//!     .execute_with_retry(&|key: ApiKeyInfo| veo.generate(key, request.clone()), 3, Some(&mark_used))
//!     .await?;
//! ```

mod concurrency;
mod failure;
mod key;
mod operation;
mod pool;
mod strategy;
mod usage;

pub use concurrency::ConcurrencyTracker;
pub use failure::FailureTracker;
pub use key::ApiKeyInfo;
pub use operation::KeyOperation;
pub use pool::{ApiKeyPool, KeyLease, KeyStatus, OnSuccess, PoolConfig, PoolStats};
pub use strategy::{RotationStrategy, RoundRobinCursor};
pub use usage::KeyUsageTracker;
