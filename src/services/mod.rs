//! Services module
//!
//! Contains the API key pool that gateway adapters draw credentials from.

pub mod key_pool;

pub use key_pool::{
    ApiKeyInfo, ApiKeyPool, ConcurrencyTracker, FailureTracker, KeyLease, KeyOperation,
    KeyStatus, KeyUsageTracker, OnSuccess, PoolConfig, PoolStats, RotationStrategy,
};
