//! API key pool for quota-limited generation APIs

// Public modules
pub mod config;
pub mod error;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::PoolError;
pub use services::key_pool::{
    ApiKeyInfo, ApiKeyPool, KeyLease, KeyOperation, KeyStatus, PoolConfig, PoolStats,
    RotationStrategy,
};
