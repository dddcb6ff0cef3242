//! Configuration management module
//!
//! This module handles loading and validating the key pool configuration
//! from environment variables and .env files.

pub mod settings;

pub use settings::{Settings, VeoSettings};
