//! Utility modules
//!
//! Contains backoff delays, deadline polling and string helpers.

pub mod retry;
pub mod string;
pub mod timeout;

pub use retry::{presets, BackoffConfig};
pub use string::{truncate_str, truncate_with_suffix};
pub use timeout::{poll_until, with_timeout, PollConfig, TimeoutError};
