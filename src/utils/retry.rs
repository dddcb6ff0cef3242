//! Backoff delays between failover attempts
//!
//! This module computes exponential backoff with optional jitter, used when
//! retrying an operation on another key right away would only hit the same
//! upstream rate limit.

use rand::Rng;
use std::time::Duration;

/// Configuration for backoff delays
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth)
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0)
    pub multiplier: f64,

    /// Whether to add jitter to delays
    pub use_jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl BackoffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        // Jitter adds a random value between 0 and the delay
        let delay_ms = if self.use_jitter && delay_ms > 0.0 {
            delay_ms + rand::thread_rng().gen_range(0.0..delay_ms)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Backoff presets for the kinds of upstream services keys are used with
pub mod presets {
    use super::*;

    /// Video generation: long jobs behind tight per-minute limits
    pub fn video_generation() -> BackoffConfig {
        BackoffConfig::new()
            .with_initial_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(60))
            .with_multiplier(2.0)
            .with_jitter(true)
    }

    /// LLM and image calls: short requests, quick retries
    pub fn llm() -> BackoffConfig {
        BackoffConfig::new()
            .with_initial_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(8))
            .with_multiplier(2.0)
            .with_jitter(true)
    }

    /// No delay between attempts
    pub fn none() -> BackoffConfig {
        BackoffConfig::new()
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
            .with_jitter(false)
    }
}
