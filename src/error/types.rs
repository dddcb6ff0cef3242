//! Key pool error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("At least one API key is required")]
    NoKeys,

    #[error(
        "No API keys available. Exhausted: {exhausted}, Failed: {failed}, \
         Total keys: {total}, Daily limit: {daily_limit}"
    )]
    Exhausted {
        /// Keys at or over today's quota
        exhausted: usize,
        /// Keys over the consecutive failure threshold
        failed: usize,
        total: usize,
        daily_limit: u32,
    },

    #[error(
        "No keys available for concurrent use \
         (max {max_concurrent} per key, total keys: {total})"
    )]
    NoConcurrentKey { max_concurrent: u32, total: usize },

    #[error(
        "All retry attempts failed after {max_retries} tries \
         ({attempts} attempted, keys tried: [{}]). Last error: {source}",
        .tried.join(", ")
    )]
    RetriesExhausted {
        attempts: u32,
        max_retries: u32,
        /// Aliases of the keys that were tried, in order
        tried: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid rotation strategy: {0}. Expected: round_robin, least_used, or random")]
    InvalidStrategy(String),
}

impl PoolError {
    /// Whether waiting (for quota reset, a free slot or a recovered key) may help
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            PoolError::Exhausted { .. }
                | PoolError::NoConcurrentKey { .. }
                | PoolError::RetriesExhausted { .. }
        )
    }

    /// The last operation error behind a retry exhaustion
    pub fn last_error(&self) -> Option<&anyhow::Error> {
        match self {
            PoolError::RetriesExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_exhausted_message_distinguishes_causes() {
        let err = PoolError::Exhausted {
            exhausted: 1,
            failed: 2,
            total: 3,
            daily_limit: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("Exhausted: 1"));
        assert!(msg.contains("Failed: 2"));
        assert!(msg.contains("Total keys: 3"));
        assert!(msg.contains("Daily limit: 10"));
        assert!(err.is_exhaustion());
    }

    #[test]
    fn test_retries_exhausted_keeps_source() {
        let err = PoolError::RetriesExhausted {
            attempts: 2,
            max_retries: 3,
            tried: vec!["prod".to_string(), "backup".to_string()],
            source: anyhow::anyhow!("quota exceeded (429)"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All retry attempts failed after 3 tries"));
        assert!(msg.contains("keys tried: [prod, backup]"));
        assert!(msg.contains("quota exceeded (429)"));
        assert_eq!(err.source().unwrap().to_string(), "quota exceeded (429)");
        assert!(err.last_error().is_some());
    }

    #[test]
    fn test_configuration_errors_are_not_exhaustion() {
        assert!(!PoolError::NoKeys.is_exhaustion());
        assert!(!PoolError::InvalidStrategy("x".into()).is_exhaustion());
    }
}
