//! Key rotation strategies
//!
//! This module provides the strategies used to pick one key among the
//! currently eligible ones, and the shared round-robin cursor.

use crate::error::PoolError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

// ============================================================================
// Rotation Strategy
// ============================================================================

/// Policy for choosing among eligible keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Cycle through the configured key order (default)
    #[default]
    RoundRobin,
    /// Pick the key with the lowest usage today
    LeastUsed,
    /// Uniform random pick
    Random,
}

impl std::str::FromStr for RotationStrategy {
    type Err = PoolError;

    /// Parse from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "least_used" | "leastused" => Ok(Self::LeastUsed),
            "random" => Ok(Self::Random),
            _ => Err(PoolError::InvalidStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::LeastUsed => write!(f, "least_used"),
            Self::Random => write!(f, "random"),
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Round-robin cursor over the full key list
///
/// The cursor walks every configured key, not only the eligible ones, so
/// fairness holds while the eligible set changes between calls.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    index: Mutex<usize>,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next eligible index
    ///
    /// `eligible[i]` tells whether key `i` may be returned. Scans at most one
    /// full lap; falls back to the first eligible index.
    pub fn next(&self, eligible: &[bool]) -> Option<usize> {
        let total = eligible.len();
        if total == 0 {
            return None;
        }

        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..total {
            let candidate = *index % total;
            *index = index.wrapping_add(1);
            if eligible[candidate] {
                return Some(candidate);
            }
        }
        eligible.iter().position(|ok| *ok)
    }
}

/// Candidate with the lowest usage; ties go to the earliest candidate
pub fn least_used(candidates: &[usize], usage: impl Fn(usize) -> u32) -> Option<usize> {
    candidates.iter().copied().min_by_key(|&idx| usage(idx))
}

/// Uniformly random candidate
pub fn random(candidates: &[usize]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let pos = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates[pos])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "round_robin".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::RoundRobin
        );
        assert_eq!(
            "least_used".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::LeastUsed
        );
        assert_eq!(
            "random".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::Random
        );
    }

    #[test]
    fn test_strategy_from_str_case_insensitive() {
        assert_eq!(
            "ROUND_ROBIN".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::RoundRobin
        );
        assert_eq!(
            "Least_Used".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::LeastUsed
        );
    }

    #[test]
    fn test_strategy_from_str_rejects_unknown() {
        let err = "weighted".parse::<RotationStrategy>().unwrap_err();
        assert!(matches!(err, PoolError::InvalidStrategy(ref s) if s == "weighted"));
    }

    #[test]
    fn test_strategy_display_round_trips() {
        for strategy in [
            RotationStrategy::RoundRobin,
            RotationStrategy::LeastUsed,
            RotationStrategy::Random,
        ] {
            assert_eq!(strategy.to_string().parse::<RotationStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_round_robin_cycles() {
        let cursor = RoundRobinCursor::new();
        let eligible = [true, true, true];
        let picks: Vec<usize> = (0..5).filter_map(|_| cursor.next(&eligible)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_round_robin_skips_ineligible() {
        let cursor = RoundRobinCursor::new();
        let eligible = [true, false, true];
        let picks: Vec<usize> = (0..4).filter_map(|_| cursor.next(&eligible)).collect();
        assert_eq!(picks, vec![0, 2, 0, 2]);
    }

    #[test]
    fn test_round_robin_none_eligible() {
        let cursor = RoundRobinCursor::new();
        assert_eq!(cursor.next(&[false, false]), None);
        assert_eq!(cursor.next(&[]), None);
    }

    #[test]
    fn test_least_used_prefers_first_on_tie() {
        let usage = [2, 0, 0];
        assert_eq!(least_used(&[0, 1, 2], |i| usage[i]), Some(1));
        assert_eq!(least_used(&[0], |i| usage[i]), Some(0));
        assert_eq!(least_used(&[], |i| usage[i]), None);
    }

    #[test]
    fn test_random_stays_within_candidates() {
        for _ in 0..50 {
            let pick = random(&[1, 3]).unwrap();
            assert!(pick == 1 || pick == 3);
        }
        assert_eq!(random(&[]), None);
    }
}
