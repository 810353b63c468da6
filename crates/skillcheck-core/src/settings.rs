//! Tunable constants shared by the engines.
//!
//! The band boundaries are defaults, not law; deployments override them
//! through the `[thresholds]` table of the configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Band boundaries for mastery tags, study-plan tiers and trends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Submission percentage at or above which a topic is `mastered`.
    pub mastered_from: f64,
    /// Submission percentage at or above which a topic is `developing`.
    pub developing_from: f64,
    /// Mastery below this lands in `urgent_review`.
    pub skill_building_from: f64,
    /// Mastery at or above this lands in `advancement`.
    pub advancement_from: f64,
    /// Minimum absolute change classified as improving/declining.
    pub trend_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mastered_from: 0.8,
            developing_from: 0.5,
            skill_building_from: 0.5,
            advancement_from: 0.75,
            trend_delta: 0.05,
        }
    }
}

/// Per-call upper bounds on a single gateway round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub grading: Duration,
    pub summary: Duration,
    pub quiz: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            grading: Duration::from_secs(45),
            summary: Duration::from_secs(30),
            quiz: Duration::from_secs(60),
        }
    }
}

/// Caller-side retry policy for transient gateway degradation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Everything an engine needs besides the gateway itself.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub thresholds: Thresholds,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    /// Maximum concurrent sub-items for batch grading and quiz generation.
    pub parallelism: Parallelism,
}

/// Concurrency bound, always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism(usize);

impl Parallelism {
    pub fn new(n: usize) -> Self {
        Self(n.max(1))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Parallelism {
    fn default() -> Self {
        Self(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_never_zero() {
        assert_eq!(Parallelism::new(0).get(), 1);
        assert_eq!(Parallelism::new(8).get(), 8);
    }

    #[test]
    fn thresholds_partial_toml_like_override() {
        let t: Thresholds = serde_json::from_str(r#"{"trend_delta": 0.1}"#).unwrap();
        assert_eq!(t.trend_delta, 0.1);
        assert_eq!(t.advancement_from, 0.75);
    }
}
