// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Reconnect backoff policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between connection attempts, as a pure function of the attempt number.
///
/// `multiplier = 1.0` gives a fixed delay; larger values grow geometrically up to `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            initial_ms: ms,
            max_ms: ms,
            multiplier: 1.0,
        }
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_ms: initial.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            multiplier: 2.0,
        }
    }

    /// Delay to wait after `failures` consecutive failed attempts. Zero failures → no wait.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let growth = self.multiplier.max(1.0).powi(failures.saturating_sub(1).min(64) as i32);
        let ms = (self.initial_ms as f64 * growth).min(self.max_ms.max(self.initial_ms) as f64);
        Duration::from_millis(ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policy() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(5));
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_policy_caps() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(500), Duration::from_secs(8));
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(8));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_multiplier_below_one_is_fixed() {
        let policy = BackoffPolicy {
            initial_ms: 100,
            max_ms: 1000,
            multiplier: 0.5,
        };
        assert_eq!(policy.delay(3), Duration::from_millis(100));
    }
}
