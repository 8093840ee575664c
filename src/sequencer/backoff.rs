// Adapter retry with exponential backoff
// Musical timescale: delays are milliseconds, bounded by the event's own lifetime

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry parameters shared by every dispatch of a sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 40,
            max_attempts: 3,
        }
    }
}

/// Per-event retry state
#[derive(Debug, Clone)]
pub struct BackoffStrategy {
    config: BackoffConfig,
    current_attempt: u32,
}

impl BackoffStrategy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current_attempt: 0,
        }
    }

    /// Delay before the next retry (base * 2^attempt, capped), `None` once exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.config.max_attempts {
            return None;
        }

        let factor = 1u64.checked_shl(self.current_attempt).unwrap_or(u64::MAX);
        let delay_ms = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);

        self.current_attempt += 1;

        Some(Duration::from_millis(delay_ms))
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64, max: u64, attempts: u32) -> BackoffConfig {
        BackoffConfig {
            base_delay_ms: base,
            max_delay_ms: max,
            max_attempts: attempts,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let mut strategy = BackoffStrategy::new(config(5, 1000, 10));

        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(5)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(20)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_delay_capped() {
        let mut strategy = BackoffStrategy::new(config(5, 12, 4));

        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(5)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(12)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(12)));
    }

    #[test]
    fn test_default_config() {
        let mut strategy = BackoffStrategy::default();

        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(5)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(strategy.current_attempt(), 2);
    }

    #[test]
    fn test_max_attempts() {
        let mut strategy = BackoffStrategy::new(config(1, 100, 3));

        assert!(strategy.next_delay().is_some());
        assert!(strategy.next_delay().is_some());
        assert!(strategy.next_delay().is_some());
        assert!(strategy.next_delay().is_none());
        assert_eq!(strategy.current_attempt(), 3);
    }

    #[test]
    fn test_huge_attempt_count_saturates() {
        let mut strategy = BackoffStrategy::new(config(7, 50, 200));
        let last = (0..200).filter_map(|_| strategy.next_delay()).last();
        assert_eq!(last, Some(Duration::from_millis(50)));
    }
}
