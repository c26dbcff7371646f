//! Backoff schedule for rate-limited provider calls.

use backon::{BackoffBuilder, ExponentialBuilder};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how patiently the gateway retries a throttled primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// First backoff delay; each later delay doubles
    #[serde(with = "crate::config::humantime_duration")]
    pub base_delay: Duration,

    /// Upper bound of the uniform jitter added to every delay
    #[serde(with = "crate::config::humantime_duration")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// No retries; throttling goes straight to fallback.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff delays without jitter, one per permitted retry.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_times(self.max_retries as usize)
            .build()
    }

    /// Random extra delay in `0..=max_jitter`.
    pub fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..=self.max_jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_doubles() {
        let delays: Vec<Duration> = RetryPolicy::default().schedule().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn test_no_retries_has_empty_schedule() {
        assert_eq!(RetryPolicy::none().schedule().count(), 0);
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.jitter() <= Duration::from_secs(2));
        }
        let no_jitter = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(no_jitter.jitter(), Duration::ZERO);
    }

    #[test]
    fn test_humantime_yaml() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_retries: 4\nbase_delay: 500ms\n").unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_jitter, Duration::from_secs(2));
    }
}
