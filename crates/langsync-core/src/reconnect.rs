#![forbid(unsafe_code)]

//! Bounded retry schedule for re-establishing contact with related contexts.
//!
//! A framed page or a window opened by another page asks its parent/opener
//! for the current language with `SYNC_REQUEST`. The peer may not have loaded
//! yet, so the request is repeated on a [`ReconnectPolicy`] schedule until the
//! first response arrives or the attempts run out. There is no jitter: the
//! same policy always yields the same waits.
//!
//! ```
//! use langsync_core::reconnect::{BackoffStrategy, ReconnectPolicy};
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy::new(4, BackoffStrategy::Linear {
//!     base_ms: 2000,
//!     max_ms: 5000,
//! });
//! assert_eq!(policy.delay(1), Duration::from_secs(4));
//! assert_eq!(policy.delay(3), Duration::from_secs(5));
//! ```

use serde::{Deserialize, Serialize};
use web_time::Duration;

/// Spacing of reconnect attempts. Every delay is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BackoffStrategy {
    /// The same wait before every request.
    Fixed { delay_ms: u64 },
    /// `base_ms` doubling per attempt, never above `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
    /// `base_ms` growing by `base_ms` per attempt, never above `max_ms`.
    Linear { base_ms: u64, max_ms: u64 },
}

/// How often and how many times to re-send `SYNC_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Requests sent by the timer before giving up; 0 disables it.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Wait before request number `attempt`, counted from 0. Saturates
    /// instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = match self.backoff {
            BackoffStrategy::Fixed { delay_ms } => delay_ms,
            BackoffStrategy::Exponential { base_ms, max_ms } => base_ms
                .saturating_mul(2u64.saturating_pow(attempt))
                .min(max_ms),
            BackoffStrategy::Linear { base_ms, max_ms } => base_ms
                .saturating_mul(u64::from(attempt).saturating_add(1))
                .min(max_ms),
        };
        Duration::from_millis(millis)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(6, BackoffStrategy::Fixed { delay_ms: 5000 })
    }
}

/// Progress through a [`ReconnectPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSchedule {
    policy: ReconnectPolicy,
    attempts: u32,
    connected: bool,
}

impl ReconnectSchedule {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            connected: false,
        }
    }

    /// Delay until the next attempt, or `None` once connected or exhausted.
    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        if self.connected || self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.delay(self.attempts))
    }

    /// Count one attempt. Returns `false` when no attempt should be made.
    pub fn record_attempt(&mut self) -> bool {
        if self.next_delay().is_none() {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// A peer answered; stop retrying.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_waits_five_seconds_six_times() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 6);
        for attempt in 0..6 {
            assert_eq!(policy.delay(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn growing_strategies_stop_at_their_cap() {
        let doubling = ReconnectPolicy::new(
            5,
            BackoffStrategy::Exponential {
                base_ms: 250,
                max_ms: 1500,
            },
        );
        let waits: Vec<u128> = (0..5).map(|n| doubling.delay(n).as_millis()).collect();
        assert_eq!(waits, vec![250, 500, 1000, 1500, 1500]);

        let stepping = ReconnectPolicy::new(
            5,
            BackoffStrategy::Linear {
                base_ms: 400,
                max_ms: 1000,
            },
        );
        let waits: Vec<u128> = (0..4).map(|n| stepping.delay(n).as_millis()).collect();
        assert_eq!(waits, vec![400, 800, 1000, 1000]);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let doubling = ReconnectPolicy::new(
            1,
            BackoffStrategy::Exponential {
                base_ms: u64::MAX / 2,
                max_ms: u64::MAX,
            },
        );
        assert_eq!(doubling.delay(90), Duration::from_millis(u64::MAX));

        let stepping = ReconnectPolicy::new(
            1,
            BackoffStrategy::Linear {
                base_ms: u64::MAX / 3,
                max_ms: u64::MAX,
            },
        );
        assert_eq!(stepping.delay(u32::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn schedule_stops_after_max_attempts() {
        let policy = ReconnectPolicy::new(2, BackoffStrategy::Fixed { delay_ms: 10 });
        let mut schedule = ReconnectSchedule::new(policy);
        assert_eq!(schedule.next_delay(), Some(Duration::from_millis(10)));
        assert!(schedule.record_attempt());
        assert!(schedule.record_attempt());
        assert_eq!(schedule.next_delay(), None);
        assert!(!schedule.record_attempt());
        assert_eq!(schedule.attempts(), 2);
    }

    #[test]
    fn schedule_stops_once_connected() {
        let mut schedule = ReconnectSchedule::new(ReconnectPolicy::default());
        assert!(schedule.record_attempt());
        schedule.mark_connected();
        assert!(schedule.is_connected());
        assert_eq!(schedule.next_delay(), None);
    }

    #[test]
    fn policy_deserializes_from_camel_case() {
        let policy: ReconnectPolicy = serde_json::from_str(
            r#"{"maxAttempts":4,"backoff":{"kind":"linear","baseMs":250,"maxMs":1000}}"#,
        )
        .unwrap();
        assert_eq!(
            policy,
            ReconnectPolicy::new(
                4,
                BackoffStrategy::Linear {
                    base_ms: 250,
                    max_ms: 1000
                }
            )
        );
    }
}
