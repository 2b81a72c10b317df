//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Shape of a backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound for any delay, jitter included.
    pub max: Duration,
    /// Random extra delay, as a fraction of the computed delay (0.0–1.0).
    pub jitter: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: 0.2,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(30 * 60))
    }
}

/// Consecutive-failure counter that turns into a delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Count a failure and return the delay before the next attempt,
    /// without jitter: `base * 2^(failures - 1)`, capped at `max`.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay_for(self.failures)
    }

    /// Reset to the base interval.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Delay implied by the current failure count, if any.
    pub fn current_delay(&self) -> Option<Duration> {
        (self.failures > 0).then(|| self.delay_for(self.failures))
    }

    fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.policy
            .base
            .checked_mul(factor)
            .unwrap_or(self.policy.max)
            .min(self.policy.max)
    }

    /// Add random jitter to a delay, staying under the cap.
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.policy.jitter <= 0.0 || delay.is_zero() {
            return delay.min(self.policy.max);
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.policy.jitter);
        delay.mul_f64(1.0 + extra).min(self.policy.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(base: u64, max: u64) -> Backoff {
        Backoff::new(BackoffPolicy::new(
            Duration::from_secs(base),
            Duration::from_secs(max),
        ))
    }

    #[test]
    fn consecutive_failures_double_the_delay() {
        let mut b = backoff(10, 1_000);
        assert_eq!(b.current_delay(), None);
        assert_eq!(b.record_failure(), Duration::from_secs(10));
        assert_eq!(b.record_failure(), Duration::from_secs(20));
        assert_eq!(b.record_failure(), Duration::from_secs(40));
        assert_eq!(b.failures(), 3);
    }

    #[test]
    fn delay_is_capped() {
        let mut b = backoff(10, 25);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.record_failure(), Duration::from_secs(25));
        for _ in 0..100 {
            b.record_failure();
        }
        assert_eq!(b.current_delay(), Some(Duration::from_secs(25)));
    }

    #[test]
    fn success_resets_to_base() {
        let mut b = backoff(10, 1_000);
        b.record_failure();
        b.record_failure();
        b.record_success();
        assert_eq!(b.current_delay(), None);
        assert_eq!(b.record_failure(), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let b = Backoff::new(
            BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(100)).with_jitter(0.5),
        );
        for _ in 0..200 {
            let d = b.jittered(Duration::from_secs(10));
            assert!(d >= Duration::from_secs(10) && d <= Duration::from_secs(15), "{d:?}");
        }
        for _ in 0..50 {
            assert!(b.jittered(Duration::from_secs(90)) <= Duration::from_secs(100));
        }
    }
}
