//! Poll interval schedule.

use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Multiplicative backoff that only grows every `grow_every` probe attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Interval before the first check.
    pub initial_interval: Duration,
    /// Ceiling for the interval.
    pub max_interval: Duration,
    /// Growth factor applied at each step.
    pub factor: f64,
    /// Number of checks between growth steps.
    pub grow_every: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            factor: 1.5,
            grow_every: 3,
        }
    }
}

impl BackoffPolicy {
    /// Clamp degenerate values into a usable policy.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.grow_every = self.grow_every.max(1);
        if !self.factor.is_finite() || self.factor < 1.0 {
            self.factor = 1.0;
        }
        self.initial_interval = self.initial_interval.max(MIN_INTERVAL);
        self.max_interval = self.max_interval.max(self.initial_interval);
        self
    }

    /// Interval to wait after `checks` probe attempts.
    ///
    /// `initial * factor^(checks / grow_every)`, capped at `max_interval`.
    pub fn interval_after(&self, checks: u64) -> Duration {
        let policy = self.normalized();
        let steps = checks / policy.grow_every;
        let max_secs = policy.max_interval.as_secs_f64();
        let mut secs = policy.initial_interval.as_secs_f64();
        for _ in 0..steps {
            if secs >= max_secs {
                break;
            }
            secs *= policy.factor;
        }
        if secs >= max_secs {
            return policy.max_interval;
        }
        Duration::try_from_secs_f64(secs).map_or(policy.max_interval, |interval| {
            interval.min(policy.max_interval)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_holds_for_first_three_checks() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval_after(0), Duration::from_secs(1));
        assert_eq!(policy.interval_after(1), Duration::from_secs(1));
        assert_eq!(policy.interval_after(2), Duration::from_secs(1));
        assert_eq!(policy.interval_after(3), Duration::from_millis(1_500));
        assert_eq!(policy.interval_after(5), Duration::from_millis(1_500));
        assert_eq!(policy.interval_after(6), Duration::from_millis(2_250));
        assert_eq!(policy.interval_after(9), Duration::from_millis(3_375));
    }

    #[test]
    fn interval_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval_after(12), Duration::from_secs(5));
        assert_eq!(policy.interval_after(u64::MAX), Duration::from_secs(5));
    }

    #[test]
    fn interval_never_decreases() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for checks in 0..40 {
            let current = policy.interval_after(checks);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn normalized_clamps_degenerate_values() {
        let policy = BackoffPolicy {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            factor: f64::NAN,
            grow_every: 0,
        }
        .normalized();
        assert_eq!(policy.grow_every, 1);
        assert!((policy.factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(policy.initial_interval, Duration::from_millis(1));
        assert_eq!(policy.max_interval, Duration::from_millis(1));
        assert_eq!(policy.interval_after(100), Duration::from_millis(1));
    }

    #[test]
    fn huge_factor_caps_instead_of_overflowing() {
        let policy = BackoffPolicy {
            factor: 1e30,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.interval_after(2), Duration::from_secs(1));
        assert_eq!(policy.interval_after(3), Duration::from_secs(5));
        assert_eq!(policy.interval_after(u64::MAX), Duration::from_secs(5));

        let unbounded = BackoffPolicy {
            factor: f64::MAX,
            max_interval: Duration::MAX,
            ..BackoffPolicy::default()
        };
        assert_eq!(unbounded.interval_after(6), Duration::MAX);
    }
}
