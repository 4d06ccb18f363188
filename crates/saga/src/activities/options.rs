//! Time budgets and retry policy for activity calls.

use std::time::Duration;

use thiserror::Error;

/// Invalid activity options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("per-attempt budget must be greater than zero")]
    ZeroStartToClose,

    #[error("per-attempt budget {start_to_close:?} exceeds total budget {schedule_to_close:?}")]
    AttemptExceedsTotal {
        start_to_close: Duration,
        schedule_to_close: Duration,
    },

    #[error("backoff coefficient must be at least 1.0, got {0}")]
    InvalidBackoffCoefficient(f64),
}

/// Budgets applied to every delegated call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Budget for a single attempt.
    pub start_to_close: Duration,
    /// Budget for all attempts together, backoff included.
    pub schedule_to_close: Duration,
    /// Maximum attempts; `0` means bounded only by `schedule_to_close`.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_coefficient: f64,
}

impl ActivityOptions {
    pub const DEFAULT_START_TO_CLOSE: Duration = Duration::from_secs(15);
    pub const DEFAULT_SCHEDULE_TO_CLOSE: Duration = Duration::from_secs(60);

    /// Options with the given budgets and the default retry policy.
    pub fn with_budgets(start_to_close: Duration, schedule_to_close: Duration) -> Self {
        Self {
            start_to_close,
            schedule_to_close,
            ..Self::default()
        }
    }

    /// Sets the attempt limit.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Checks that the budgets are usable.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.start_to_close.is_zero() {
            return Err(OptionsError::ZeroStartToClose);
        }
        if self.start_to_close > self.schedule_to_close {
            return Err(OptionsError::AttemptExceedsTotal {
                start_to_close: self.start_to_close,
                schedule_to_close: self.schedule_to_close,
            });
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(OptionsError::InvalidBackoffCoefficient(
                self.backoff_coefficient,
            ));
        }
        Ok(())
    }

    /// Backoff to wait after `current`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_coefficient)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Returns true if `attempts` already used up the attempt limit.
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close: Self::DEFAULT_START_TO_CLOSE,
            schedule_to_close: Self::DEFAULT_SCHEDULE_TO_CLOSE,
            max_attempts: 0,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_coefficient: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let options = ActivityOptions::default();
        assert_eq!(options.start_to_close, Duration::from_secs(15));
        assert_eq!(options.schedule_to_close, Duration::from_secs(60));
        assert_eq!(options.max_attempts, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_attempt_longer_than_total() {
        let options =
            ActivityOptions::with_budgets(Duration::from_secs(30), Duration::from_secs(20));
        assert!(matches!(
            options.validate(),
            Err(OptionsError::AttemptExceedsTotal { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_attempt_budget() {
        let options = ActivityOptions::with_budgets(Duration::ZERO, Duration::from_secs(20));
        assert_eq!(options.validate(), Err(OptionsError::ZeroStartToClose));
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let options = ActivityOptions {
            backoff_coefficient: 0.5,
            ..ActivityOptions::default()
        };
        assert_eq!(
            options.validate(),
            Err(OptionsError::InvalidBackoffCoefficient(0.5))
        );
    }

    #[test]
    fn test_rejects_non_finite_backoff() {
        for coefficient in [f64::INFINITY, f64::NAN] {
            let options = ActivityOptions {
                backoff_coefficient: coefficient,
                ..ActivityOptions::default()
            };
            assert!(matches!(
                options.validate(),
                Err(OptionsError::InvalidBackoffCoefficient(_))
            ));
        }
    }

    #[test]
    fn test_huge_backoff_coefficient_saturates_at_max() {
        let options = ActivityOptions {
            backoff_coefficient: f64::MAX,
            ..ActivityOptions::default()
        };
        assert!(options.validate().is_ok());
        assert_eq!(
            options.next_backoff(Duration::from_secs(1)),
            options.max_backoff
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let options = ActivityOptions::default();
        assert_eq!(
            options.next_backoff(Duration::from_millis(100)),
            Duration::from_millis(200)
        );
        assert_eq!(
            options.next_backoff(Duration::from_secs(8)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_attempt_limit() {
        let unlimited = ActivityOptions::default();
        assert!(!unlimited.attempts_exhausted(1_000));

        let limited = ActivityOptions::default().max_attempts(3);
        assert!(!limited.attempts_exhausted(2));
        assert!(limited.attempts_exhausted(3));
    }
}
