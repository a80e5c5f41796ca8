//! Retry schedule for generation calls

use super::GenerationError;
use crate::config::RetryConfig;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

/// Attempt counter plus exponential delays without jitter.
///
/// The schedule only computes waits; the caller sleeps.
#[derive(Debug)]
pub struct RetrySchedule {
    max_attempts: u32,
    attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetrySchedule {
    pub fn new(config: &RetryConfig) -> Self {
        let initial = secs(config.initial_delay_secs);
        let max_delay = secs(config.max_delay_secs).max(initial);
        let multiplier = if config.multiplier.is_finite() {
            config.multiplier.max(1.0)
        } else {
            1.0
        };

        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(initial)
            .with_randomization_factor(0.0)
            .with_multiplier(multiplier)
            .with_max_interval(max_delay)
            .with_max_elapsed_time(None)
            .build();

        Self {
            max_attempts: config.max_attempts.max(1),
            attempts: 0,
            backoff,
        }
    }

    /// Count a call about to be made, returning its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Calls made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` when the failure is final:
    /// the error is fatal or the attempt budget is spent.
    pub fn next_delay(&mut self, error: &GenerationError) -> Option<Duration> {
        if !error.is_retryable() || self.attempts >= self.max_attempts {
            return None;
        }
        self.backoff.next_backoff()
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32, initial: f64, multiplier: f64, max_delay: f64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_secs: initial,
            multiplier,
            max_delay_secs: max_delay,
        }
    }

    fn retryable() -> GenerationError {
        GenerationError::Retryable { message: "429 Too Many Requests".into() }
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let mut schedule = RetrySchedule::new(&config(5, 20.0, 2.0, 75.0));
        let mut delays = Vec::new();
        for _ in 0..4 {
            schedule.begin_attempt();
            let delay = schedule.next_delay(&retryable()).unwrap();
            delays.push(delay.as_millis());
        }
        assert_eq!(delays, vec![20_000, 40_000, 75_000, 75_000]);

        schedule.begin_attempt();
        assert!(schedule.next_delay(&retryable()).is_none());
        assert_eq!(schedule.attempts(), 5);
    }

    #[test]
    fn test_fatal_error_stops_immediately() {
        let mut schedule = RetrySchedule::new(&config(3, 1.0, 2.0, 10.0));
        schedule.begin_attempt();
        let fatal = GenerationError::Fatal { message: "401 Unauthorized".into() };
        assert!(schedule.next_delay(&fatal).is_none());
    }

    #[test]
    fn test_zero_initial_delay_retries_immediately() {
        let mut schedule = RetrySchedule::new(&config(3, 0.0, 2.0, 10.0));
        schedule.begin_attempt();
        assert_eq!(schedule.next_delay(&retryable()), Some(Duration::ZERO));
        schedule.begin_attempt();
        assert_eq!(schedule.next_delay(&retryable()), Some(Duration::ZERO));
    }

    #[test]
    fn test_degenerate_settings_are_clamped() {
        let schedule = RetrySchedule::new(&config(0, -3.0, 0.5, -1.0));
        assert_eq!(schedule.max_attempts(), 1);
    }
}
