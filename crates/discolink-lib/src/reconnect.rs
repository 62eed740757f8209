//! Reconnection backoff for broker and network attach failures.
//!
//! The first attempt after a healthy period always goes through immediately.
//! Only repeated failures are spaced out, growing geometrically up to a
//! ceiling, so a dead access point is not hammered in a tight loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait imposed by the first failure.
    pub initial_delay: Duration,
    /// Ceiling for the wait.
    pub max_delay: Duration,
    /// Growth factor per additional failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Wait after the `failures`-th consecutive failure (1-based).
    fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let steps = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(steps);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Failure counter plus the earliest instant the next attempt may run.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    failures: u32,
    not_before: Option<Instant>,
}

impl ReconnectState {
    pub fn new(config: ReconnectConfig) -> Self {
        ReconnectState {
            config,
            failures: 0,
            not_before: None,
        }
    }

    pub fn should_attempt(&self, now: Instant) -> bool {
        self.not_before.is_none_or(|t| now >= t)
    }

    /// Time left before the next attempt is allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.not_before
            .map_or(Duration::ZERO, |t| t.saturating_duration_since(now))
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        self.not_before = Some(now + self.current_delay());
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.not_before = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Wait imposed by the most recent failure; zero while healthy.
    pub fn current_delay(&self) -> Duration {
        self.config.delay_after(self.failures)
    }
}
