//! Reconnect delay policies for the broker session.
//!
//! The supervisor asks its policy for a delay after every lost session and
//! resets it once a session has stayed up for a while.

use std::time::Duration;

pub trait ReconnectPolicy {
    /// Delay before the next connection attempt. Advances the policy.
    fn next_delay(&mut self) -> Duration;
    /// Called after a session stayed up long enough to count as healthy.
    fn reset(&mut self);
}

impl<P: ReconnectPolicy + ?Sized> ReconnectPolicy for Box<P> {
    fn next_delay(&mut self) -> Duration {
        (**self).next_delay()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// The same delay every time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.0
    }

    fn reset(&mut self) {}
}

/// Configuration for exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failure (typically 2.0).
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// Exponential backoff capped at `max_delay`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_delay: Duration,
    consecutive_failures: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_delay: config.initial_delay,
            config,
            consecutive_failures: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BackoffConfig::default())
    }

    /// Number of delays handed out since the last reset.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.consecutive_failures += 1;

        // current_delay *= multiplier, capped at max_delay
        let next = self.current_delay.as_secs_f64() * self.config.multiplier;
        self.current_delay = Duration::try_from_secs_f64(next)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        delay
    }

    fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay = self.config.initial_delay;
    }
}
