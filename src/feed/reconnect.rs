//! Reconnect policies for the feed supervisor

use std::time::Duration;

use crate::config::types::{BackoffStrategy, ReconnectConfig};

/// Decides how long to wait before the next connection attempt
pub trait ReconnectPolicy: Send {
    /// Delay before retry number `attempt` (1-based, consecutive failures),
    /// or `None` to stop retrying
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

/// Boxed policy for dynamic dispatch
pub type BoxedReconnectPolicy = Box<dyn ReconnectPolicy>;

/// Same delay before every attempt
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedBackoff {
    /// Retry forever
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectPolicy for FixedBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }
}

/// `base * multiplier^(attempt-1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier: multiplier.max(1.0),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = (self.base.as_millis() as f64) * self.multiplier.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

/// Build the configured policy; `max_attempts == 0` means retry forever
pub fn policy_from_config(config: &ReconnectConfig) -> BoxedReconnectPolicy {
    let delay = Duration::from_millis(config.delay_ms);
    match config.strategy {
        BackoffStrategy::Fixed => {
            let policy = FixedBackoff::unbounded(delay);
            if config.max_attempts == 0 {
                Box::new(policy)
            } else {
                Box::new(policy.with_max_attempts(config.max_attempts))
            }
        }
        BackoffStrategy::Exponential => {
            let policy = ExponentialBackoff::new(
                delay,
                Duration::from_millis(config.max_delay_ms),
                config.multiplier,
            );
            if config.max_attempts == 0 {
                Box::new(policy)
            } else {
                Box::new(policy.with_max_attempts(config.max_attempts))
            }
        }
    }
}
