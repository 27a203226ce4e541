//! Simulated order-entry latency

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::config::types::SimulatorConfig;

/// Delay distribution in milliseconds
#[derive(Debug, Clone, Copy)]
pub enum LatencyDistribution {
    Fixed { ms: f64 },
    Normal { mean_ms: f64, std_dev_ms: f64 },
}

impl LatencyDistribution {
    fn sample_ms(&self, rng: &mut StdRng) -> f64 {
        match self {
            LatencyDistribution::Fixed { ms } => *ms,
            LatencyDistribution::Normal {
                mean_ms,
                std_dev_ms,
            } => match Normal::new(*mean_ms, *std_dev_ms) {
                Ok(dist) => dist.sample(rng),
                Err(_) => *mean_ms,
            },
        }
    }
}

/// Samples the delay between seeing a command and the order going live
#[derive(Debug, Clone)]
pub struct LatencyModel {
    distribution: LatencyDistribution,
    rng: StdRng,
    samples: u64,
    sum_ms: f64,
}

impl LatencyModel {
    pub fn new(distribution: LatencyDistribution, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            distribution,
            rng,
            samples: 0,
            sum_ms: 0.0,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(
            LatencyDistribution::Fixed {
                ms: delay.as_secs_f64() * 1000.0,
            },
            Some(0),
        )
    }

    /// Orders go live on the tick that sees them
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        let mean = config.latency_mean_ms;
        let std_dev = config.latency_std_dev_ms;
        let distribution = if std_dev > 0.0 && Normal::new(mean, std_dev).is_ok() {
            LatencyDistribution::Normal {
                mean_ms: mean,
                std_dev_ms: std_dev,
            }
        } else {
            if std_dev != 0.0 {
                warn!("Ignoring invalid latency std dev {}, using fixed delay", std_dev);
            }
            LatencyDistribution::Fixed { ms: mean }
        };
        Self::new(distribution, config.latency_seed)
    }

    /// Next delay; negative or non-finite draws clamp to zero
    pub fn sample(&mut self) -> Duration {
        let ms = self.distribution.sample_ms(&mut self.rng);
        let ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        self.samples += 1;
        self.sum_ms += ms;
        Duration::from_micros((ms * 1000.0).round() as u64)
    }

    pub fn average_ms(&self) -> f64 {
        if self.samples > 0 {
            self.sum_ms / self.samples as f64
        } else {
            0.0
        }
    }
}
