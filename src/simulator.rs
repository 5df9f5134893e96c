//! Synthetic sensor: a 24h sine around a base temperature plus gaussian noise

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

const DAY_SECS: f64 = 86_400.0;

pub struct SignalModel {
    base: f64,
    amp: f64,
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl SignalModel {
    pub fn new(base: f64, amp: f64, noise: f64) -> Self {
        Self::with_rng(base, amp, noise, StdRng::from_entropy())
    }

    /// Reproducible noise sequence
    pub fn with_seed(base: f64, amp: f64, noise: f64, seed: u64) -> Self {
        Self::with_rng(base, amp, noise, StdRng::seed_from_u64(seed))
    }

    /// A zero, negative or non-finite `noise` gives a clean curve
    fn with_rng(base: f64, amp: f64, noise: f64, rng: StdRng) -> Self {
        let noise = (noise > 0.0).then(|| Normal::new(0.0, noise).ok()).flatten();
        Self { base, amp, noise, rng }
    }

    /// Temperature `elapsed` seconds after the simulator started
    pub fn sample(&mut self, elapsed: f64) -> f64 {
        let daily = self.amp * (2.0 * PI * elapsed / DAY_SECS).sin();
        let noise = match &self.noise {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        };
        self.base + daily + noise
    }
}

/// One output line, three decimals
pub fn format_sample(value: f64) -> String {
    format!("{:.3}\n", value)
}
