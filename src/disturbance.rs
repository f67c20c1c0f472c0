use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gaussian disturbance added to the simulated plant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gaussian {
    pub mean: f64,
    pub var: f64,
}

impl Gaussian {
    pub fn new(mean: f64, var: f64) -> Self {
        Self { mean, var }
    }
}

impl Default for Gaussian {
    fn default() -> Self {
        Self {
            mean: 0.0,
            var: 0.0,
        }
    }
}

/// Seeded sampler, so that closed-loop runs are reproducible.
pub struct Disturbance {
    rng: Xoshiro256PlusPlus,
    dist: Option<Normal<f64>>,
    mean: f64,
}

impl Disturbance {
    /// `None` if the variance is negative or not finite.
    pub fn new(noise: Gaussian, seed: u64) -> Option<Self> {
        if !(noise.var.is_finite() && noise.var >= 0.0 && noise.mean.is_finite()) {
            return None;
        }
        let dist = if noise.var > 0.0 {
            Some(Normal::new(noise.mean, noise.var.sqrt()).ok()?)
        } else {
            None
        };
        Some(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            dist,
            mean: noise.mean,
        })
    }

    pub fn sample(&mut self) -> f64 {
        match &self.dist {
            Some(dist) => dist.sample(&mut self.rng),
            None => self.mean,
        }
    }
}
