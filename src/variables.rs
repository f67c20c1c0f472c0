//! Manipulated and controlled variables.
//!
//! Both types only hold tuning and trajectories; the problem does the work.

use crate::error::ConfigError;
use crate::grid::HorizonGrid;

/// Manipulated variable (MV), e.g. the gas pedal.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlVariable {
    pub(crate) name: String,
    pub(crate) value: Vec<f64>,
    pub(crate) lower_bound: f64,
    pub(crate) upper_bound: f64,
    pub(crate) rate_weight: f64,
    pub(crate) rate_limit: f64,
    pub(crate) optimize: bool,
}

impl ControlVariable {
    pub fn new(name: impl Into<String>, initial: f64, len: usize) -> Self {
        Self {
            name: name.into(),
            value: vec![initial; len],
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
            rate_weight: 0.0,
            rate_limit: f64::INFINITY,
            optimize: true,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    pub fn with_rate_weight(mut self, weight: f64) -> Self {
        self.rate_weight = weight;
        self
    }

    pub fn with_rate_limit(mut self, limit: f64) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lower_bound.is_nan() || self.upper_bound.is_nan() {
            return Err(ConfigError::invalid("control bounds", "bounds must not be NaN"));
        }
        if self.lower_bound > self.upper_bound {
            return Err(ConfigError::invalid(
                "control bounds",
                format!("lower ({}) > upper ({})", self.lower_bound, self.upper_bound),
            ));
        }
        if !(self.rate_weight.is_finite() && self.rate_weight >= 0.0) {
            return Err(ConfigError::invalid(
                "rate_weight",
                format!("must be finite and >= 0, got {}", self.rate_weight),
            ));
        }
        if self.rate_limit.is_nan() || self.rate_limit <= 0.0 {
            return Err(ConfigError::invalid(
                "rate_limit",
                format!("must be > 0, got {}", self.rate_limit),
            ));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn current(&self) -> f64 {
        self.value[0]
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }

    pub fn rate_weight(&self) -> f64 {
        self.rate_weight
    }

    pub fn rate_limit(&self) -> f64 {
        self.rate_limit
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }
}

/// Controlled variable (CV), e.g. the vehicle velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVariable {
    pub(crate) name: String,
    pub(crate) value: Vec<f64>,
    pub(crate) set_point: f64,
    pub(crate) trajectory_shaping: bool,
    pub(crate) shaping_time_constant: f64,
    pub(crate) include_in_cost: bool,
    pub(crate) weight: f64,
}

impl TrackedVariable {
    pub fn new(name: impl Into<String>, initial: f64, len: usize) -> Self {
        Self {
            name: name.into(),
            value: vec![initial; len],
            set_point: initial,
            trajectory_shaping: false,
            shaping_time_constant: 1.0,
            include_in_cost: true,
            weight: 1.0,
        }
    }

    pub fn with_set_point(mut self, set_point: f64) -> Self {
        self.set_point = set_point;
        self
    }

    /// Track a first-order approach to the set point instead of a step.
    pub fn with_shaping(mut self, time_constant: f64) -> Self {
        self.trajectory_shaping = true;
        self.shaping_time_constant = time_constant;
        self
    }

    pub fn with_include_in_cost(mut self, include: bool) -> Self {
        self.include_in_cost = include;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.set_point.is_finite() {
            return Err(ConfigError::invalid(
                "set_point",
                format!("must be finite, got {}", self.set_point),
            ));
        }
        if self.trajectory_shaping
            && !(self.shaping_time_constant.is_finite() && self.shaping_time_constant > 0.0)
        {
            return Err(ConfigError::invalid(
                "shaping_time_constant",
                format!("must be > 0, got {}", self.shaping_time_constant),
            ));
        }
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err(ConfigError::invalid(
                "weight",
                format!("must be finite and >= 0, got {}", self.weight),
            ));
        }
        Ok(())
    }

    /// Target the cost penalizes against at every grid point.
    ///
    /// Starts at the current measured value when shaping is enabled.
    pub fn reference(&self, grid: &HorizonGrid) -> Vec<f64> {
        if !self.trajectory_shaping {
            return vec![self.set_point; grid.len()];
        }
        let v0 = self.current();
        let t0 = grid.t0();
        grid.points()
            .iter()
            .map(|t| {
                self.set_point
                    - (self.set_point - v0) * (-(t - t0) / self.shaping_time_constant).exp()
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn current(&self) -> f64 {
        self.value[0]
    }

    pub fn set_point(&self) -> f64 {
        self.set_point
    }

    pub fn trajectory_shaping(&self) -> bool {
        self.trajectory_shaping
    }

    pub fn shaping_time_constant(&self) -> f64 {
        self.shaping_time_constant
    }

    pub fn include_in_cost(&self) -> bool {
        self.include_in_cost
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}
