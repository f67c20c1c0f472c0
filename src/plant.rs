use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// First-order lag vehicle model.
///
/// `mass * dv/dt = -drag * v + gain * drag * p`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantModel {
    pub mass: f64,
    pub drag: f64,
    pub gain: f64,
}

/// `x[i] = a * x[i-1] + c * u[i]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretization {
    pub a: f64,
    pub c: f64,
}

impl Discretization {
    pub fn step(&self, state: f64, control: f64) -> f64 {
        self.a * state + self.c * control
    }
}

impl Default for PlantModel {
    fn default() -> Self {
        Self {
            mass: 500.0,
            drag: 50.0,
            gain: 0.8,
        }
    }
}

impl PlantModel {
    pub fn new(mass: f64, drag: f64, gain: f64) -> Result<Self, ConfigError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(ConfigError::invalid("mass", format!("must be > 0, got {mass}")));
        }
        if !drag.is_finite() {
            return Err(ConfigError::invalid("drag", format!("must be finite, got {drag}")));
        }
        if !gain.is_finite() {
            return Err(ConfigError::invalid("gain", format!("must be finite, got {gain}")));
        }
        Ok(Self { mass, drag, gain })
    }

    pub fn residual(&self, state: f64, state_rate: f64, control: f64) -> f64 {
        self.mass * state_rate - (-self.drag * state + self.gain * self.drag * control)
    }

    /// Backward Euler: the residual is enforced at the end of every interval.
    pub fn discretize(&self, dt: f64) -> Discretization {
        let inertia = self.mass / dt;
        let den = inertia + self.drag;
        Discretization {
            a: inertia / den,
            c: self.gain * self.drag / den,
        }
    }

    pub fn steady_state(&self, control: f64) -> f64 {
        self.gain * control
    }

    /// Exact response over `dt` with the control held constant.
    pub fn propagate(&self, state: f64, control: f64, dt: f64) -> f64 {
        if self.drag == 0.0 {
            return state;
        }
        let v_ss = self.steady_state(control);
        v_ss + (state - v_ss) * (-self.drag * dt / self.mass).exp()
    }
}
