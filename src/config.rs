//! Run configuration.
//!
//! Every field has a default, so a JSON file only needs the values it changes.
//! The defaults reproduce the cruise-control scenario.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::disturbance::Gaussian;
use crate::error::ConfigError;
use crate::grid::HorizonGrid;
use crate::plant::PlantModel;
use crate::problem::MpcProblem;
use crate::receding::ClosedLoop;
use crate::solver::SolverOptions;
use crate::variables::{ControlVariable, TrackedVariable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One solve over the whole horizon, reported as is.
    #[default]
    Full,
    /// Apply the first move, advance the plant, re-solve.
    Receding,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseConfig {
    pub mode: Mode,
    pub horizon: HorizonConfig,
    pub plant: PlantModel,
    pub pedal: ControlConfig,
    pub velocity: TrackedConfig,
    pub solver: SolverOptions,
    pub closed_loop: ClosedLoopConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub t0: f64,
    pub tf: f64,
    pub steps: usize,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            tf: 20.0,
            steps: 41,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub name: String,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
    pub rate_weight: f64,
    pub rate_limit: f64,
    pub optimize: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            name: "p".to_string(),
            initial: 0.0,
            lower: 0.0,
            upper: 100.0,
            rate_weight: 0.1,
            rate_limit: 20.0,
            optimize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackedConfig {
    pub name: String,
    pub initial: f64,
    pub set_point: f64,
    /// Shaping time constant; `None` tracks the set point as a step.
    pub tau: Option<f64>,
    pub include_in_cost: bool,
    pub weight: f64,
}

impl Default for TrackedConfig {
    fn default() -> Self {
        Self {
            name: "v".to_string(),
            initial: 0.0,
            set_point: 40.0,
            tau: Some(5.0),
            include_in_cost: true,
            weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosedLoopConfig {
    pub steps: usize,
    pub disturbance: Gaussian,
    pub seed: u64,
}

impl Default for ClosedLoopConfig {
    fn default() -> Self {
        Self {
            steps: 40,
            disturbance: Gaussian::default(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for `results.json`; no artifact is written when unset.
    pub artifact_dir: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub plot: Option<PathBuf>,
}

impl CruiseConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn build_problem(&self) -> Result<MpcProblem, ConfigError> {
        let h = &self.horizon;
        let grid = HorizonGrid::new(h.t0, h.tf, h.steps)?;
        let plant = PlantModel::new(self.plant.mass, self.plant.drag, self.plant.gain)?;

        let c = &self.pedal;
        let control = ControlVariable::new(c.name.clone(), c.initial, grid.len())
            .with_bounds(c.lower, c.upper)
            .with_rate_weight(c.rate_weight)
            .with_rate_limit(c.rate_limit)
            .with_optimize(c.optimize);

        let v = &self.velocity;
        let mut tracked = TrackedVariable::new(v.name.clone(), v.initial, grid.len())
            .with_set_point(v.set_point)
            .with_include_in_cost(v.include_in_cost)
            .with_weight(v.weight);
        if let Some(tau) = v.tau {
            tracked = tracked.with_shaping(tau);
        }

        let mut problem =
            MpcProblem::new(grid, plant, control, tracked)?.with_options(self.solver.clone())?;
        if let Some(dir) = &self.output.artifact_dir {
            problem = problem.with_artifact_dir(dir);
        }
        Ok(problem)
    }

    pub fn closed_loop(&self) -> ClosedLoop {
        ClosedLoop::new(self.closed_loop.steps)
            .with_disturbance(self.closed_loop.disturbance, self.closed_loop.seed)
    }
}
