//! Invocation of the external PANOC solver.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use optimization_engine::{panoc::*, *};
use serde::{Deserialize, Serialize};

use crate::constraints::RateLimitedBox;
use crate::error::ConfigError;
use crate::grid::HorizonGrid;
use crate::mpc::TrackingCost;
use crate::plant::PlantModel;
use crate::variables::{ControlVariable, TrackedVariable};

/// Accepted bound/rate violation of a returned solution.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Success,
    /// No control sequence satisfies the bounds and rate limits.
    Infeasible,
    /// The solver stopped on its iteration/time limit or reported an error.
    NotConverged,
    /// Non-finite measurement or tuning.
    InputError,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Success)
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            SolveStatus::Success => 0,
            SolveStatus::Infeasible => 2,
            SolveStatus::NotConverged => 3,
            SolveStatus::InputError => 4,
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Success => "success",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::NotConverged => "not converged",
            SolveStatus::InputError => "input error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub tolerance: f64,
    pub lbfgs_memory: usize,
    pub max_iter: usize,
    /// Wall-clock limit per solve; unlimited when `None`.
    pub max_duration_secs: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            lbfgs_memory: 20,
            max_iter: 5000,
            max_duration_secs: None,
        }
    }
}

impl SolverOptions {
    // PANOC は不正な設定で assert するので構築時に弾く
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::invalid(
                "tolerance",
                format!("must be > 0, got {}", self.tolerance),
            ));
        }
        if self.lbfgs_memory == 0 {
            return Err(ConfigError::invalid("lbfgs_memory", "must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::invalid("max_iter", "must be > 0"));
        }
        if let Some(secs) = self.max_duration_secs {
            if !(secs.is_finite() && secs >= 0.0) {
                return Err(ConfigError::invalid(
                    "max_duration_secs",
                    format!("must be finite and >= 0, got {secs}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub control: Vec<f64>,
    pub state: Vec<f64>,
    /// Reference the tracking cost was evaluated against.
    pub reference: Vec<f64>,
    pub iterations: usize,
    pub cost: f64,
    pub solve_time: Duration,
}

// p[0], v[0] は固定; 決定変数は p[1..n]
pub fn solve_horizon(
    grid: &HorizonGrid,
    plant: &PlantModel,
    control: &ControlVariable,
    tracked: &TrackedVariable,
    options: &SolverOptions,
) -> Result<SolverOutput, SolveStatus> {
    let p0 = control.current();
    let v0 = tracked.current();
    if !p0.is_finite() || !v0.is_finite() {
        warn!("non-finite initial condition: p0 = {p0}, v0 = {v0}");
        return Err(SolveStatus::InputError);
    }
    if control.validate().is_err() || tracked.validate().is_err() {
        return Err(SolveStatus::InputError);
    }
    if let Err(e) = options.validate() {
        warn!("{e}");
        return Err(SolveStatus::InputError);
    }

    let (lower, upper) = control.bounds();
    let bounds = RateLimitedBox::new(lower, upper, control.rate_limit(), p0);
    if !bounds.is_feasible() {
        warn!("current control {p0} lies outside [{lower}, {upper}]");
        return Err(SolveStatus::Infeasible);
    }

    let reference = tracked.reference(grid);
    let disc = plant.discretize(grid.dt());
    let n = grid.len() - 1;
    let tracking_weight = if tracked.include_in_cost() {
        tracked.weight()
    } else {
        0.0
    };
    let rate_weight = if control.optimize() {
        control.rate_weight()
    } else {
        0.0
    };
    let cost = TrackingCost::new(&disc, v0, p0, &reference[1..], tracking_weight, rate_weight);

    // 初期値は前回入力の保持; 毎回同じ初期値とキャッシュで解くので結果は決定的
    let mut u = vec![p0; n];
    let now = std::time::Instant::now();
    let iterations = if control.optimize() {
        let f = |u: &[f64], c: &mut f64| -> Result<(), SolverError> {
            *c = cost.cost(u);
            Ok(())
        };
        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            cost.gradient(u, grad);
            Ok(())
        };

        let mut panoc_cache = PANOCCache::new(n, options.tolerance, options.lbfgs_memory);
        let problem = Problem::new(&bounds, df, f);
        let mut panoc =
            PANOCOptimizer::new(problem, &mut panoc_cache).with_max_iter(options.max_iter);
        if let Some(secs) = options.max_duration_secs {
            panoc = panoc.with_max_duration(Duration::from_secs_f64(secs));
        }

        let status = match panoc.solve(&mut u) {
            Ok(status) => status,
            Err(e) => {
                warn!("solver error: {e:?}");
                return Err(SolveStatus::NotConverged);
            }
        };
        debug!(
            "panoc: converged = {}, iterations = {}, fpr = {:.3e}, cost = {:.6}",
            status.has_converged(),
            status.iterations(),
            status.norm_fpr(),
            status.cost_value()
        );
        if !status.has_converged() {
            warn!(
                "solver stopped after {} iterations (fpr = {:.3e})",
                status.iterations(),
                status.norm_fpr()
            );
            return Err(SolveStatus::NotConverged);
        }
        status.iterations()
    } else {
        0
    };
    let solve_time = now.elapsed();

    if u.iter().any(|x| !x.is_finite()) {
        warn!("solver returned a non-finite control sequence");
        return Err(SolveStatus::NotConverged);
    }
    let violation = bounds.violation(&u);
    if violation > FEASIBILITY_TOLERANCE {
        warn!("solution violates bounds or rate limit by {violation:.3e}");
        return Err(SolveStatus::NotConverged);
    }

    let predicted = cost.predict(&u);
    let mut control_traj = Vec::with_capacity(n + 1);
    control_traj.push(p0);
    control_traj.extend_from_slice(&u);
    let mut state_traj = Vec::with_capacity(n + 1);
    state_traj.push(v0);
    state_traj.extend(predicted.iter().copied());

    Ok(SolverOutput {
        control: control_traj,
        state: state_traj,
        reference,
        iterations,
        cost: cost.cost(&u),
        solve_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> (HorizonGrid, PlantModel, ControlVariable, TrackedVariable) {
        let grid = HorizonGrid::new(0.0, 20.0, 41).unwrap();
        let control = ControlVariable::new("p", 0.0, grid.len())
            .with_bounds(0.0, 100.0)
            .with_rate_weight(0.1)
            .with_rate_limit(20.0);
        let tracked = TrackedVariable::new("v", 0.0, grid.len())
            .with_set_point(40.0)
            .with_shaping(5.0);
        (grid, PlantModel::default(), control, tracked)
    }

    #[test]
    fn test_default_options_are_valid() {
        assert!(SolverOptions::default().validate().is_ok());
        let options = SolverOptions {
            max_duration_secs: Some(0.0),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let invalid = [
            SolverOptions {
                tolerance: 0.0,
                ..Default::default()
            },
            SolverOptions {
                tolerance: -1e-6,
                ..Default::default()
            },
            SolverOptions {
                tolerance: f64::NAN,
                ..Default::default()
            },
            SolverOptions {
                lbfgs_memory: 0,
                ..Default::default()
            },
            SolverOptions {
                max_iter: 0,
                ..Default::default()
            },
            SolverOptions {
                max_duration_secs: Some(-1.0),
                ..Default::default()
            },
            SolverOptions {
                max_duration_secs: Some(f64::INFINITY),
                ..Default::default()
            },
        ];
        for options in &invalid {
            assert!(
                matches!(options.validate(), Err(ConfigError::InvalidValue { .. })),
                "{options:?}"
            );
        }
    }

    #[test]
    fn test_invalid_options_do_not_reach_solver() {
        let (grid, plant, control, tracked) = scenario();
        let options = SolverOptions {
            max_iter: 0,
            ..Default::default()
        };
        let result = solve_horizon(&grid, &plant, &control, &tracked, &options);
        assert_eq!(result, Err(SolveStatus::InputError));
    }

    #[test]
    fn test_iteration_limit_is_not_converged() {
        let (grid, plant, control, tracked) = scenario();
        let options = SolverOptions {
            max_iter: 1,
            ..Default::default()
        };
        let result = solve_horizon(&grid, &plant, &control, &tracked, &options);
        assert_eq!(result, Err(SolveStatus::NotConverged));
        assert_eq!(SolveStatus::NotConverged.exit_code(), 3);
    }
}
