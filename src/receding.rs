//! Receding-horizon closed loop.
//!
//! Every step solves the full horizon, applies only the first optimized move
//! to the simulated plant, and re-solves from the new measurement.

use log::{debug, info};

use crate::disturbance::{Disturbance, Gaussian};
use crate::error::{ConfigError, ProblemError};
use crate::problem::MpcProblem;
use crate::solver::SolveStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedLoop {
    pub steps: usize,
    /// Added to the plant velocity after every step.
    pub disturbance: Gaussian,
    pub seed: u64,
}

/// Applied controls and measured states of a closed-loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoopTrace {
    pub time: Vec<f64>,
    pub control: Vec<f64>,
    pub state: Vec<f64>,
    pub set_point: f64,
    pub control_bounds: (f64, f64),
    /// Status of the last solve; the run stops at the first failure.
    pub status: SolveStatus,
}

impl ClosedLoop {
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            disturbance: Gaussian::default(),
            seed: 0,
        }
    }

    pub fn with_disturbance(mut self, disturbance: Gaussian, seed: u64) -> Self {
        self.disturbance = disturbance;
        self.seed = seed;
        self
    }

    pub fn run(&self, problem: &mut MpcProblem) -> Result<ClosedLoopTrace, ProblemError> {
        let mut noise = Disturbance::new(self.disturbance, self.seed).ok_or_else(|| {
            ConfigError::invalid(
                "disturbance",
                format!("variance must be finite and >= 0, got {}", self.disturbance.var),
            )
        })?;

        let dt = problem.grid().dt();
        let plant = *problem.plant();
        let mut t = problem.grid().t0();
        let mut v = problem.tracked().current();
        let mut p = problem.control().current();

        let mut trace = ClosedLoopTrace {
            time: vec![t],
            control: vec![p],
            state: vec![v],
            set_point: problem.tracked().set_point(),
            control_bounds: problem.control().bounds(),
            status: SolveStatus::Success,
        };

        for k in 0..self.steps {
            let status = problem.solve();
            if !status.is_success() {
                info!("closed loop stopped at step {k}: {status}");
                trace.status = status;
                break;
            }

            // 先頭の操作量のみ適用
            p = problem.control().value()[1];
            v = plant.propagate(v, p, dt) + noise.sample();
            t += dt;
            debug!("t = {t:6.2}, p = {p:7.3}, v = {v:7.3}");

            trace.time.push(t);
            trace.control.push(p);
            trace.state.push(v);

            problem.set_initial_state(v)?;
            problem.set_initial_control(p)?;
        }

        Ok(trace)
    }
}
