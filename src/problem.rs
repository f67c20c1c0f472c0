use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::artifact::ResultArtifact;
use crate::error::{ConfigError, ProblemError};
use crate::grid::HorizonGrid;
use crate::plant::PlantModel;
use crate::solver::{solve_horizon, SolveStatus, SolverOptions, SolverOutput};
use crate::variables::{ControlVariable, TrackedVariable};

pub const RESULTS_FILE: &str = "results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemState {
    Configured,
    Solving,
    Solved,
    Failed,
}

#[derive(Debug, Clone)]
pub struct MpcProblem {
    grid: HorizonGrid,
    plant: PlantModel,
    control: ControlVariable,
    tracked: TrackedVariable,
    options: SolverOptions,
    artifact_dir: Option<PathBuf>,
    state: ProblemState,
    status: Option<SolveStatus>,
    output: Option<SolverOutput>,
}

impl MpcProblem {
    pub fn new(
        grid: HorizonGrid,
        plant: PlantModel,
        control: ControlVariable,
        tracked: TrackedVariable,
    ) -> Result<Self, ConfigError> {
        control.validate()?;
        tracked.validate()?;
        for (field, len) in [("control", control.value.len()), ("tracked", tracked.value.len())] {
            if len != grid.len() {
                return Err(ConfigError::invalid(
                    field,
                    format!("trajectory has {len} points, grid has {}", grid.len()),
                ));
            }
        }
        Ok(Self {
            grid,
            plant,
            control,
            tracked,
            options: SolverOptions::default(),
            artifact_dir: None,
            state: ProblemState::Configured,
            status: None,
            output: None,
        })
    }

    pub fn with_options(mut self, options: SolverOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn grid(&self) -> &HorizonGrid {
        &self.grid
    }

    pub fn plant(&self) -> &PlantModel {
        &self.plant
    }

    pub fn control(&self) -> &ControlVariable {
        &self.control
    }

    pub fn tracked(&self) -> &TrackedVariable {
        &self.tracked
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn state(&self) -> ProblemState {
        self.state
    }

    /// Status of the last solve, `None` before the first one.
    pub fn status(&self) -> Option<SolveStatus> {
        self.status
    }

    pub fn output(&self) -> Option<&SolverOutput> {
        self.output.as_ref()
    }

    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.artifact_dir.as_ref().map(|dir| dir.join(RESULTS_FILE))
    }

    /// Reopen a solved or failed problem for tuning changes.
    pub fn reconfigure(&mut self) -> Result<(), ProblemError> {
        match self.state {
            ProblemState::Solving => Err(ProblemError::Busy),
            _ => {
                self.state = ProblemState::Configured;
                Ok(())
            }
        }
    }

    fn tuning(&mut self) -> Result<(), ProblemError> {
        match self.state {
            ProblemState::Configured => Ok(()),
            state => Err(ProblemError::NotConfigured(state)),
        }
    }

    pub fn set_set_point(&mut self, set_point: f64) -> Result<(), ProblemError> {
        self.tuning()?;
        let tracked = self.tracked.clone().with_set_point(set_point);
        tracked.validate()?;
        self.tracked = tracked;
        Ok(())
    }

    /// `None` disables trajectory shaping.
    pub fn set_shaping(&mut self, time_constant: Option<f64>) -> Result<(), ProblemError> {
        self.tuning()?;
        let mut tracked = self.tracked.clone();
        match time_constant {
            Some(tau) => tracked = tracked.with_shaping(tau),
            None => tracked.trajectory_shaping = false,
        }
        tracked.validate()?;
        self.tracked = tracked;
        Ok(())
    }

    pub fn set_tracking(&mut self, include_in_cost: bool, weight: f64) -> Result<(), ProblemError> {
        self.tuning()?;
        let tracked = self
            .tracked
            .clone()
            .with_include_in_cost(include_in_cost)
            .with_weight(weight);
        tracked.validate()?;
        self.tracked = tracked;
        Ok(())
    }

    pub fn set_control_bounds(&mut self, lower: f64, upper: f64) -> Result<(), ProblemError> {
        self.tuning()?;
        let control = self.control.clone().with_bounds(lower, upper);
        control.validate()?;
        self.control = control;
        Ok(())
    }

    pub fn set_rate_weight(&mut self, weight: f64) -> Result<(), ProblemError> {
        self.tuning()?;
        let control = self.control.clone().with_rate_weight(weight);
        control.validate()?;
        self.control = control;
        Ok(())
    }

    pub fn set_rate_limit(&mut self, limit: f64) -> Result<(), ProblemError> {
        self.tuning()?;
        let control = self.control.clone().with_rate_limit(limit);
        control.validate()?;
        self.control = control;
        Ok(())
    }

    pub fn set_options(&mut self, options: SolverOptions) -> Result<(), ProblemError> {
        self.tuning()?;
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn set_optimize(&mut self, optimize: bool) -> Result<(), ProblemError> {
        self.tuning()?;
        self.control.optimize = optimize;
        Ok(())
    }

    pub fn set_initial_state(&mut self, state: f64) -> Result<(), ProblemError> {
        if self.state == ProblemState::Solving {
            return Err(ProblemError::Busy);
        }
        self.tracked.value[0] = state;
        Ok(())
    }

    pub fn set_initial_control(&mut self, control: f64) -> Result<(), ProblemError> {
        if self.state == ProblemState::Solving {
            return Err(ProblemError::Busy);
        }
        self.control.value[0] = control;
        Ok(())
    }

    // 失敗時は前回の軌道をそのまま残す
    pub fn solve(&mut self) -> SolveStatus {
        if self.state == ProblemState::Solving {
            warn!("solve() called on a problem that is already solving");
            return SolveStatus::InputError;
        }
        self.state = ProblemState::Solving;

        let result = solve_horizon(
            &self.grid,
            &self.plant,
            &self.control,
            &self.tracked,
            &self.options,
        );

        let status = match result {
            Ok(output) => {
                info!(
                    "solved in {} iterations ({:.1} ms), cost = {:.4}",
                    output.iterations,
                    output.solve_time.as_secs_f64() * 1e3,
                    output.cost
                );
                self.control.value.copy_from_slice(&output.control);
                self.tracked.value.copy_from_slice(&output.state);
                if let Some(path) = self.artifact_path() {
                    self.write_artifact(&path, &output);
                }
                self.output = Some(output);
                self.state = ProblemState::Solved;
                SolveStatus::Success
            }
            Err(status) => {
                warn!("MPC solve failed: {status}");
                self.state = ProblemState::Failed;
                status
            }
        };
        self.status = Some(status);
        status
    }

    // 前回の結果を残さない: 書き込みに失敗したら artifact は存在しない
    fn write_artifact(&self, path: &Path, output: &SolverOutput) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove previous artifact {}: {e}", path.display());
            }
        }
        let artifact = ResultArtifact::from_output(
            self.grid.points(),
            self.control.name(),
            self.tracked.name(),
            output,
        );
        if let Err(e) = artifact.write(path) {
            warn!("could not write result artifact {}: {e}", path.display());
            std::fs::remove_file(path).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> MpcProblem {
        let grid = HorizonGrid::new(0.0, 10.0, 11).unwrap();
        let control = ControlVariable::new("p", 0.0, grid.len())
            .with_bounds(0.0, 100.0)
            .with_rate_weight(0.1)
            .with_rate_limit(20.0);
        let tracked = TrackedVariable::new("v", 0.0, grid.len())
            .with_set_point(20.0)
            .with_shaping(2.0);
        MpcProblem::new(grid, PlantModel::default(), control, tracked).unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut mpc = problem();
        assert_eq!(mpc.state(), ProblemState::Configured);
        assert_eq!(mpc.status(), None);

        assert_eq!(mpc.solve(), SolveStatus::Success);
        assert_eq!(mpc.state(), ProblemState::Solved);
        assert!(mpc.output().is_some());

        // 解いた後は再設定が必要
        assert!(matches!(
            mpc.set_set_point(30.0),
            Err(ProblemError::NotConfigured(ProblemState::Solved))
        ));
        mpc.reconfigure().unwrap();
        mpc.set_set_point(30.0).unwrap();
        assert_eq!(mpc.tracked().set_point(), 30.0);
    }

    #[test]
    fn test_measurements_update_after_solve() {
        let mut mpc = problem();
        mpc.solve();
        mpc.set_initial_state(5.0).unwrap();
        mpc.set_initial_control(10.0).unwrap();
        assert_eq!(mpc.tracked().current(), 5.0);
        assert_eq!(mpc.control().current(), 10.0);
    }

    #[test]
    fn test_infeasible_keeps_previous_trajectories() {
        let mut mpc = problem();
        assert!(mpc.solve().is_success());
        let control = mpc.control().value().to_vec();
        let state = mpc.tracked().value().to_vec();

        // 前回入力が上限の外
        mpc.set_initial_control(150.0).unwrap();
        assert_eq!(mpc.solve(), SolveStatus::Infeasible);
        assert_eq!(mpc.state(), ProblemState::Failed);
        assert_eq!(&mpc.control().value()[1..], &control[1..]);
        assert_eq!(&mpc.tracked().value()[1..], &state[1..]);
    }

    #[test]
    fn test_non_finite_measurement() {
        let mut mpc = problem();
        mpc.set_initial_state(f64::NAN).unwrap();
        assert_eq!(mpc.solve(), SolveStatus::InputError);
        assert_eq!(mpc.status(), Some(SolveStatus::InputError));
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let mut mpc = problem();
        assert!(matches!(
            mpc.set_control_bounds(50.0, 10.0),
            Err(ProblemError::Config(_))
        ));
        assert!(mpc.set_rate_limit(-1.0).is_err());
        // 失敗した変更は反映されない
        assert_eq!(mpc.control().bounds(), (0.0, 100.0));
        assert_eq!(mpc.control().rate_limit(), 20.0);
    }

    #[test]
    fn test_hold_control_when_not_optimized() {
        let mut mpc = problem();
        mpc.set_initial_control(50.0).unwrap();
        mpc.set_optimize(false).unwrap();
        assert!(mpc.solve().is_success());
        assert!(mpc.control().value().iter().all(|&p| p == 50.0));
        let v = mpc.tracked().value();
        assert!(v.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_invalid_options_rejected_at_construction() {
        let options = SolverOptions {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            problem().with_options(options),
            Err(ConfigError::InvalidValue { field: "tolerance", .. })
        ));

        let mut mpc = problem();
        let options = SolverOptions {
            lbfgs_memory: 0,
            ..Default::default()
        };
        assert!(matches!(mpc.set_options(options), Err(ProblemError::Config(_))));
        assert_eq!(mpc.options(), &SolverOptions::default());
        assert_eq!(mpc.solve(), SolveStatus::Success);
    }

    #[test]
    fn test_not_converged_keeps_previous_trajectories() {
        let mut mpc = problem();
        assert!(mpc.solve().is_success());
        let control = mpc.control().value().to_vec();
        let state = mpc.tracked().value().to_vec();

        mpc.reconfigure().unwrap();
        mpc.set_options(SolverOptions {
            max_iter: 1,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(mpc.solve(), SolveStatus::NotConverged);
        assert_eq!(mpc.state(), ProblemState::Failed);
        assert_eq!(mpc.control().value(), control.as_slice());
        assert_eq!(mpc.tracked().value(), state.as_slice());
    }

    #[test]
    fn test_grid_length_mismatch() {
        let grid = HorizonGrid::new(0.0, 10.0, 11).unwrap();
        let control = ControlVariable::new("p", 0.0, 5);
        let tracked = TrackedVariable::new("v", 0.0, grid.len());
        assert!(MpcProblem::new(grid, PlantModel::default(), control, tracked).is_err());
    }
}
