use std::path::PathBuf;

use log::warn;

use crate::artifact::ResultArtifact;
use crate::error::ArtifactUnavailable;
use crate::problem::MpcProblem;
use crate::solver::SolveStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub time: Vec<f64>,
    pub control: Vec<f64>,
    pub state: Vec<f64>,
    pub reference: Vec<f64>,
    pub set_point: f64,
    pub control_bounds: (f64, f64),
    /// The reference is a flat set point standing in for the real one.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSource {
    InProcess,
    Artifact(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultExtractor {
    source: ReferenceSource,
}

impl ResultExtractor {
    pub fn in_process() -> Self {
        Self {
            source: ReferenceSource::InProcess,
        }
    }

    pub fn from_artifact(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ReferenceSource::Artifact(path.into()),
        }
    }

    pub fn for_problem(problem: &MpcProblem) -> Self {
        match problem.artifact_path() {
            Some(path) => Self::from_artifact(path),
            None => Self::in_process(),
        }
    }

    pub fn source(&self) -> &ReferenceSource {
        &self.source
    }

    /// Never fails: an unavailable reference is replaced by the set point.
    /// A problem that was never solved reports `InputError`.
    pub fn extract(&self, problem: &MpcProblem) -> SolveResult {
        let grid = problem.grid();
        let tracked = problem.tracked();
        let control = problem.control();
        let status = problem.status().unwrap_or(SolveStatus::InputError);

        let reference = if status.is_success() {
            match self.reference(problem) {
                Ok(reference) => Some(reference),
                Err(e) => {
                    warn!("Could not load reference trajectory, using set point: {e}");
                    None
                }
            }
        } else {
            None
        };
        let degraded = reference.is_none();
        let reference = reference.unwrap_or_else(|| vec![tracked.set_point(); grid.len()]);

        SolveResult {
            status,
            time: grid.points().to_vec(),
            control: control.value().to_vec(),
            state: tracked.value().to_vec(),
            reference,
            set_point: tracked.set_point(),
            control_bounds: control.bounds(),
            degraded,
        }
    }

    fn reference(&self, problem: &MpcProblem) -> Result<Vec<f64>, ArtifactUnavailable> {
        let len = problem.grid().len();
        match &self.source {
            ReferenceSource::InProcess => {
                let output = problem.output().ok_or(ArtifactUnavailable::NotProduced)?;
                if output.reference.len() != len {
                    return Err(ArtifactUnavailable::LengthMismatch {
                        expected: len,
                        got: output.reference.len(),
                    });
                }
                Ok(output.reference.clone())
            }
            ReferenceSource::Artifact(path) => {
                let artifact = ResultArtifact::load(path)?;
                let tracked = problem.tracked();
                Ok(artifact
                    .reference(tracked.name(), problem.grid().points(), tracked.value())?
                    .to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::HorizonGrid;
    use crate::plant::PlantModel;
    use crate::variables::{ControlVariable, TrackedVariable};

    fn problem() -> MpcProblem {
        let grid = HorizonGrid::new(0.0, 5.0, 11).unwrap();
        let control = ControlVariable::new("p", 0.0, grid.len())
            .with_bounds(0.0, 100.0)
            .with_rate_limit(20.0)
            .with_rate_weight(0.1);
        let tracked = TrackedVariable::new("v", 0.0, grid.len())
            .with_set_point(40.0)
            .with_shaping(5.0);
        MpcProblem::new(grid, PlantModel::default(), control, tracked).unwrap()
    }

    #[test]
    fn test_in_process_reference() {
        let mut mpc = problem();
        assert!(mpc.solve().is_success());
        let extractor = ResultExtractor::for_problem(&mpc);
        assert_eq!(extractor.source(), &ReferenceSource::InProcess);
        let result = extractor.extract(&mpc);
        assert!(!result.degraded);
        assert_eq!(result.reference, mpc.tracked().reference(mpc.grid()));
        assert_eq!(result.time.len(), 11);
    }

    #[test]
    fn test_fallback_on_missing_artifact() {
        let mut mpc = problem();
        assert!(mpc.solve().is_success());
        let extractor = ResultExtractor::from_artifact("/nonexistent/cruise-mpc/results.json");
        assert!(matches!(extractor.source(), ReferenceSource::Artifact(_)));
        let result = extractor.extract(&mpc);
        assert!(result.degraded);
        assert_eq!(result.status, SolveStatus::Success);
        assert_eq!(result.reference, vec![40.0; 11]);
        // 二回目も同じ結果
        assert_eq!(extractor.extract(&mpc), result);
    }

    #[test]
    fn test_fallback_before_first_solve() {
        let mpc = problem();
        let result = ResultExtractor::in_process().extract(&mpc);
        assert!(result.degraded);
        assert!(!result.status.is_success());
        assert_eq!(result.reference.len(), mpc.grid().len());
    }
}
