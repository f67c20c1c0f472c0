extern crate nalgebra as na;

pub mod artifact;
pub mod config;
pub mod constraints;
pub mod disturbance;
pub mod error;
pub mod extract;
pub mod grid;
pub mod mpc;
pub mod plant;
pub mod problem;
pub mod receding;
pub mod report;
pub mod solver;
pub mod variables;

pub use config::{CruiseConfig, Mode};
pub use error::{ArtifactUnavailable, ConfigError, ProblemError};
pub use extract::{ResultExtractor, SolveResult};
pub use grid::HorizonGrid;
pub use plant::PlantModel;
pub use problem::{MpcProblem, ProblemState};
pub use receding::{ClosedLoop, ClosedLoopTrace};
pub use report::ReportRenderer;
pub use solver::{SolveStatus, SolverOptions};
pub use variables::{ControlVariable, TrackedVariable};
