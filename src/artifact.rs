//! Persisted record of one solve.
//!
//! ```json
//! { "time": [...], "p": { "value": [...] }, "v": { "value": [...], "tr": [...] } }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ArtifactUnavailable;
use crate::solver::SolverOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub value: Vec<f64>,
    /// Reference trajectory, only for tracked variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tr: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArtifact {
    pub time: Vec<f64>,
    #[serde(flatten)]
    pub variables: BTreeMap<String, VariableRecord>,
}

impl ResultArtifact {
    pub fn from_output(time: &[f64], control: &str, tracked: &str, output: &SolverOutput) -> Self {
        let mut variables = BTreeMap::new();
        variables.insert(
            control.to_string(),
            VariableRecord {
                value: output.control.clone(),
                tr: None,
            },
        );
        variables.insert(
            tracked.to_string(),
            VariableRecord {
                value: output.state.clone(),
                tr: Some(output.reference.clone()),
            },
        );
        Self {
            time: time.to_vec(),
            variables,
        }
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactUnavailable> {
        let file = File::open(path).map_err(|source| ArtifactUnavailable::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    // 別の解のファイルは time と value の不一致で弾く
    pub fn reference(
        &self,
        variable: &str,
        time: &[f64],
        value: &[f64],
    ) -> Result<&[f64], ArtifactUnavailable> {
        let record = self
            .variables
            .get(variable)
            .ok_or_else(|| ArtifactUnavailable::MissingKey(variable.to_string()))?;
        let tr = record
            .tr
            .as_deref()
            .ok_or_else(|| ArtifactUnavailable::MissingKey(format!("{variable}.tr")))?;
        if tr.len() != time.len() {
            return Err(ArtifactUnavailable::LengthMismatch {
                expected: time.len(),
                got: tr.len(),
            });
        }
        if !same_series(&self.time, time) {
            return Err(ArtifactUnavailable::Stale("time".to_string()));
        }
        if !same_series(&record.value, value) {
            return Err(ArtifactUnavailable::Stale(format!("{variable}.value")));
        }
        Ok(tr)
    }
}

fn same_series(a: &[f64], b: &[f64]) -> bool {
    const TOL: f64 = 1e-9;
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= TOL * (1.0 + y.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn output() -> SolverOutput {
        SolverOutput {
            control: vec![0.0, 20.0, 40.0],
            state: vec![0.0, 0.7, 2.1],
            reference: vec![0.0, 3.8, 7.3],
            iterations: 12,
            cost: 1.0,
            solve_time: Duration::ZERO,
        }
    }

    #[test]
    fn test_json_layout() {
        let artifact = ResultArtifact::from_output(&[0.0, 0.5, 1.0], "p", "v", &output());
        let json: serde_json::Value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["time"].as_array().unwrap().len(), 3);
        assert_eq!(json["v"]["tr"][1].as_f64(), Some(3.8));
        assert!(json["p"].get("tr").is_none());
    }

    #[test]
    fn test_reference_lookup() {
        let time = [0.0, 0.5, 1.0];
        let state = output().state;
        let artifact = ResultArtifact::from_output(&time, "p", "v", &output());
        assert_eq!(artifact.reference("v", &time, &state).unwrap(), &[0.0, 3.8, 7.3]);
        assert!(matches!(
            artifact.reference("p", &time, &state),
            Err(ArtifactUnavailable::MissingKey(_))
        ));
        assert!(matches!(
            artifact.reference("v", &[0.0, 0.5, 1.0, 1.5], &state),
            Err(ArtifactUnavailable::LengthMismatch { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn test_reference_from_other_solve_rejected() {
        let time = [0.0, 0.5, 1.0];
        let artifact = ResultArtifact::from_output(&time, "p", "v", &output());
        // 別の解の軌道
        assert!(matches!(
            artifact.reference("v", &time, &[0.0, 0.4, 1.1]),
            Err(ArtifactUnavailable::Stale(_))
        ));
        assert!(matches!(
            artifact.reference("v", &[0.0, 1.0, 2.0], &output().state),
            Err(ArtifactUnavailable::Stale(_))
        ));
    }

    #[test]
    fn test_malformed_structure() {
        let parsed: Result<ResultArtifact, _> = serde_json::from_str(r#"{"v": [1, 2, 3]}"#);
        assert!(parsed.is_err());
    }
}
