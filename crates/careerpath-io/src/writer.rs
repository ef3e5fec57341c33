//! JSON result writer for training runs.

use std::fs;
use std::path::{Path, PathBuf};

use careerpath_rf::SearchReport;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;
use crate::report::EvaluationReport;

/// Facts about a training run that the reports do not carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// `"baseline"` or `"search"`.
    pub mode: String,
    /// Rows used for training.
    pub n_train: usize,
    /// Rows held out for evaluation.
    pub n_test: usize,
    /// Width of the feature vectors.
    pub n_features: usize,
    /// Seed used for the split, folds and forest.
    pub seed: u64,
}

/// Writes run results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// The evaluation file is named `{experiment}_evaluate.json`.
#[derive(Debug)]
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Path of the evaluation file for this experiment.
    #[must_use]
    pub fn evaluation_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_evaluate.json", self.experiment.as_str()))
    }

    /// Write the run summary, held-out evaluation and, in search mode, the
    /// search report to `{experiment}_evaluate.json`. Returns the path written.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::SerializeReport`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_evaluation(
        &self,
        run: &RunSummary,
        evaluation: &EvaluationReport,
        search: Option<&SearchReport>,
    ) -> Result<PathBuf, IoError> {
        let path = self.evaluation_path();

        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            run,
            evaluation,
            search,
        };

        let json = serde_json::to_string_pretty(&artifact)
            .map_err(|source| IoError::SerializeReport { source })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), "evaluation result written");
        Ok(path)
    }
}

// --- Shadow struct for JSON serialization ---

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    run: &'a RunSummary,
    evaluation: &'a EvaluationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a SearchReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::LabelEncoder;
    use careerpath_rf::{CrossValidation, GridSearch, HyperParams, MaxFeatures, ParamGrid, RandomForestConfig};
    use tempfile::TempDir;

    fn data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = (0..20).map(|i| vec![f64::from(i), 1.0]).collect();
        let labels = (0..20).map(|i| usize::from(i >= 10)).collect();
        (features, labels)
    }

    fn names() -> Vec<String> {
        vec!["x".to_string(), "y".to_string()]
    }

    fn evaluation() -> EvaluationReport {
        let (features, labels) = data();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels, &names())
            .unwrap()
            .into_forest();
        let encoder = LabelEncoder::fit(&["Arts", "Science"]).unwrap();
        EvaluationReport::compute(&forest, &features, &labels, &encoder).unwrap()
    }

    fn summary(mode: &str) -> RunSummary {
        RunSummary {
            mode: mode.to_string(),
            n_train: 16,
            n_test: 4,
            n_features: 2,
            seed: 42,
        }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn write_evaluation_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("test_run").unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();

        let path = writer
            .write_evaluation(&summary("baseline"), &evaluation(), None)
            .unwrap();
        assert_eq!(path, dir.path().join("test_run_evaluate.json"));

        let content = read_json(&path);
        assert_eq!(content["experiment"], "test_run");
        assert_eq!(content["run"]["mode"], "baseline");
        assert_eq!(content["run"]["seed"], 42);
        assert!(content["evaluation"]["accuracy"].is_number());
        assert_eq!(content["evaluation"]["classes"][1]["name"], "Science");
        assert!(content["evaluation"]["feature_importances"].is_array());
        assert!(content.get("search").is_none());
    }

    #[test]
    fn write_evaluation_includes_search_report() {
        let dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(dir.path(), ExperimentName::new("searched").unwrap()).unwrap();

        let (features, labels) = data();
        let grid = ParamGrid::single(HyperParams {
            n_trees: 5,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        });
        let search = GridSearch::new(CrossValidation::new(2).unwrap())
            .with_strategy(grid)
            .fit(&features, &labels, &names())
            .unwrap();
        let (report, _) = search.into_parts();

        let path = writer
            .write_evaluation(&summary("search"), &evaluation(), Some(&report))
            .unwrap();
        let content = read_json(&path);
        assert_eq!(content["search"]["best_index"], 0);
        assert_eq!(content["search"]["best_params"]["n_trees"], 5);
        assert_eq!(content["search"]["candidates"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn writer_creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let writer = ResultWriter::new(&nested, ExperimentName::new("nested_test").unwrap()).unwrap();
        writer
            .write_evaluation(&summary("baseline"), &evaluation(), None)
            .unwrap();
        assert!(nested.join("nested_test_evaluate.json").exists());
    }

    #[test]
    fn invalid_experiment_name_rejected() {
        let result = ExperimentName::new("bad name!");
        assert!(matches!(result, Err(IoError::InvalidExperimentName { .. })));
    }
}
