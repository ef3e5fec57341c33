//! End-to-end integration tests: CSV -> prepare -> train -> evaluate ->
//! artifacts -> predict.

use std::fs;
use std::path::{Path, PathBuf};

use careerpath_io::{
    ArtifactStore, CareerProfile, DatasetReader, EvaluationReport, ExperimentName, FeaturePreparer,
    IoError, LabelEncoder, ResultWriter, RunSummary, SplitConfig, TrainTestSplit, train_test_split,
};
use careerpath_rf::{
    CrossValidation, GridSearch, MaxFeatures, ParamGrid, RandomForest, RandomForestConfig, RfError,
    Trainer,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

struct Prepared {
    encoder: LabelEncoder,
    feature_names: Vec<String>,
    split: TrainTestSplit,
}

fn prepare(name: &str) -> Result<Prepared, IoError> {
    let table = DatasetReader::new(&fixture_path(name)).read()?;
    let data = FeaturePreparer::default().prepare(&table)?;
    let encoder = LabelEncoder::fit(&data.labels)?;
    let labels = encoder.encode_all(&data.labels)?;
    let split = train_test_split(&data.features, &labels, &SplitConfig::default())?;
    Ok(Prepared {
        encoder,
        feature_names: data.feature_names,
        split,
    })
}

fn train(prepared: &Prepared, trainer: &Trainer) -> RandomForest {
    trainer
        .fit(
            &prepared.split.train_features,
            &prepared.split.train_labels,
            &prepared.feature_names,
        )
        .unwrap()
        .into_parts()
        .0
        .into_forest()
}

fn small_search(n_folds: usize) -> Trainer {
    let grid = ParamGrid::new()
        .with_n_trees(vec![10, 20])
        .with_max_features(vec![MaxFeatures::Sqrt])
        .with_max_depth(vec![Some(5), None])
        .with_min_samples_split(vec![2])
        .with_min_samples_leaf(vec![1]);
    Trainer::Search(GridSearch::new(CrossValidation::new(n_folds).unwrap()).with_strategy(grid))
}

fn scenario_profile() -> CareerProfile {
    CareerProfile {
        gpa: 8.0,
        extracurricular_activities: 2.0,
        internships: 1.0,
        projects: 3.0,
        leadership_positions: 0.0,
        field_specific_courses: 6.0,
        research_experience: 1.0,
        coding_skills: 4.0,
        communication_skills: 4.0,
        problem_solving_skills: 5.0,
        teamwork_skills: 3.0,
        analytical_skills: 4.0,
        presentation_skills: 3.0,
        networking_skills: 2.0,
        industry_certifications: 1.0,
    }
}

// ---------------------------------------------------------------------------
// Baseline pipeline
// ---------------------------------------------------------------------------

#[test]
fn baseline_round_trip_predicts_frozen_label() {
    let prepared = prepare("careers.csv").unwrap();
    assert_eq!(prepared.encoder.classes(), &["Arts", "Engineering", "Science"]);
    assert_eq!(prepared.split.test_labels.len(), 12);

    let forest = train(&prepared, &Trainer::default());
    let report = EvaluationReport::compute(
        &forest,
        &prepared.split.test_features,
        &prepared.split.test_labels,
        &prepared.encoder,
    )
    .unwrap();
    assert!(report.accuracy >= 0.75, "accuracy = {}", report.accuracy);
    assert_eq!(report.confusion_matrix.n_classes(), 3);

    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&forest, &prepared.encoder).unwrap();

    // A fresh load stands in for a separate inference process.
    let predictor = ArtifactStore::new(dir.path()).load_predictor().unwrap();
    let field = predictor.predict(&scenario_profile()).unwrap();
    assert!(predictor.classes().contains(&field), "unexpected field {field}");

    let probe = &prepared.split.test_features;
    assert_eq!(
        predictor.forest().predict_batch(probe).unwrap(),
        forest.predict_batch(probe).unwrap()
    );
}

#[test]
fn training_is_deterministic() {
    let run = || {
        let prepared = prepare("careers.csv").unwrap();
        let forest = train(&prepared, &Trainer::default());
        let report = EvaluationReport::compute(
            &forest,
            &prepared.split.test_features,
            &prepared.split.test_labels,
            &prepared.encoder,
        )
        .unwrap();
        (forest.predict_batch(&prepared.split.test_features).unwrap(), report.confusion_matrix)
    };
    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Search pipeline
// ---------------------------------------------------------------------------

#[test]
fn search_pipeline_writes_report() {
    let prepared = prepare("careers.csv").unwrap();
    let outcome = small_search(5)
        .fit(
            &prepared.split.train_features,
            &prepared.split.train_labels,
            &prepared.feature_names,
        )
        .unwrap();
    let search = outcome.search().unwrap();
    assert_eq!(search.candidates.len(), 4);

    let forest = outcome.result().forest();
    let report = EvaluationReport::compute(
        forest,
        &prepared.split.test_features,
        &prepared.split.test_labels,
        &prepared.encoder,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), ExperimentName::new("search_e2e").unwrap()).unwrap();
    let summary = RunSummary {
        mode: "search".to_string(),
        n_train: prepared.split.train_labels.len(),
        n_test: prepared.split.test_labels.len(),
        n_features: prepared.feature_names.len(),
        seed: 42,
    };
    let path = writer.write_evaluation(&summary, &report, Some(search)).unwrap();

    let content: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(content["run"]["n_train"], 48);
    assert_eq!(content["search"]["candidates"].as_array().unwrap().len(), 4);
    assert_eq!(
        content["evaluation"]["classes"].as_array().unwrap().len(),
        prepared.encoder.n_classes()
    );
}

#[test]
fn four_training_rows_cannot_fill_five_folds() {
    let prepared = prepare("five_rows.csv").unwrap();
    assert_eq!(prepared.split.train_labels.len(), 4);

    let err = small_search(5)
        .fit(
            &prepared.split.train_features,
            &prepared.split.train_labels,
            &prepared.feature_names,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RfError::InsufficientRowsForFolds {
            n_samples: 4,
            n_folds: 5
        }
    ));
    assert!(IoError::from(err).is_training_error());
}

// ---------------------------------------------------------------------------
// Schema and artifact failures
// ---------------------------------------------------------------------------

#[test]
fn missing_field_column_fails_before_training() {
    let err = prepare("missing_field.csv").err().unwrap();
    assert!(err.is_schema_error());
    assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "Field"));
}

#[test]
fn corrupt_artifacts_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path());
    let features: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i); 15]).collect();
    let labels: Vec<usize> = (0..10).map(|i| i / 5).collect();
    let names: Vec<String> = careerpath_io::CAREER_FEATURES.iter().map(|c| (*c).to_string()).collect();
    let forest = RandomForestConfig::new(3)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into_forest();
    let encoder = LabelEncoder::fit(&["Arts", "Science"]).unwrap();
    store.save(&forest, &encoder).unwrap();

    let model_bytes = fs::read(store.model_path()).unwrap();
    fs::write(store.model_path(), &model_bytes[..model_bytes.len() / 2]).unwrap();
    assert!(matches!(
        store.load(),
        Err(IoError::Model(RfError::DeserializeModel { .. }))
    ));

    fs::write(store.model_path(), b"not a model").unwrap();
    assert!(matches!(store.load(), Err(IoError::DeserializeArtifact { .. })));

    fs::write(store.model_path(), &model_bytes).unwrap();
    assert!(store.load_predictor().is_ok());
}

#[test]
fn model_replaced_from_another_run_is_rejected() {
    let prepared = prepare("careers.csv").unwrap();
    let baseline = train(&prepared, &Trainer::default());
    let searched = train(&prepared, &small_search(3));

    let serving = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let store = ArtifactStore::new(serving.path());
    store.save(&baseline, &prepared.encoder).unwrap();
    ArtifactStore::new(other.path())
        .save(&searched, &prepared.encoder)
        .unwrap();

    // Only the model file is swapped; the encoder still belongs to the first run.
    fs::copy(ArtifactStore::new(other.path()).model_path(), store.model_path()).unwrap();
    let err = store.load_predictor().err().unwrap();
    assert!(matches!(err, IoError::ArtifactMismatch { .. }), "got {err}");
}
