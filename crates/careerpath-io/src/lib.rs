//! Dataset loading, feature preparation, label encoding, evaluation and
//! artifact storage for the careerpath pipeline.

mod artifact;
mod domain;
mod error;
mod label;
mod prepare;
mod profile;
mod reader;
mod report;
mod split;
mod writer;

pub use artifact::{ArtifactStore, ENCODER_FILE, MODEL_FILE, Predictor};
pub use domain::{
    AUXILIARY_COLUMN, CAREER_FEATURES, ExperimentName, FeatureSchema, TARGET_COLUMN, Table,
};
pub use error::IoError;
pub use label::LabelEncoder;
pub use prepare::{FeaturePreparer, PreparedData};
pub use profile::{CareerProfile, FEATURE_RANGES};
pub use reader::DatasetReader;
pub use report::{ClassReport, EvaluationReport};
pub use split::{SplitConfig, TrainTestSplit, train_test_split};
pub use writer::{ResultWriter, RunSummary};
