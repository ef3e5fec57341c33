use std::path::PathBuf;

/// Errors from Random Forest training, search, prediction and persistence.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when a search strategy yields no candidate configuration.
    #[error("search space is empty: {reason}")]
    EmptySearchSpace {
        /// Which part of the search space produced no candidates.
        reason: String,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when the feature table and the label sequence differ in length.
    #[error("feature table has {n_samples} rows but {n_labels} labels were given")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_samples: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when the feature name list does not match the feature width.
    #[error("{n_names} feature names given for {n_features} feature columns")]
    FeatureNameCountMismatch {
        /// Number of feature names supplied.
        n_names: usize,
        /// Number of feature columns in the data.
        n_features: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when there are fewer rows than cross-validation folds.
    #[error("{n_samples} training rows cannot be split into {n_folds} folds")]
    InsufficientRowsForFolds {
        /// Number of training rows.
        n_samples: usize,
        /// The requested number of folds.
        n_folds: usize,
    },

    /// Returned when true and predicted label sequences differ in length.
    #[error("{n_true} true labels but {n_predicted} predictions")]
    PredictionCountMismatch {
        /// Number of true labels.
        n_true: usize,
        /// Number of predicted labels.
        n_predicted: usize,
    },

    /// Returned when a class index falls outside the confusion matrix.
    #[error("class index {class} is outside [0, {n_classes})")]
    ClassOutOfRange {
        /// The offending class index.
        class: usize,
        /// The number of classes in the matrix.
        n_classes: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}

impl RfError {
    /// Return `true` for errors caused by empty, malformed or insufficient
    /// training data, as opposed to invalid configuration or persistence.
    #[must_use]
    pub fn is_training_error(&self) -> bool {
        matches!(
            self,
            RfError::EmptyDataset
                | RfError::ZeroFeatures
                | RfError::FeatureCountMismatch { .. }
                | RfError::LabelCountMismatch { .. }
                | RfError::FeatureNameCountMismatch { .. }
                | RfError::NonFiniteValue { .. }
                | RfError::InsufficientRowsForFolds { .. }
        )
    }

    /// Return `true` for model save/load failures.
    #[must_use]
    pub fn is_persistence_error(&self) -> bool {
        matches!(
            self,
            RfError::SerializeModel { .. }
                | RfError::DeserializeModel { .. }
                | RfError::IncompatibleModelVersion { .. }
        )
    }
}
