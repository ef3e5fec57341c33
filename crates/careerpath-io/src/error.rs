//! I/O error types for careerpath-io.

use std::path::PathBuf;

use careerpath_rf::RfError;

/// Errors from loading, preparing, encoding, persisting and reporting.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell is empty or holds a missing-value marker.
    #[error("missing value in {path}: row {row_index}, column \"{column}\"")]
    MissingValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: String,
    },

    /// Returned when a required column is absent from the table.
    #[error("required column \"{column}\" not found in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The missing column name.
        column: String,
    },

    /// Returned when a column name appears twice in a header or schema.
    #[error("duplicate column \"{column}\"")]
    DuplicateColumn {
        /// The repeated column name.
        column: String,
    },

    /// Returned when prepared feature columns differ from the expected schema.
    #[error("feature columns do not match the schema: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        /// Schema columns that were not produced.
        missing: Vec<String>,
        /// Produced columns that are not in the schema.
        unexpected: Vec<String>,
    },

    /// Returned when a model's feature order differs from the schema.
    #[error("model feature order {found:?} does not match schema {expected:?}")]
    FeatureOrderMismatch {
        /// Columns in schema order.
        expected: Vec<String>,
        /// Columns in the order the model was trained on.
        found: Vec<String>,
    },

    /// Returned when fitting a label encoder on zero labels.
    #[error("cannot fit a label encoder on an empty label set")]
    EmptyLabelSet,

    /// Returned when encoding a label outside the fitted set.
    #[error("unknown label \"{label}\"")]
    UnknownLabel {
        /// The unseen label.
        label: String,
    },

    /// Returned when decoding an index outside `[0, n_classes)`.
    #[error("label index {index} is outside [0, {n_classes})")]
    LabelIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of fitted classes.
        n_classes: usize,
    },

    /// Returned when the split fraction is not strictly between 0 and 1.
    #[error("test fraction must be in (0, 1), got {fraction}")]
    InvalidTestFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when a train/test split would leave one side empty.
    #[error("splitting {n_samples} rows with {n_test} test rows leaves an empty side")]
    EmptySplit {
        /// Number of rows being split.
        n_samples: usize,
        /// Number of rows the test side would receive.
        n_test: usize,
    },

    /// Returned when an inference input lies outside its documented range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    ValueOutOfRange {
        /// Feature name.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// Returned when an inference input is NaN or infinite.
    #[error("feature \"{field}\" is not finite")]
    NonFiniteFeature {
        /// Feature name.
        field: String,
    },

    /// Returned when an artifact cannot be encoded.
    #[error("failed to serialize artifact")]
    SerializeArtifact {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when an artifact cannot be decoded.
    #[error("failed to deserialize artifact {path}")]
    DeserializeArtifact {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when an artifact file cannot be written.
    #[error("failed to write artifact {path}")]
    WriteArtifact {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact file cannot be read.
    #[error("failed to read artifact {path}")]
    ReadArtifact {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact was written by an incompatible format version.
    #[error("incompatible artifact version in {path}: expected {expected}, found {found}")]
    IncompatibleArtifactVersion {
        /// Path to the artifact.
        path: PathBuf,
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Returned when an artifact file holds a different kind of object.
    #[error("{path} holds a \"{found}\" artifact, expected \"{expected}\"")]
    WrongArtifactKind {
        /// Path to the artifact.
        path: PathBuf,
        /// Expected kind tag.
        expected: &'static str,
        /// Kind tag found in the file.
        found: String,
    },

    /// Returned when a loaded model and encoder do not belong together.
    #[error("model and label encoder do not match: {reason}")]
    ArtifactMismatch {
        /// What disagreed.
        reason: String,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a report cannot be encoded as JSON.
    #[error("failed to encode report as JSON")]
    SerializeReport {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A forest error surfaced through the io layer.
    #[error(transparent)]
    Model(#[from] RfError),
}

impl IoError {
    /// Return `true` for errors about the shape of the data: missing,
    /// duplicated or unexpected columns.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            IoError::MissingColumn { .. }
                | IoError::DuplicateColumn { .. }
                | IoError::SchemaMismatch { .. }
                | IoError::FeatureOrderMismatch { .. }
        )
    }

    /// Return `true` for training-data errors, including those raised by the forest.
    #[must_use]
    pub fn is_training_error(&self) -> bool {
        match self {
            IoError::Model(e) => e.is_training_error(),
            IoError::EmptySplit { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_is_schema_error() {
        let err = IoError::MissingColumn {
            path: PathBuf::from("data.csv"),
            column: "Field".to_string(),
        };
        assert!(err.is_schema_error());
        assert_eq!(err.to_string(), "required column \"Field\" not found in data.csv");
    }

    #[test]
    fn wrapped_forest_errors_keep_their_class() {
        let err = IoError::from(RfError::InsufficientRowsForFolds {
            n_samples: 4,
            n_folds: 5,
        });
        assert!(err.is_training_error());
        assert!(!err.is_schema_error());
        assert_eq!(err.to_string(), "4 training rows cannot be split into 5 folds");
    }
}
