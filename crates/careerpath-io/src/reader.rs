//! CSV dataset reader with header and cell validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{CAREER_FEATURES, TARGET_COLUMN, Table};

/// Reads the career records CSV into a [`Table`].
///
/// Expected CSV format:
/// - Header row required; column order is free
/// - A `Field` target column and every required feature column
/// - Any other columns (such as `Career`) are carried through untouched
///
/// Header names are trimmed. Every cell must be non-empty.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateColumn`] | A header name repeats |
/// | [`IoError::MissingColumn`] | Target or a required feature column absent |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::MissingValue`] | An empty cell |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
#[derive(Debug, Clone)]
pub struct DatasetReader {
    path: PathBuf,
    target: String,
    required: Vec<String>,
}

impl DatasetReader {
    /// Create a reader requiring `Field` and the fifteen career features.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            target: TARGET_COLUMN.to_string(),
            required: CAREER_FEATURES.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Override the target column name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Override the feature columns that must be present in the header.
    #[must_use]
    pub fn with_required_columns(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Read and validate the CSV file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Table, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets short rows reach the InconsistentRowLength check
        // instead of surfacing as a CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let columns: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
        debug!(n_columns = columns.len(), "read CSV header");

        // Schema checks happen on the header, before any row is parsed.
        for required in std::iter::once(&self.target).chain(&self.required) {
            if !columns.contains(required) {
                return Err(IoError::MissingColumn {
                    path: self.path.clone(),
                    column: required.clone(),
                });
            }
        }

        let mut rows = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != columns.len() {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: columns.len(),
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(columns.len());
            for (column, cell) in columns.iter().zip(record.iter()) {
                let cell = cell.trim();
                if cell.is_empty() {
                    return Err(IoError::MissingValue {
                        path: self.path.clone(),
                        row_index,
                        column: column.clone(),
                    });
                }
                row.push(cell.to_string());
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_rows = rows.len(),
            n_columns = columns.len(),
            "dataset loaded"
        );

        Table::new(&self.path, columns, rows)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
