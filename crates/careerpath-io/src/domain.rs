//! Domain types for careerpath-io.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::IoError;

/// Target column holding the career field.
pub const TARGET_COLUMN: &str = "Field";

/// Descriptive column that is never used as a feature.
pub const AUXILIARY_COLUMN: &str = "Career";

/// The fifteen feature columns, in canonical order.
pub const CAREER_FEATURES: [&str; 15] = [
    "GPA",
    "Extracurricular_Activities",
    "Internships",
    "Projects",
    "Leadership_Positions",
    "Field_Specific_Courses",
    "Research_Experience",
    "Coding_Skills",
    "Communication_Skills",
    "Problem_Solving_Skills",
    "Teamwork_Skills",
    "Analytical_Skills",
    "Presentation_Skills",
    "Networking_Skills",
    "Industry_Certifications",
];

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An in-memory table of raw string cells with a named header.
///
/// Produced by [`DatasetReader`](crate::DatasetReader); every row has one
/// cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    source: PathBuf,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking that header names are unique and rows are
    /// as wide as the header.
    ///
    /// `source` names where the cells came from and is used in errors.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::DuplicateColumn`] | A header name repeats |
    /// | [`IoError::InconsistentRowLength`] | A row's width differs from the header |
    pub fn new(
        source: impl AsRef<Path>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, IoError> {
        let source = source.as_ref().to_path_buf();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(IoError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        if let Some((row_index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(IoError::InconsistentRowLength {
                path: source,
                row_index,
                expected: columns.len(),
                got: row.len(),
            });
        }
        Ok(Self {
            source,
            columns,
            rows,
        })
    }

    /// Where the table was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Header names in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column in the header.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column, or [`IoError::MissingColumn`].
    pub(crate) fn require_column(&self, name: &str) -> Result<usize, IoError> {
        self.column_index(name).ok_or_else(|| IoError::MissingColumn {
            path: self.source.clone(),
            column: name.to_string(),
        })
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[index].as_str())
    }
}

/// The ordered set of feature names a model is trained and queried with.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema from column names in their canonical order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::SchemaMismatch`] | `columns` is empty |
    /// | [`IoError::DuplicateColumn`] | A name repeats |
    pub fn new(columns: Vec<String>) -> Result<Self, IoError> {
        if columns.is_empty() {
            return Err(IoError::SchemaMismatch {
                missing: Vec::new(),
                unexpected: Vec::new(),
            });
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(IoError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// The fifteen career-record features.
    #[must_use]
    pub fn career() -> Self {
        Self {
            columns: CAREER_FEATURES.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Column names in canonical order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always `false`; a schema has at least one column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// For each schema column, its position in `produced`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::SchemaMismatch`] unless `produced` holds exactly
    /// the schema's names (in any order).
    pub fn reorder_indices(&self, produced: &[String]) -> Result<Vec<usize>, IoError> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !produced.contains(c))
            .cloned()
            .collect();
        let unexpected: Vec<String> = produced
            .iter()
            .filter(|c| !self.columns.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() || produced.len() != self.columns.len() {
            return Err(IoError::SchemaMismatch {
                missing,
                unexpected,
            });
        }
        Ok(self
            .columns
            .iter()
            .filter_map(|c| produced.iter().position(|p| p == c))
            .collect())
    }

    /// Check that `found` lists the schema's names in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FeatureOrderMismatch`] on any difference.
    pub fn ensure_exact(&self, found: &[String]) -> Result<(), IoError> {
        if found != self.columns.as_slice() {
            return Err(IoError::FeatureOrderMismatch {
                expected: self.columns.clone(),
                found: found.to_vec(),
            });
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::career()
    }
}
