//! Bijective mapping between field names and class indices.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::IoError;

/// Maps each distinct label to its position in sorted order.
///
/// Immutable once fitted; the class list is frozen into the artifact and
/// reused at inference time to decode predictions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Collect the distinct labels and index them in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyLabelSet`] when `labels` is empty.
    #[instrument(skip_all, fields(n_labels = labels.len()))]
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self, IoError> {
        let classes: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if classes.is_empty() {
            return Err(IoError::EmptyLabelSet);
        }
        debug!(n_classes = classes.len(), "label encoder fitted");
        Ok(Self { classes })
    }

    /// Index of `label`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownLabel`] for a label outside the fitted set.
    pub fn encode(&self, label: &str) -> Result<usize, IoError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| IoError::UnknownLabel {
                label: label.to_string(),
            })
    }

    /// Encode every label, failing on the first unknown one.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownLabel`] for a label outside the fitted set.
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, IoError> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    /// Label at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::LabelIndexOutOfRange`] when `index >= n_classes`.
    pub fn decode(&self, index: usize) -> Result<&str, IoError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(IoError::LabelIndexOutOfRange {
                index,
                n_classes: self.classes.len(),
            })
    }

    /// Labels in index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}
