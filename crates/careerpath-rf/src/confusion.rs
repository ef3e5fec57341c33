//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::RfError;

/// Square k×k count table; `matrix[t][p]` counts samples of true class `t`
/// predicted as class `p`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

/// Per-class precision, recall, F1 and support.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// TP / (TP + FP), or 0.0 when the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN), or 0.0 when the class has no true samples.
    pub recall: f64,
    /// Harmonic mean of precision and recall, or 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

/// Precision/recall/F1 averaged over classes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AveragedMetrics {
    /// Averaged precision.
    pub precision: f64,
    /// Averaged recall.
    pub recall: f64,
    /// Averaged F1.
    pub f1: f64,
    /// Total support across classes.
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero labels provided |
    /// | [`RfError::PredictionCountMismatch`] | `true_labels` and `predicted` differ in length |
    /// | [`RfError::ClassOutOfRange`] | A label is `>= n_classes` |
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if true_labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if true_labels.len() != predicted.len() {
            return Err(RfError::PredictionCountMismatch {
                n_true: true_labels.len(),
                n_predicted: predicted.len(),
            });
        }
        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in true_labels.iter().zip(predicted) {
            let class = t.max(p);
            if class >= n_classes {
                return Err(RfError::ClassOutOfRange { class, n_classes });
            }
            matrix[t][p] += 1;
        }
        Ok(Self { matrix, n_classes })
    }

    /// Fraction of samples on the diagonal.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        ratio(correct, self.total())
    }

    /// Total number of samples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Per-class precision, recall, F1 and support, indexed by class.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes)
            .map(|c| {
                let tp = self.matrix[c][c];
                let predicted: usize = self.matrix.iter().map(|row| row[c]).sum();
                let support: usize = self.matrix[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Unweighted mean of the per-class metrics.
    ///
    /// Only classes that occur among the true or the predicted labels take
    /// part. A class index with an all-zero row and column is skipped rather
    /// than counted as a zero score.
    #[must_use]
    pub fn macro_avg(&self) -> AveragedMetrics {
        let present: Vec<ClassMetrics> = self
            .class_metrics()
            .into_iter()
            .filter(|m| m.support > 0 || self.matrix.iter().any(|row| row[m.class] > 0))
            .collect();
        let k = present.len().max(1) as f64;
        AveragedMetrics {
            precision: present.iter().map(|m| m.precision).sum::<f64>() / k,
            recall: present.iter().map(|m| m.recall).sum::<f64>() / k,
            f1: present.iter().map(|m| m.f1).sum::<f64>() / k,
            support: self.total(),
        }
    }

    /// Support-weighted mean of the per-class metrics.
    #[must_use]
    pub fn weighted_avg(&self) -> AveragedMetrics {
        let metrics = self.class_metrics();
        let total = self.total();
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                return 0.0;
            }
            metrics.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
        };
        AveragedMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        }
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Element-wise sum of two matrices of the same size.
    pub(crate) fn merge(&mut self, other: &ConfusionMatrix) {
        for (row, other_row) in self.matrix.iter_mut().zip(&other.matrix) {
            for (cell, other_cell) in row.iter_mut().zip(other_row) {
                *cell += other_cell;
            }
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;

        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>8}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let labels = vec![0, 0, 1, 1, 2, 2];
        let cm = ConfusionMatrix::from_labels(&labels, &labels, 3).unwrap();
        assert!((cm.accuracy() - 1.0).abs() < f64::EPSILON);
        for m in cm.class_metrics() {
            assert!((m.f1 - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn known_confusion_matrix() {
        let true_labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();
        let metrics = cm.class_metrics();

        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);
        assert_eq!(cm.as_rows()[2], vec![1, 0, 2]);
    }

    #[test]
    fn averages_differ_under_imbalance() {
        // Class 0 has 4 samples all right; class 1 has 1 sample predicted as 0.
        let cm = ConfusionMatrix::from_labels(&[0, 0, 0, 0, 1], &[0, 0, 0, 0, 0], 2).unwrap();
        let macro_avg = cm.macro_avg();
        let weighted = cm.weighted_avg();

        assert!((macro_avg.recall - 0.5).abs() < 1e-10);
        assert!((weighted.recall - 0.8).abs() < 1e-10);
        assert_eq!(weighted.support, 5);
    }

    #[test]
    fn macro_avg_skips_classes_absent_from_both_sides() {
        // Class 2 never occurs in either label list.
        let true_labels = [0, 0, 1, 1, 1];
        let predicted = [0, 0, 1, 1, 0];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();
        let two = ConfusionMatrix::from_labels(&true_labels, &predicted, 2).unwrap();

        let macro_avg = cm.macro_avg();
        let f1 = cm.class_metrics();
        assert!((macro_avg.f1 - (f1[0].f1 + f1[1].f1) / 2.0).abs() < 1e-12);
        assert!((macro_avg.f1 - two.macro_avg().f1).abs() < 1e-12);
        assert!((macro_avg.recall - two.macro_avg().recall).abs() < 1e-12);
        assert!(f1[2].f1.abs() < f64::EPSILON);
    }

    #[test]
    fn macro_avg_keeps_predicted_only_class() {
        // Class 1 has no true samples but is predicted once, so it counts
        // with precision 0.
        let cm = ConfusionMatrix::from_labels(&[0, 0], &[0, 1], 2).unwrap();
        let macro_avg = cm.macro_avg();
        assert!((macro_avg.precision - 0.5).abs() < 1e-12);
        assert!((macro_avg.recall - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_labels_error() {
        let err = ConfusionMatrix::from_labels(&[], &[], 3).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn length_mismatch_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0], 2).unwrap_err();
        assert!(matches!(
            err,
            RfError::PredictionCountMismatch {
                n_true: 2,
                n_predicted: 1
            }
        ));
    }

    #[test]
    fn out_of_range_class_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0, 3], 2).unwrap_err();
        assert!(matches!(err, RfError::ClassOutOfRange { class: 3, n_classes: 2 }));
    }

    #[test]
    fn zero_support_class_metrics() {
        let cm = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 0, 1, 1], 3).unwrap();
        let metrics = cm.class_metrics();
        assert_eq!(metrics[2].support, 0);
        assert!(metrics[2].recall.abs() < f64::EPSILON);
        assert!(metrics[2].precision.abs() < f64::EPSILON);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = ConfusionMatrix::from_labels(&[0, 1], &[0, 0], 2).unwrap();
        let b = ConfusionMatrix::from_labels(&[1], &[1], 2).unwrap();
        a.merge(&b);
        assert_eq!(a.as_rows(), &[vec![1, 0], vec![1, 1]]);
    }

    #[test]
    fn display_formatting() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 2).unwrap();
        let output = format!("{cm}");
        assert!(output.contains("pred_"));
        assert!(output.contains("true_"));
    }
}
