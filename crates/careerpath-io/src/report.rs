//! Held-out evaluation with decoded class names.

use std::fmt;

use careerpath_rf::{AveragedMetrics, ConfusionMatrix, RandomForest, RankedFeature};
use tracing::{info, instrument};

use crate::IoError;
use crate::label::LabelEncoder;

/// Precision, recall, F1 and support for one named class.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassReport {
    /// Decoded field name.
    pub name: String,
    /// TP / (TP + FP).
    pub precision: f64,
    /// TP / (TP + FN).
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Number of held-out rows of this class.
    pub support: usize,
}

/// Metrics of a forest on a held-out split.
///
/// `classes` and the confusion matrix rows follow the encoder's index
/// order, so row `i` of the matrix belongs to `classes[i]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EvaluationReport {
    /// Fraction of held-out rows predicted correctly.
    pub accuracy: f64,
    /// Number of held-out rows.
    pub n_test: usize,
    /// Per-class metrics, one entry per encoder class.
    pub classes: Vec<ClassReport>,
    /// Unweighted mean over classes.
    pub macro_avg: AveragedMetrics,
    /// Support-weighted mean over classes.
    pub weighted_avg: AveragedMetrics,
    /// `k × k` counts; cell `(t, p)` is true class `t` predicted as `p`.
    pub confusion_matrix: ConfusionMatrix,
    /// The forest's ranked MDI importances.
    pub feature_importances: Vec<RankedFeature>,
}

impl EvaluationReport {
    /// Predict `features` with `forest` and score against `labels`.
    ///
    /// Does not modify the forest.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Model`] | Empty split, length mismatch, wrong feature width or a label outside the encoder |
    /// | [`IoError::LabelIndexOutOfRange`] | The encoder cannot name a class |
    #[instrument(skip_all, fields(n_test = features.len(), n_classes = encoder.n_classes()))]
    pub fn compute(
        forest: &RandomForest,
        features: &[Vec<f64>],
        labels: &[usize],
        encoder: &LabelEncoder,
    ) -> Result<Self, IoError> {
        let predicted = forest.predict_batch(features)?;
        let confusion_matrix = ConfusionMatrix::from_labels(labels, &predicted, encoder.n_classes())?;

        let classes = confusion_matrix
            .class_metrics()
            .into_iter()
            .map(|m| {
                Ok(ClassReport {
                    name: encoder.decode(m.class)?.to_string(),
                    precision: m.precision,
                    recall: m.recall,
                    f1: m.f1,
                    support: m.support,
                })
            })
            .collect::<Result<Vec<_>, IoError>>()?;

        let report = Self {
            accuracy: confusion_matrix.accuracy(),
            n_test: confusion_matrix.total(),
            classes,
            macro_avg: confusion_matrix.macro_avg(),
            weighted_avg: confusion_matrix.weighted_avg(),
            feature_importances: forest.feature_importances(),
            confusion_matrix,
        };

        info!(
            accuracy = report.accuracy,
            macro_f1 = report.macro_avg.f1,
            "evaluation complete"
        );

        Ok(report)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.name, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.n_test
        )?;
        for (label, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }

        writeln!(f)?;
        writeln!(f, "confusion matrix (rows true, columns predicted):")?;
        write!(f, "{}", self.confusion_matrix)?;
        for (i, c) in self.classes.iter().enumerate() {
            writeln!(f, "  {i:>3} = {}", c.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use careerpath_rf::{MaxFeatures, RandomForestConfig, RfError};

    use super::*;

    fn fitted() -> (RandomForest, LabelEncoder, Vec<Vec<f64>>, Vec<usize>) {
        let encoder = LabelEncoder::fit(&["Arts", "Engineering", "Science"]).unwrap();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3 {
            for i in 0..10 {
                features.push(vec![class as f64 * 5.0 + i as f64 * 0.1, 1.0]);
                labels.push(class);
            }
        }
        let forest = RandomForestConfig::new(15)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit(&features, &labels, &["a".to_string(), "b".to_string()])
            .unwrap()
            .into_forest();
        (forest, encoder, features, labels)
    }

    #[test]
    fn separable_data_scores_perfectly() {
        let (forest, encoder, features, labels) = fitted();
        let report = EvaluationReport::compute(&forest, &features, &labels, &encoder).unwrap();

        assert!((report.accuracy - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.n_test, 30);
        let names: Vec<&str> = report.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Arts", "Engineering", "Science"]);
        assert!(report.classes.iter().all(|c| c.support == 10));
        assert_eq!(report.confusion_matrix.as_rows()[1], vec![0, 10, 0]);
        assert_eq!(report.feature_importances[0].name, "a");
    }

    #[test]
    fn display_names_every_class() {
        let (forest, encoder, features, labels) = fitted();
        let text = EvaluationReport::compute(&forest, &features, &labels, &encoder)
            .unwrap()
            .to_string();
        for needle in ["precision", "Arts", "Engineering", "Science", "weighted avg", "pred_"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn empty_split_is_a_model_error() {
        let (forest, encoder, _, _) = fitted();
        let err = EvaluationReport::compute(&forest, &[], &[], &encoder).unwrap_err();
        assert!(matches!(err, IoError::Model(RfError::EmptyDataset)));
    }

    #[test]
    fn label_outside_encoder_rejected() {
        let (forest, encoder, features, _) = fitted();
        let err = EvaluationReport::compute(&forest, &features[..1], &[7], &encoder).unwrap_err();
        assert!(matches!(err, IoError::Model(RfError::ClassOutOfRange { class: 7, .. })));
    }

    #[test]
    fn report_serializes_to_json() {
        let (forest, encoder, features, labels) = fitted();
        let report = EvaluationReport::compute(&forest, &features, &labels, &encoder).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["accuracy"].is_number());
        assert_eq!(json["classes"].as_array().unwrap().len(), 3);
        assert!(json["macro_avg"]["f1"].is_number());
    }
}
