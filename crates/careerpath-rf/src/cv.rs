//! Stratified k-fold cross-validation.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, warn};

use crate::config::RandomForestConfig;
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::forest::validate_dataset;
use crate::importance::{RankedFeature, aggregate_importances};

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Accuracy for each fold, in fold order.
    pub fold_accuracies: Vec<f64>,
    /// Confusion matrix summed across all held-out folds.
    pub confusion_matrix: ConfusionMatrix,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Population standard deviation of fold accuracies.
    pub std_accuracy: f64,
    /// Importances averaged over every tree of every fold.
    pub feature_importances: Vec<RankedFeature>,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
}

/// One train/validation partition of a dataset.
#[derive(Debug, Clone)]
pub(crate) struct Fold {
    pub(crate) index: usize,
    pub(crate) train_features: Vec<Vec<f64>>,
    pub(crate) train_labels: Vec<usize>,
    pub(crate) test_features: Vec<Vec<f64>>,
    pub(crate) test_labels: Vec<usize>,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return the fold-shuffling seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Assign every row to a fold, stratified by class.
    ///
    /// Rows of each class are shuffled and dealt round-robin, continuing
    /// from where the previous class stopped, so fold sizes differ by at
    /// most one and no fold is empty.
    pub(crate) fn fold_assignments(&self, labels: &[usize]) -> Result<Vec<usize>, RfError> {
        if labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if labels.len() < self.n_folds {
            return Err(RfError::InsufficientRowsForFolds {
                n_samples: labels.len(),
                n_folds: self.n_folds,
            });
        }

        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignments = vec![0usize; labels.len()];
        let mut offset = 0;
        for (class, indices) in class_indices.iter_mut().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                warn!(
                    class,
                    count = indices.len(),
                    n_folds = self.n_folds,
                    "class has fewer rows than folds"
                );
            }
            indices.shuffle(&mut rng);
            for &idx in indices.iter() {
                assignments[idx] = offset % self.n_folds;
                offset += 1;
            }
        }

        Ok(assignments)
    }

    /// Materialize the train/validation partitions.
    pub(crate) fn folds(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<Vec<Fold>, RfError> {
        validate_dataset(features, labels)?;
        let assignments = self.fold_assignments(labels)?;

        let mut folds: Vec<Fold> = (0..self.n_folds)
            .map(|index| Fold {
                index,
                train_features: Vec::new(),
                train_labels: Vec::new(),
                test_features: Vec::new(),
                test_labels: Vec::new(),
            })
            .collect();

        for (i, &assigned) in assignments.iter().enumerate() {
            for fold in &mut folds {
                if fold.index == assigned {
                    fold.test_features.push(features[i].clone());
                    fold.test_labels.push(labels[i]);
                } else {
                    fold.train_features.push(features[i].clone());
                    fold.train_labels.push(labels[i]);
                }
            }
        }

        Ok(folds)
    }

    /// Run stratified k-fold cross-validation of a single configuration.
    ///
    /// Fold `f` trains with seed `config.seed + f`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero samples |
    /// | [`RfError::InsufficientRowsForFolds`] | Fewer rows than folds |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        let folds = self.folds(features, labels)?;
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);
        let mut confusion_matrix: Option<ConfusionMatrix> = None;
        let mut all_importances: Vec<Vec<f64>> = Vec::new();

        for fold in &folds {
            let cm = fit_and_score_fold(config, fold, feature_names, n_classes, &mut all_importances)?;
            fold_accuracies.push(cm.accuracy());
            debug!(fold = fold.index, accuracy = cm.accuracy(), "fold completed");
            match confusion_matrix.as_mut() {
                Some(total) => total.merge(&cm),
                None => confusion_matrix = Some(cm),
            }
        }

        let (mean_accuracy, std_accuracy) = mean_and_std(&fold_accuracies);
        let confusion_matrix = confusion_matrix.ok_or(RfError::EmptyDataset)?;
        let feature_importances = aggregate_importances(&all_importances, feature_names);

        info!(mean_accuracy, std_accuracy, "cross-validation complete");

        Ok(CrossValidationResult {
            fold_accuracies,
            confusion_matrix,
            mean_accuracy,
            std_accuracy,
            feature_importances,
            n_folds: self.n_folds,
            n_samples: features.len(),
        })
    }
}

/// Fit `config` on a fold's training rows and score its validation rows.
///
/// Appends each tree's importances to `importances`.
pub(crate) fn fit_and_score_fold(
    config: &RandomForestConfig,
    fold: &Fold,
    feature_names: &[String],
    n_classes: usize,
    importances: &mut Vec<Vec<f64>>,
) -> Result<ConfusionMatrix, RfError> {
    let fold_config = config
        .clone()
        .with_seed(config.seed.wrapping_add(fold.index as u64));
    let result = fold_config.fit(&fold.train_features, &fold.train_labels, feature_names)?;
    let predictions = result.forest().predict_batch(&fold.test_features)?;
    importances.extend(result.forest().trees.iter().map(|t| t.feature_importances()));
    ConfusionMatrix::from_labels(&fold.test_labels, &predictions, n_classes)
}

/// Mean and population standard deviation.
pub(crate) fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
