//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::importance::{RankedFeature, aggregate_importances};
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, to_columns};

/// A fitted Random Forest ensemble.
///
/// Immutable once trained; bound to the feature order given at fit time
/// and to the zero-based class index space of the training labels.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Check shape, alignment and finiteness of a training set.
///
/// Returns the feature width on success.
pub(crate) fn validate_dataset(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Draw `n_samples` indices with replacement.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_dataset(features, labels)?;
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameCountMismatch {
            n_names: feature_names.len(),
            n_features,
        });
    }
    config.validate()?;
    let max_features = config.max_features.resolve(n_features)?;

    let n_samples = features.len();
    let n_classes = labels.iter().max().map_or(1, |&m| m + 1);

    debug!(
        n_features,
        n_classes,
        max_features,
        bootstrap = config.bootstrap,
        "training random forest"
    );

    // Per-tree seeds come from one master RNG so the ensemble does not
    // depend on how rayon schedules the trees.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let columns = to_columns(features, n_features);
    let all_samples: Vec<usize> = (0..n_samples).collect();
    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tree_config = tree_config.clone().with_seed(rng.r#gen());
            if config.bootstrap {
                let sample = bootstrap_sample(n_samples, &mut rng);
                tree_config.fit_columns(&columns, labels, &sample, n_classes)
            } else {
                tree_config.fit_columns(&columns, labels, &all_samples, n_classes)
            }
        })
        .collect();

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        feature_names: feature_names.to_vec(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_classes,
        n_samples,
        max_features_resolved: max_features,
    };

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_classes,
        mean_depth = forest.mean_depth(),
        "random forest trained"
    );

    Ok(RandomForestResult::new(forest, importances, metadata))
}

impl RandomForest {
    /// Average depth across trees.
    #[must_use]
    pub fn mean_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.depth() as f64).sum::<f64>() / self.trees.len() as f64
    }

    /// Borrow the individual trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean decrease in impurity across trees, normalized and ranked.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<RankedFeature> {
        let per_tree: Vec<Vec<f64>> = self.trees.iter().map(DecisionTree::feature_importances).collect();
        aggregate_importances(&per_tree, &self.feature_names)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::error::RfError;

    /// Three well-separated classes along the first feature.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3 {
            for i in 0..20 {
                features.push(vec![class as f64 * 10.0 + i as f64 * 0.15, 0.5]);
                labels.push(class);
            }
        }
        let names = vec!["x".to_string(), "y".to_string()];
        (features, labels, names)
    }

    #[test]
    fn three_class_separable_accuracy() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit(&features, &labels, &names)
            .unwrap();

        let predictions = result.forest().predict_batch(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels, names) = make_separable_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(99)
                .fit(&features, &labels, &names)
                .unwrap()
                .into_forest()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn different_seeds_change_the_ensemble() {
        let (features, labels, names) = make_separable_data();
        let a = RandomForestConfig::new(5).unwrap().with_seed(1);
        let b = a.clone().with_seed(2);
        let fa = a.fit(&features, &labels, &names).unwrap().into_forest();
        let fb = b.fit(&features, &labels, &names).unwrap().into_forest();
        assert_ne!(fa, fb);
    }

    #[test]
    fn without_bootstrap_trees_see_every_sample() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(3)
            .unwrap()
            .with_bootstrap(false)
            .fit(&features, &labels, &names)
            .unwrap();
        for tree in result.forest().trees() {
            assert_eq!(tree.nodes[0].n_samples(), features.len());
        }
    }

    #[test]
    fn importances_sum_to_one() {
        let (features, labels, names) = make_separable_data();
        let result = RandomForestConfig::new(20).unwrap().fit(&features, &labels, &names).unwrap();
        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
        assert_eq!(result.importances()[0].name, "x");
        assert_eq!(result.forest().feature_importances(), result.importances());
    }

    #[test]
    fn empty_dataset_error() {
        let err = RandomForestConfig::new(10).unwrap().fit(&[], &[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
        assert!(err.is_training_error());
    }

    #[test]
    fn label_length_mismatch_error() {
        let (features, labels, names) = make_separable_data();
        let err = RandomForestConfig::new(10)
            .unwrap()
            .fit(&features, &labels[..10], &names)
            .unwrap_err();
        assert!(matches!(err, RfError::LabelCountMismatch { .. }));
        assert!(err.is_training_error());
    }

    #[test]
    fn feature_name_count_checked() {
        let (features, labels, _) = make_separable_data();
        let err = RandomForestConfig::new(10)
            .unwrap()
            .fit(&features, &labels, &["x".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::FeatureNameCountMismatch {
                n_names: 1,
                n_features: 2
            }
        ));
    }
}
