//! Seeded train/test split.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use careerpath_rf::RfError;

use crate::IoError;

/// Hold-out split configuration.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `test_fraction` | 0.2     |
/// | `seed`          | 42      |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    test_fraction: f64,
    seed: u64,
}

impl SplitConfig {
    /// Hold out `test_fraction` of the rows.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidTestFraction`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64) -> Result<Self, IoError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(IoError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        Ok(Self {
            test_fraction,
            seed: 42,
        })
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the held-out fraction.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Return the shuffle seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Rows on each side of a split, in shuffled order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    /// Training feature rows.
    pub train_features: Vec<Vec<f64>>,
    /// Training labels.
    pub train_labels: Vec<usize>,
    /// Held-out feature rows.
    pub test_features: Vec<Vec<f64>>,
    /// Held-out labels.
    pub test_labels: Vec<usize>,
}

/// Shuffle rows with the configured seed and hold out
/// `ceil(test_fraction * n)` of them.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::Model`] wrapping [`RfError::LabelCountMismatch`] | `features` and `labels` differ in length |
/// | [`IoError::EmptySplit`] | Either side would be empty |
#[instrument(skip_all, fields(n_samples = features.len(), test_fraction = config.test_fraction))]
pub fn train_test_split(
    features: &[Vec<f64>],
    labels: &[usize],
    config: &SplitConfig,
) -> Result<TrainTestSplit, IoError> {
    let n_samples = features.len();
    if labels.len() != n_samples {
        return Err(RfError::LabelCountMismatch {
            n_samples,
            n_labels: labels.len(),
        }
        .into());
    }
    let n_test = (config.test_fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(IoError::EmptySplit { n_samples, n_test });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(config.seed));
    let (test_idx, train_idx) = indices.split_at(n_test);

    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
        idx.iter().map(|&i| (features[i].clone(), labels[i])).unzip()
    };
    let (train_features, train_labels) = pick(train_idx);
    let (test_features, test_labels) = pick(test_idx);

    debug!(n_train = train_labels.len(), n_test = test_labels.len(), "split done");

    Ok(TrainTestSplit {
        train_features,
        train_labels,
        test_features,
        test_labels,
    })
}
