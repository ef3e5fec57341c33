use rand::Rng;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node from its class counts. Zero for an empty node.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        let proportions = class_counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| c as f64 / n);
        match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        }
    }
}

/// The chosen split for one node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: usize,
    pub(crate) threshold: f64,
    /// `n · I(parent) − n_l · I(left) − n_r · I(right)`.
    pub(crate) gain: f64,
    pub(crate) left: Vec<usize>,
    pub(crate) right: Vec<usize>,
}

/// Exhaustive threshold search over a random feature subset.
///
/// `columns[feature][sample]` is column-major; sample indices passed to
/// [`Splitter::best_split`] index into the inner vectors.
pub(crate) struct Splitter<'a> {
    pub(crate) columns: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: usize,
}

impl Splitter<'_> {
    /// Find the split with the largest impurity decrease among
    /// `max_features` randomly drawn features.
    ///
    /// Returns `None` when every candidate feature is constant over
    /// `samples` or every boundary would violate `min_samples_leaf`.
    pub(crate) fn best_split(
        &self,
        samples: &[usize],
        class_counts: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = self.columns.len();
        let n_samples = samples.len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }
        let parent = self.criterion.impurity(class_counts, n_samples) * n_samples as f64;

        // Partial Fisher-Yates over the feature indices.
        let mut order: Vec<usize> = (0..n_features).collect();
        let take = self.max_features.min(n_features);
        for i in 0..take {
            let j = rng.gen_range(i..n_features);
            order.swap(i, j);
        }

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

        for &feature in &order[..take] {
            let column = &self.columns[feature];
            sorted.clear();
            sorted.extend(samples.iter().map(|&s| (column[s], self.labels[s])));
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            if sorted[0].0 == sorted[n_samples - 1].0 {
                continue;
            }

            let mut left = vec![0usize; self.n_classes];
            let mut right = class_counts.to_vec();

            for i in 0..n_samples - 1 {
                let (value, class) = sorted[i];
                left[class] += 1;
                right[class] -= 1;

                let next = sorted[i + 1].0;
                if value == next {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n_samples - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let gain = parent
                    - n_left as f64 * self.criterion.impurity(&left, n_left)
                    - n_right as f64 * self.criterion.impurity(&right, n_right);

                if best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((feature, (value + next) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        let column = &self.columns[feature];
        let (left, right): (Vec<usize>, Vec<usize>) =
            samples.iter().partition(|&&s| column[s] <= threshold);

        Some(SplitResult {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn splitter<'a>(
        columns: &'a [Vec<f64>],
        labels: &'a [usize],
        min_samples_leaf: usize,
    ) -> Splitter<'a> {
        Splitter {
            columns,
            labels,
            n_classes: 2,
            criterion: SplitCriterion::Gini,
            min_samples_leaf,
            max_features: columns.len(),
        }
    }

    #[test]
    fn gini_values() {
        assert_eq!(SplitCriterion::Gini.impurity(&[10, 0, 0], 10), 0.0);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_values() {
        assert_eq!(SplitCriterion::Entropy.impurity(&[10, 0], 10), 0.0);
        let balanced = SplitCriterion::Entropy.impurity(&[5, 5], 10);
        assert!((balanced - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn separable_feature_is_chosen() {
        let columns = vec![vec![7.0, 7.0, 7.0, 7.0, 7.0, 7.0], vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let samples: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = splitter(&columns, &labels, 1)
            .best_split(&samples, &[3, 3], &mut rng)
            .expect("split exists");
        assert_eq!(split.feature, 1);
        assert!((split.threshold - 6.5).abs() < f64::EPSILON);
        assert_eq!(split.left, vec![0, 1, 2]);
        assert_eq!(split.right, vec![3, 4, 5]);
        assert!((split.gain - 3.0).abs() < 1e-10);
    }

    #[test]
    fn constant_feature_yields_none() {
        let columns = vec![vec![5.0; 4]];
        let labels = vec![0, 0, 1, 1];
        let samples: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(
            splitter(&columns, &labels, 1)
                .best_split(&samples, &[2, 2], &mut rng)
                .is_none()
        );
    }

    #[test]
    fn min_samples_leaf_blocks_split() {
        let columns = vec![vec![1.0, 10.0]];
        let labels = vec![0, 1];
        let samples = vec![0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(
            splitter(&columns, &labels, 2)
                .best_split(&samples, &[1, 1], &mut rng)
                .is_none()
        );
    }
}
