//! Cross-validated hyperparameter search.
//!
//! A [`SearchStrategy`] enumerates candidate [`HyperParams`] in a fixed
//! order; [`GridSearch`] scores every candidate on every fold in parallel
//! and refits the winner on the full training set.

use std::fmt;

use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{MaxFeatures, RandomForestConfig};
use crate::confusion::ConfusionMatrix;
use crate::cv::{CrossValidation, fit_and_score_fold, mean_and_std};
use crate::error::RfError;
use crate::result::RandomForestResult;

/// One point of the search space.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HyperParams {
    /// Number of trees.
    pub n_trees: usize,
    /// Features considered per split.
    pub max_features: MaxFeatures,
    /// Depth limit, `None` for unlimited.
    pub max_depth: Option<usize>,
    /// Minimum rows required to split a node.
    pub min_samples_split: usize,
    /// Minimum rows in each child.
    pub min_samples_leaf: usize,
}

impl HyperParams {
    /// Overlay these parameters on `base`, keeping its criterion, bootstrap
    /// flag and seed.
    ///
    /// # Errors
    ///
    /// Returns the config validation error for an invalid parameter value.
    pub fn apply(&self, base: &RandomForestConfig) -> Result<RandomForestConfig, RfError> {
        let config = base
            .clone()
            .with_n_trees(self.n_trees)?
            .with_max_features(self.max_features)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf);
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        write!(
            f,
            "n_trees={} max_features={} max_depth={} min_samples_split={} min_samples_leaf={}",
            self.n_trees, self.max_features, depth, self.min_samples_split, self.min_samples_leaf
        )
    }
}

/// A source of candidate configurations.
///
/// Candidates are returned in a fixed order; earlier candidates win ties.
pub trait SearchStrategy: fmt::Debug + Send + Sync {
    /// Enumerate the candidates to evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::EmptySearchSpace`] when no candidate can be produced.
    fn candidates(&self) -> Result<Vec<HyperParams>, RfError>;
}

/// Exhaustive Cartesian product of per-parameter value lists.
///
/// Enumeration order, outermost to innermost: `max_depth`, `max_features`,
/// `min_samples_leaf`, `min_samples_split`, `n_trees`.
///
/// # Defaults
///
/// | Parameter           | Values                 |
/// |---------------------|------------------------|
/// | `n_trees`           | 50, 100, 200           |
/// | `max_features`      | sqrt, log2             |
/// | `max_depth`         | 10, 20, unlimited      |
/// | `min_samples_split` | 2, 5, 10               |
/// | `min_samples_leaf`  | 1, 2, 4                |
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    n_trees: Vec<usize>,
    max_features: Vec<MaxFeatures>,
    max_depth: Vec<Option<usize>>,
    min_samples_split: Vec<usize>,
    min_samples_leaf: Vec<usize>,
}

impl ParamGrid {
    /// Create a grid with the default value lists.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_trees: vec![50, 100, 200],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
            max_depth: vec![Some(10), Some(20), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }

    /// A grid containing exactly one point.
    #[must_use]
    pub fn single(params: HyperParams) -> Self {
        Self {
            n_trees: vec![params.n_trees],
            max_features: vec![params.max_features],
            max_depth: vec![params.max_depth],
            min_samples_split: vec![params.min_samples_split],
            min_samples_leaf: vec![params.min_samples_leaf],
        }
    }

    /// Replace the tree-count values.
    #[must_use]
    pub fn with_n_trees(mut self, values: Vec<usize>) -> Self {
        self.n_trees = values;
        self
    }

    /// Replace the max-features values.
    #[must_use]
    pub fn with_max_features(mut self, values: Vec<MaxFeatures>) -> Self {
        self.max_features = values;
        self
    }

    /// Replace the depth-limit values.
    #[must_use]
    pub fn with_max_depth(mut self, values: Vec<Option<usize>>) -> Self {
        self.max_depth = values;
        self
    }

    /// Replace the min-samples-split values.
    #[must_use]
    pub fn with_min_samples_split(mut self, values: Vec<usize>) -> Self {
        self.min_samples_split = values;
        self
    }

    /// Replace the min-samples-leaf values.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, values: Vec<usize>) -> Self {
        self.min_samples_leaf = values;
        self
    }

    /// Number of grid points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_trees.len()
            * self.max_features.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    /// `true` when any axis has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn empty_axis(&self) -> Option<&'static str> {
        if self.n_trees.is_empty() {
            Some("n_trees")
        } else if self.max_features.is_empty() {
            Some("max_features")
        } else if self.max_depth.is_empty() {
            Some("max_depth")
        } else if self.min_samples_split.is_empty() {
            Some("min_samples_split")
        } else if self.min_samples_leaf.is_empty() {
            Some("min_samples_leaf")
        } else {
            None
        }
    }
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for ParamGrid {
    fn candidates(&self) -> Result<Vec<HyperParams>, RfError> {
        if let Some(axis) = self.empty_axis() {
            return Err(RfError::EmptySearchSpace {
                reason: format!("no values for {axis}"),
            });
        }
        let mut out = Vec::with_capacity(self.len());
        for &max_depth in &self.max_depth {
            for &max_features in &self.max_features {
                for &min_samples_leaf in &self.min_samples_leaf {
                    for &min_samples_split in &self.min_samples_split {
                        for &n_trees in &self.n_trees {
                            out.push(HyperParams {
                                n_trees,
                                max_features,
                                max_depth,
                                min_samples_split,
                                min_samples_leaf,
                            });
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// A seeded random subset of a [`ParamGrid`].
///
/// Sampled candidates keep their grid enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomizedSearch {
    grid: ParamGrid,
    n_iter: usize,
    seed: u64,
}

impl RandomizedSearch {
    /// Sample `n_iter` points from `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::EmptySearchSpace`] if `n_iter` is zero.
    pub fn new(grid: ParamGrid, n_iter: usize) -> Result<Self, RfError> {
        if n_iter == 0 {
            return Err(RfError::EmptySearchSpace {
                reason: "n_iter must be at least 1".to_string(),
            });
        }
        Ok(Self {
            grid,
            n_iter,
            seed: 42,
        })
    }

    /// Set the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the requested number of samples.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl SearchStrategy for RandomizedSearch {
    fn candidates(&self) -> Result<Vec<HyperParams>, RfError> {
        let all = self.grid.candidates()?;
        if self.n_iter >= all.len() {
            return Ok(all);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut picked = index::sample(&mut rng, all.len(), self.n_iter).into_vec();
        picked.sort_unstable();
        Ok(picked.into_iter().map(|i| all[i]).collect())
    }
}

/// Rule used to score a validation fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Scoring {
    /// Fraction of correct predictions.
    #[default]
    Accuracy,
    /// Unweighted mean of per-class F1.
    MacroF1,
}

impl Scoring {
    /// Score a fold's confusion matrix.
    #[must_use]
    pub fn score(self, matrix: &ConfusionMatrix) -> f64 {
        match self {
            Scoring::Accuracy => matrix.accuracy(),
            Scoring::MacroF1 => matrix.macro_avg().f1,
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoring::Accuracy => f.write_str("accuracy"),
            Scoring::MacroF1 => f.write_str("macro_f1"),
        }
    }
}

/// Cross-validated score of one candidate.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CandidateScore {
    /// The evaluated parameters.
    pub params: HyperParams,
    /// Score on each validation fold, in fold order.
    pub fold_scores: Vec<f64>,
    /// Mean of `fold_scores`.
    pub mean_score: f64,
    /// Population standard deviation of `fold_scores`.
    pub std_score: f64,
}

/// Outcome of a hyperparameter search.
#[derive(Debug)]
pub struct SearchResult {
    candidates: Vec<CandidateScore>,
    best_index: usize,
    scoring: Scoring,
    result: RandomForestResult,
}

impl SearchResult {
    /// Every candidate's score, in enumeration order.
    #[must_use]
    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }

    /// Index of the winning candidate.
    #[must_use]
    pub fn best_index(&self) -> usize {
        self.best_index
    }

    /// The winning candidate.
    #[must_use]
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }

    /// The scoring rule the search maximized.
    #[must_use]
    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// The forest refit on the full training set with the winning parameters.
    #[must_use]
    pub fn result(&self) -> &RandomForestResult {
        &self.result
    }

    /// Consume the search and return the refit forest.
    #[must_use]
    pub fn into_result(self) -> RandomForestResult {
        self.result
    }

    /// Split into a serializable report and the refit forest.
    #[must_use]
    pub fn into_parts(self) -> (SearchReport, RandomForestResult) {
        let best = &self.candidates[self.best_index];
        let report = SearchReport {
            scoring: self.scoring,
            best_index: self.best_index,
            best_params: best.params,
            best_score: best.mean_score,
            candidates: self.candidates,
        };
        (report, self.result)
    }
}

/// Serializable summary of a finished search.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchReport {
    /// The scoring rule that was maximized.
    pub scoring: Scoring,
    /// Index of the winning candidate in `candidates`.
    pub best_index: usize,
    /// Parameters of the winning candidate.
    pub best_params: HyperParams,
    /// Mean validation score of the winning candidate.
    pub best_score: f64,
    /// Every candidate, in enumeration order.
    pub candidates: Vec<CandidateScore>,
}

/// Cross-validated search over a [`SearchStrategy`].
///
/// Every (candidate, fold) pair is trained independently on the rayon pool;
/// the candidate with the highest mean score wins, the earliest one on ties.
#[derive(Debug)]
pub struct GridSearch {
    strategy: Box<dyn SearchStrategy>,
    cv: CrossValidation,
    scoring: Scoring,
    base: RandomForestConfig,
}

impl GridSearch {
    /// Search the default [`ParamGrid`] with the given folds.
    #[must_use]
    pub fn new(cv: CrossValidation) -> Self {
        Self {
            strategy: Box::new(ParamGrid::new()),
            cv,
            scoring: Scoring::Accuracy,
            base: RandomForestConfig::baseline(),
        }
    }

    /// Replace the candidate source.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl SearchStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Set the scoring rule.
    #[must_use]
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Set the configuration that candidates are overlaid on.
    #[must_use]
    pub fn with_base(mut self, base: RandomForestConfig) -> Self {
        self.base = base;
        self
    }

    /// Return the fold configuration.
    #[must_use]
    pub fn cv(&self) -> &CrossValidation {
        &self.cv
    }

    /// Return the scoring rule.
    #[must_use]
    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Run the search and refit the winner on all of `features`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptySearchSpace`] | The strategy yields no candidates |
    /// | [`RfError::InsufficientRowsForFolds`] | Fewer rows than folds |
    /// | Config variants | A candidate holds an invalid parameter |
    /// | Training variants | From the underlying training |
    #[instrument(skip_all, fields(n_folds = self.cv.n_folds(), n_samples = features.len(), scoring = %self.scoring))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<SearchResult, RfError> {
        let params = self.strategy.candidates()?;
        if params.is_empty() {
            return Err(RfError::EmptySearchSpace {
                reason: "strategy produced no candidates".to_string(),
            });
        }
        let configs = params
            .iter()
            .map(|p| p.apply(&self.base))
            .collect::<Result<Vec<_>, _>>()?;

        let folds = self.cv.folds(features, labels)?;
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);

        info!(
            n_candidates = configs.len(),
            n_fits = configs.len() * folds.len(),
            "starting hyperparameter search"
        );

        let pairs: Vec<(usize, usize)> = (0..configs.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let scores: Vec<f64> = pairs
            .into_par_iter()
            .map(|(c, f)| -> Result<f64, RfError> {
                let mut importances = Vec::new();
                let cm = fit_and_score_fold(
                    &configs[c],
                    &folds[f],
                    feature_names,
                    n_classes,
                    &mut importances,
                )?;
                Ok(self.scoring.score(&cm))
            })
            .collect::<Result<_, _>>()?;

        let candidates: Vec<CandidateScore> = params
            .into_iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| {
                let (mean_score, std_score) = mean_and_std(fold_scores);
                debug!(%params, mean_score, std_score, "candidate scored");
                CandidateScore {
                    params,
                    fold_scores: fold_scores.to_vec(),
                    mean_score,
                    std_score,
                }
            })
            .collect();

        let mut best_index = 0;
        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.mean_score > candidates[best_index].mean_score {
                best_index = i;
            }
        }

        let best = &candidates[best_index];
        info!(
            best_index,
            best_score = best.mean_score,
            params = %best.params,
            "search complete, refitting best candidate"
        );

        let result = configs[best_index].fit(features, labels, feature_names)?;

        Ok(SearchResult {
            candidates,
            best_index,
            scoring: self.scoring,
            result,
        })
    }
}
