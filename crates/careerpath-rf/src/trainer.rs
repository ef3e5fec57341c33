//! Training entry point: a fixed baseline fit or a cross-validated search.

use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::search::{GridSearch, SearchReport};

/// How the final forest is obtained.
#[derive(Debug)]
pub enum Trainer {
    /// Fit one forest with the given configuration on all training rows.
    Baseline(RandomForestConfig),
    /// Select a configuration by cross-validated search, then refit it.
    Search(GridSearch),
}

/// The fitted forest plus, in search mode, the search report.
#[derive(Debug)]
pub struct TrainingOutcome {
    result: RandomForestResult,
    search: Option<SearchReport>,
}

impl TrainingOutcome {
    /// Borrow the training result.
    #[must_use]
    pub fn result(&self) -> &RandomForestResult {
        &self.result
    }

    /// The search report, if the forest was chosen by search.
    #[must_use]
    pub fn search(&self) -> Option<&SearchReport> {
        self.search.as_ref()
    }

    /// Split into the training result and the optional search report.
    #[must_use]
    pub fn into_parts(self) -> (RandomForestResult, Option<SearchReport>) {
        (self.result, self.search)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Trainer::Baseline(RandomForestConfig::baseline())
    }
}

impl Trainer {
    /// Short name of the mode, used in logs and reports.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Trainer::Baseline(_) => "baseline",
            Trainer::Search(_) => "search",
        }
    }

    /// Produce a fitted forest from the training split.
    ///
    /// # Errors
    ///
    /// Any [`RfError`] from [`RandomForestConfig::fit`] or [`GridSearch::fit`];
    /// an empty split, fewer rows than folds, or a length mismatch between
    /// `features` and `labels` are reported as training errors.
    #[instrument(skip_all, fields(mode = self.mode(), n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<TrainingOutcome, RfError> {
        let outcome = match self {
            Trainer::Baseline(config) => TrainingOutcome {
                result: config.fit(features, labels, feature_names)?,
                search: None,
            },
            Trainer::Search(search) => {
                let (report, result) = search.fit(features, labels, feature_names)?.into_parts();
                TrainingOutcome {
                    result,
                    search: Some(report),
                }
            }
        };
        info!(
            n_trees = outcome.result.forest().n_trees(),
            n_classes = outcome.result.forest().n_classes(),
            "trainer finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::CrossValidation;
    use crate::search::ParamGrid;

    fn data() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let features: Vec<Vec<f64>> = (0..24).map(|i| vec![i as f64, (i % 2) as f64]).collect();
        let labels: Vec<usize> = (0..24).map(|i| i / 8).collect();
        (features, labels, vec!["a".into(), "b".into()])
    }

    #[test]
    fn baseline_has_no_search_report() {
        let (features, labels, names) = data();
        let trainer = Trainer::Baseline(RandomForestConfig::new(10).unwrap());
        let outcome = trainer.fit(&features, &labels, &names).unwrap();
        assert!(outcome.search().is_none());
        assert_eq!(outcome.result().forest().n_trees(), 10);
    }

    #[test]
    fn search_mode_reports_winner() {
        let (features, labels, names) = data();
        let grid = ParamGrid::new()
            .with_n_trees(vec![3, 6])
            .with_max_depth(vec![None])
            .with_min_samples_split(vec![2])
            .with_min_samples_leaf(vec![1]);
        let trainer = Trainer::Search(GridSearch::new(CrossValidation::new(3).unwrap()).with_strategy(grid));
        let outcome = trainer.fit(&features, &labels, &names).unwrap();
        let report = outcome.search().unwrap();
        assert_eq!(report.candidates.len(), 4);
        assert_eq!(outcome.result().forest().n_trees(), report.best_params.n_trees);
    }

    #[test]
    fn empty_split_is_training_error() {
        let err = Trainer::default().fit(&[], &[], &[]).unwrap_err();
        assert!(err.is_training_error());
    }
}
