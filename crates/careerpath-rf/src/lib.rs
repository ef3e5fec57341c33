//! Random Forest classification: train, search, evaluate, predict.
//!
//! CART decision trees with Gini/Entropy splits, bagged into a forest trained
//! in parallel with rayon. Around the forest sit stratified k-fold
//! cross-validation, a cross-validated hyperparameter search with a
//! replaceable [`SearchStrategy`], the [`Trainer`] that picks between a
//! baseline fit and a search, confusion-matrix metrics, and versioned
//! bincode persistence.
//!
//! All randomness flows from `u64` seeds through `ChaCha8Rng`, so identical
//! inputs and seeds give identical forests regardless of thread count.

mod config;
mod confusion;
mod cv;
mod error;
mod forest;
mod importance;
mod node;
mod predict;
mod result;
mod search;
mod serialize;
mod split;
mod trainer;
mod tree;

pub use config::{MaxFeatures, RandomForestConfig};
pub use confusion::{AveragedMetrics, ClassMetrics, ConfusionMatrix};
pub use cv::{CrossValidation, CrossValidationResult};
pub use error::RfError;
pub use forest::RandomForest;
pub use importance::RankedFeature;
pub use node::{Node, NodeIndex};
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use search::{
    CandidateScore, GridSearch, HyperParams, ParamGrid, RandomizedSearch, Scoring, SearchReport,
    SearchResult, SearchStrategy,
};
pub use serialize::write_atomic;
pub use split::SplitCriterion;
pub use trainer::{Trainer, TrainingOutcome};
pub use tree::{DecisionTree, DecisionTreeConfig};
