use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use careerpath_io::{
    ArtifactStore, CareerProfile, DatasetReader, EvaluationReport, ExperimentName, FeaturePreparer,
    LabelEncoder, ResultWriter, RunSummary, SplitConfig, train_test_split,
};
use careerpath_rf::{
    CrossValidation, GridSearch, HyperParams, MaxFeatures, ParamGrid, RandomForestConfig,
    RandomizedSearch, Scoring, Trainer,
};

#[derive(Parser)]
#[command(name = "careerpath")]
#[command(about = "Predict a student's career field with a random forest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the split, folds and forest
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Forest parameters shared by baseline training and the search base.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the baseline forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum tree depth (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Features considered per split: "sqrt", "log2" or "all"
    #[arg(long, default_value = "sqrt")]
    max_features: String,
}

/// Hyperparameter search options.
#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// Select hyperparameters by cross-validated grid search
    #[arg(long, default_value_t = false)]
    search: bool,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    cv_folds: usize,

    /// Fold scoring rule: "accuracy" or "macro-f1"
    #[arg(long, default_value = "accuracy")]
    scoring: String,

    /// Evaluate only this many sampled grid points instead of the full grid
    #[arg(long)]
    n_iter: Option<usize>,

    /// In baseline mode, also report cross-validated accuracy on the training split
    #[arg(long, default_value_t = false)]
    cross_validate: bool,
}

/// A student profile; defaults match the web form.
#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    #[arg(long, default_value_t = 7.5)]
    gpa: f64,
    #[arg(long, default_value_t = 3.0)]
    extracurricular_activities: f64,
    #[arg(long, default_value_t = 1.0)]
    internships: f64,
    #[arg(long, default_value_t = 2.0)]
    projects: f64,
    #[arg(long, default_value_t = 0.0)]
    leadership_positions: f64,
    #[arg(long, default_value_t = 5.0)]
    field_specific_courses: f64,
    #[arg(long, default_value_t = 0.0)]
    research_experience: f64,
    #[arg(long, default_value_t = 3.0)]
    coding_skills: f64,
    #[arg(long, default_value_t = 4.0)]
    communication_skills: f64,
    #[arg(long, default_value_t = 4.0)]
    problem_solving_skills: f64,
    #[arg(long, default_value_t = 4.0)]
    teamwork_skills: f64,
    #[arg(long, default_value_t = 4.0)]
    analytical_skills: f64,
    #[arg(long, default_value_t = 3.0)]
    presentation_skills: f64,
    #[arg(long, default_value_t = 2.0)]
    networking_skills: f64,
    #[arg(long, default_value_t = 1.0)]
    industry_certifications: f64,
}

impl From<ProfileArgs> for CareerProfile {
    fn from(a: ProfileArgs) -> Self {
        CareerProfile {
            gpa: a.gpa,
            extracurricular_activities: a.extracurricular_activities,
            internships: a.internships,
            projects: a.projects,
            leadership_positions: a.leadership_positions,
            field_specific_courses: a.field_specific_courses,
            research_experience: a.research_experience,
            coding_skills: a.coding_skills,
            communication_skills: a.communication_skills,
            problem_solving_skills: a.problem_solving_skills,
            teamwork_skills: a.teamwork_skills,
            analytical_skills: a.analytical_skills,
            presentation_skills: a.presentation_skills,
            networking_skills: a.networking_skills,
            industry_certifications: a.industry_certifications,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Train a classifier on the career dataset, evaluate it and save artifacts
    Train {
        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long, default_value = "career_field")]
        experiment: String,

        /// Output directory for the evaluation report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Directory for the model and label encoder artifacts
        #[arg(long, default_value = ".")]
        artifacts_dir: PathBuf,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Print the classification report to stderr
        #[arg(long, default_value_t = false)]
        show_report: bool,

        #[command(flatten)]
        forest: ForestArgs,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Predict the career field for one student profile
    Predict {
        /// Directory holding the model and label encoder artifacts
        #[arg(long, default_value = ".")]
        artifacts: PathBuf,

        /// Number of most probable fields to list
        #[arg(long, default_value_t = 3)]
        top_k: usize,

        #[command(flatten)]
        profile: ProfileArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    mode: &'static str,
    n_train: usize,
    n_test: usize,
    n_classes: usize,
    n_trees: usize,
    test_accuracy: f64,
    macro_f1: f64,
    cv_mean_accuracy: Option<f64>,
    best_params: Option<HyperParams>,
    best_cv_score: Option<f64>,
    model_path: PathBuf,
    encoder_path: PathBuf,
    report_path: PathBuf,
}

#[derive(Serialize)]
struct PredictOutput {
    field: String,
    top_k: Vec<FieldProbability>,
}

#[derive(Serialize)]
struct FieldProbability {
    field: String,
    probability: f64,
}

fn parse_max_features(s: &str) -> Result<MaxFeatures> {
    match s {
        "sqrt" => Ok(MaxFeatures::Sqrt),
        "log2" => Ok(MaxFeatures::Log2),
        "all" => Ok(MaxFeatures::All),
        other => anyhow::bail!("unknown max features: {other} (expected sqrt, log2, or all)"),
    }
}

fn parse_scoring(s: &str) -> Result<Scoring> {
    match s {
        "accuracy" => Ok(Scoring::Accuracy),
        "macro-f1" => Ok(Scoring::MacroF1),
        other => anyhow::bail!("unknown scoring: {other} (expected accuracy or macro-f1)"),
    }
}

fn build_trainer(forest: &ForestArgs, search: &SearchArgs, seed: u64) -> Result<Trainer> {
    let base = RandomForestConfig::baseline()
        .with_n_trees(forest.n_trees)?
        .with_max_depth(forest.max_depth)
        .with_max_features(parse_max_features(&forest.max_features)?)
        .with_seed(seed);

    if !search.search {
        return Ok(Trainer::Baseline(base));
    }

    let cv = CrossValidation::new(search.cv_folds)?.with_seed(seed);
    let grid_search = GridSearch::new(cv)
        .with_scoring(parse_scoring(&search.scoring)?)
        .with_base(base);
    let grid_search = match search.n_iter {
        Some(n_iter) => grid_search
            .with_strategy(RandomizedSearch::new(ParamGrid::new(), n_iter)?.with_seed(seed)),
        None => grid_search,
    };
    Ok(Trainer::Search(grid_search))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            experiment,
            output_dir,
            artifacts_dir,
            test_fraction,
            show_report,
            forest,
            search,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let trainer = build_trainer(&forest, &search, cli.seed)?;

            // 1. Load and prepare
            let table = DatasetReader::new(&data)
                .read()
                .context("failed to read input CSV")?;
            let prepared = FeaturePreparer::default()
                .prepare(&table)
                .context("failed to prepare features")?;

            // 2. Encode labels and split
            let encoder = LabelEncoder::fit(&prepared.labels).context("failed to fit label encoder")?;
            let labels = encoder.encode_all(&prepared.labels)?;
            let split_config = SplitConfig::new(test_fraction)?.with_seed(cli.seed);
            let split = train_test_split(&prepared.features, &labels, &split_config)
                .context("failed to split dataset")?;
            info!(
                n_train = split.train_labels.len(),
                n_test = split.test_labels.len(),
                n_classes = encoder.n_classes(),
                "dataset split"
            );

            // 3. Optional cross-validated estimate of the baseline
            let cv_mean_accuracy = match &trainer {
                Trainer::Baseline(config) if search.cross_validate => {
                    let cv_result = CrossValidation::new(search.cv_folds)?
                        .with_seed(cli.seed)
                        .evaluate(
                            config,
                            &split.train_features,
                            &split.train_labels,
                            &prepared.feature_names,
                        )
                        .context("cross-validation failed")?;
                    info!(
                        mean_accuracy = cv_result.mean_accuracy,
                        std_accuracy = cv_result.std_accuracy,
                        "cross-validation complete"
                    );
                    Some(cv_result.mean_accuracy)
                }
                _ => None,
            };

            // 4. Train
            let outcome = trainer
                .fit(&split.train_features, &split.train_labels, &prepared.feature_names)
                .context("training failed")?;
            let (result, search_report) = outcome.into_parts();
            let model = result.into_forest();

            // 5. Evaluate on the held-out split
            let report = EvaluationReport::compute(
                &model,
                &split.test_features,
                &split.test_labels,
                &encoder,
            )
            .context("evaluation failed")?;
            if show_report {
                eprintln!("{report}");
            }

            // 6. Persist artifacts
            let store = ArtifactStore::new(&artifacts_dir);
            store
                .save(&model, &encoder)
                .context("failed to save artifacts")?;

            // 7. Write evaluation JSON
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let summary = RunSummary {
                mode: trainer.mode().to_string(),
                n_train: split.train_labels.len(),
                n_test: split.test_labels.len(),
                n_features: prepared.feature_names.len(),
                seed: cli.seed,
            };
            let report_path = writer.write_evaluation(&summary, &report, search_report.as_ref())?;

            // 8. Print summary
            let output = TrainOutput {
                experiment,
                mode: trainer.mode(),
                n_train: summary.n_train,
                n_test: summary.n_test,
                n_classes: encoder.n_classes(),
                n_trees: model.n_trees(),
                test_accuracy: report.accuracy,
                macro_f1: report.macro_avg.f1,
                cv_mean_accuracy,
                best_params: search_report.as_ref().map(|s| s.best_params),
                best_cv_score: search_report.as_ref().map(|s| s.best_score),
                model_path: store.model_path(),
                encoder_path: store.encoder_path(),
                report_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            artifacts,
            top_k,
            profile,
        } => {
            let predictor = ArtifactStore::new(&artifacts)
                .load_predictor()
                .context("failed to load artifacts")?;
            info!(
                n_trees = predictor.forest().n_trees(),
                n_classes = predictor.classes().len(),
                "artifacts loaded"
            );

            let profile = CareerProfile::from(profile);
            let field = predictor.predict(&profile).context("prediction failed")?;
            let ranked = predictor
                .predict_top_k(&profile, top_k)
                .context("prediction failed")?;

            let output = PredictOutput {
                field,
                top_k: ranked
                    .into_iter()
                    .map(|(field, probability)| FieldProbability { field, probability })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
