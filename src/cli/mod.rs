//! NoiseMap CLI Module
//!
//! Command-line interface for dataset generation, optimization, training and prediction.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::DatasetLoader;
use crate::inference::{FallbackChain, NoisePredictor};
use crate::optimizer::{
    FireflyConfig, FireflySearch, FitnessEvaluator, FitnessWeights, FruitFlyConfig, FruitFlySearch, Hyperparameters,
    LevelFitness, OptimizationOutcome, ParamBounds,
};
use crate::pipeline::{PipelineConfig, PipelineReport, TrainingPipeline};
use crate::synthetic::SyntheticNoiseData;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn row(key: &str, value: String) {
    println!("  {:<22} {}", muted(key), value.white());
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "noisemap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hybrid firefly / fruit-fly optimizer for noise classification models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Search used by `tune`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TuneStrategy {
    Firefly,
    Fruitfly,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a synthetic noise dataset
    Synth {
        /// Output dataset directory
        #[arg(short, long)]
        output: PathBuf,

        /// Number of samples
        #[arg(short = 'n', long, default_value = "500")]
        samples: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Optimize, train and persist the full model pipeline
    Optimize {
        /// Dataset directory
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of generations
        #[arg(short, long)]
        generations: Option<usize>,

        /// Override the population size
        #[arg(short, long)]
        population: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Tune hyperparameters of the noise-level model only
    Tune {
        /// Dataset directory
        #[arg(short, long)]
        data: PathBuf,

        /// Search strategy
        #[arg(short, long, value_enum, default_value = "firefly")]
        strategy: TuneStrategy,

        /// Population size
        #[arg(short, long, default_value = "20")]
        population: usize,

        /// Generations (firefly) or iterations (fruit-fly)
        #[arg(short, long, default_value = "30")]
        generations: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Select features with the fruit-fly search
    SelectFeatures {
        /// Dataset directory
        #[arg(short, long)]
        data: PathBuf,

        /// Flies per iteration
        #[arg(short, long, default_value = "20")]
        population: usize,

        /// Iterations
        #[arg(short, long, default_value = "50")]
        iterations: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Predict noise level, source and health impact from a features CSV
    Predict {
        /// Artifact directory
        #[arg(short, long)]
        model: PathBuf,

        /// Features CSV (header = feature names)
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show artifact status and optimization metadata
    Info {
        /// Artifact directory
        #[arg(short, long)]
        model: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_synth(output: &Path, samples: usize, seed: u64) -> anyhow::Result<()> {
    section("Synthetic Data");

    step_run(&format!("Generating {} samples", samples));
    let start = Instant::now();
    let dataset = SyntheticNoiseData::new(samples).with_seed(seed).generate()?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Saving → {}", output.display()));
    DatasetLoader::new().write_dir(&dataset, output)?;
    step_done(&format!("{} rows × {} features", dataset.n_samples(), dataset.n_features()));

    println!();
    Ok(())
}

pub fn cmd_optimize(
    data: &Path,
    output: &Path,
    config_path: Option<&Path>,
    generations: Option<usize>,
    population: Option<usize>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    section("Optimize");

    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(g) = generations {
        config.optimizer.generations = g;
    }
    if let Some(p) = population {
        config.optimizer.population_size = p;
    }
    if let Some(s) = seed {
        config.optimizer = config.optimizer.with_seed(s);
        config.split_seed = s;
    }

    step_run("Loading data");
    let dataset = DatasetLoader::new().load_dir(data)?;
    step_done(&format!("{} rows × {} features", dataset.n_samples(), dataset.n_features()));

    println!(
        "  {} {} generations × {} candidates",
        accent("›"),
        config.optimizer.generations,
        config.optimizer.population_size
    );
    let report = TrainingPipeline::new(config).run(&dataset, output)?;
    print_pipeline_report(&report);
    Ok(())
}

fn print_pipeline_report(report: &PipelineReport) {
    let hp = &report.champion.hyperparameters;
    let results = &report.results;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Optimization Complete".white().bold()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Fitness        ", &format!("{:.4}", report.champion.fitness)));
    line_box(&kv("Learning rate  ", &format!("{:.4}", hp.learning_rate)));
    line_box(&kv("Depth          ", &hp.depth.to_string()));
    line_box(&kv("L2 leaf reg    ", &format!("{:.3}", hp.l2_leaf_reg)));
    line_box(&kv("Iterations     ", &hp.iterations.to_string()));
    line_box(&kv("Features       ", &format!("{} selected", results.selected_features_count)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Level RMSE     ", &format!("{:.3} dB", results.metrics.noise_level_rmse)));
    line_box(&kv("Source acc.    ", &format!("{:.4}", results.metrics.noise_source_accuracy)));
    line_box(&kv("Health acc.    ", &format!("{:.4}", results.metrics.health_impact_accuracy)));
    line_box(&kv("Overfitting    ", &fmt_opt(report.training.overfitting_ratio)));
    line_box(&kv("Evaluations    ", &report.evaluations.to_string()));
    line_box(&kv("Time           ", &format!("{:.1}s", report.elapsed_secs)));
    line_box_empty();
    line_box_bottom();

    if let Some(dir) = &report.artifacts_dir {
        println!("  {} artifacts in {}", ok("✓"), dir.display());
    }
    println!("  {} {}", muted("Selected:"), results.selected_features.join(", "));
    println!();
}

pub fn cmd_tune(data: &Path, strategy: TuneStrategy, population: usize, generations: usize, seed: u64) -> anyhow::Result<()> {
    section("Tune");

    step_run("Loading data");
    let dataset = DatasetLoader::new().load_dir(data)?;
    step_done(&format!("{} rows × {} features", dataset.n_samples(), dataset.n_features()));

    let fitness = LevelFitness::new(&dataset);
    let bounds = ParamBounds::default();
    step_run(&format!("Searching with {:?}", strategy));
    let outcome = match strategy {
        TuneStrategy::Firefly => {
            let config = FireflyConfig::new()
                .with_population_size(population)
                .with_max_generations(generations)
                .with_seed(seed);
            FireflySearch::new(config, bounds).optimize(&fitness, None)?
        }
        TuneStrategy::Fruitfly => {
            let config = FruitFlyConfig::new()
                .with_population_size(population)
                .with_max_iterations(generations)
                .with_seed(seed);
            FruitFlySearch::new(config).optimize_hyperparameters(&bounds, &fitness)?
        }
    };
    step_done(&format!("{} evaluations in {:.1}s", outcome.evaluations, outcome.elapsed_secs));

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &OptimizationOutcome) {
    let hp = &outcome.champion.hyperparameters;
    println!();
    row("Fitness", format!("{:.4}", outcome.champion.fitness));
    row("Level CV MSE", format!("{:.3}", 1.0 / outcome.champion.fitness - 1.0));
    row("Learning rate", format!("{:.4}", hp.learning_rate));
    row("Depth", hp.depth.to_string());
    row("L2 leaf reg", format!("{:.3}", hp.l2_leaf_reg));
    row("Iterations", hp.iterations.to_string());
    println!();
}

pub fn cmd_select_features(data: &Path, population: usize, iterations: usize, seed: u64) -> anyhow::Result<()> {
    section("Feature Selection");

    step_run("Loading data");
    let dataset = DatasetLoader::new().load_dir(data)?;
    step_done(&format!("{} rows × {} features", dataset.n_samples(), dataset.n_features()));

    let evaluator = FitnessEvaluator::new(&dataset, FitnessWeights::default()).with_random_seed(seed);
    let config = FruitFlyConfig::new()
        .with_population_size(population)
        .with_max_iterations(iterations)
        .with_seed(seed);

    step_run("Searching feature subsets");
    let start = Instant::now();
    let selection = FruitFlySearch::new(config).optimize_features(dataset.n_features(), Hyperparameters::default(), &evaluator)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    row("Fitness", format!("{:.4}", selection.fitness));
    row("Selected", format!("{} of {}", selection.mask.count_selected(), dataset.n_features()));
    println!();
    println!("  {:<24} {:>8}", muted("Feature"), muted("Weight"));
    println!("  {}", dim(&"─".repeat(34)));
    for (name, (&weight, &selected)) in dataset
        .feature_names()
        .iter()
        .zip(selection.weights.iter().zip(selection.mask.as_slice()))
    {
        let mark = if selected { ok("✓") } else { dim("·") };
        println!("  {} {:<22} {:>8.3}", mark, name, weight);
    }
    println!();
    Ok(())
}

pub fn cmd_predict(model: &Path, data: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading features");
    let (x, _) = DatasetLoader::new().load_feature_matrix(data)?;
    step_done(&format!("{} rows × {} cols", x.nrows(), x.ncols()));

    let chain = FallbackChain::standard(model);
    step_run("Predicting");
    let start = Instant::now();
    let predictions = x
        .rows()
        .into_iter()
        .map(|r| chain.predict(&r.to_vec()))
        .collect::<crate::error::Result<Vec<_>>>()?;
    step_done(&format!("{:?}", start.elapsed()));

    let fallback = predictions.iter().filter(|p| p.strategy != "model").count();
    if fallback > 0 {
        println!(
            "  {} model unavailable for {} of {} rows, served by {}",
            "!".yellow(),
            fallback,
            predictions.len(),
            predictions
                .iter()
                .find(|p| p.strategy != "model")
                .map_or("fallback", |p| p.strategy.as_str())
        );
    }

    match output {
        Some(path) => {
            let mut df = DataFrame::new(vec![
                Column::new("noise_level_db".into(), predictions.iter().map(|p| p.noise_level_db).collect::<Vec<_>>()),
                Column::new(
                    "noise_source".into(),
                    predictions.iter().map(|p| p.noise_source.clone()).collect::<Vec<_>>(),
                ),
                Column::new(
                    "source_confidence".into(),
                    predictions.iter().map(|p| p.source_confidence).collect::<Vec<_>>(),
                ),
                Column::new(
                    "health_impact".into(),
                    predictions.iter().map(|p| p.health_label.clone()).collect::<Vec<_>>(),
                ),
            ])?;
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
            println!("  {} {} predictions → {}", ok("✓"), predictions.len(), path.display());
        }
        None => {
            println!();
            println!(
                "  {:>6} {:>10} {:<14} {:>6} {:<10}",
                muted("Row"),
                muted("Level dB"),
                muted("Source"),
                muted("Conf"),
                muted("Health")
            );
            println!("  {}", dim(&"─".repeat(52)));
            for (i, p) in predictions.iter().enumerate() {
                println!(
                    "  {:>6} {:>10.2} {:<14} {:>6.2} {:<10}",
                    i, p.noise_level_db, p.noise_source, p.source_confidence, p.health_label
                );
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_info(model: &Path) -> anyhow::Result<()> {
    section("Model Info");

    let predictor = NoisePredictor::load(model)?;
    let status = predictor.status();
    let yes_no = |b: bool| if b { "loaded".to_string() } else { "missing".to_string() };

    row("Directory", model.display().to_string());
    row("Schema version", status.schema_version.to_string());
    row("Input features", status.n_input_features.to_string());
    row("Selected features", status.n_selected_features.to_string());
    row("Noise level model", yes_no(status.noise_level_model));
    row("Noise source model", yes_no(status.noise_source_model));
    row("Health impact model", yes_no(status.health_impact_model));
    row("Scaler", yes_no(status.scaler));

    if let Some(results) = &predictor.bundle().results {
        section("Optimization Results");
        row("Hyperparameters", results.hyperparameters.to_string());
        row("Fitness", format!("{:.4}", results.metrics.fitness));
        row("Level RMSE", format!("{:.3}", results.metrics.noise_level_rmse));
        row("Source accuracy", format!("{:.4}", results.metrics.noise_source_accuracy));
        row("Health accuracy", format!("{:.4}", results.metrics.health_impact_accuracy));
        row("Generations", results.generations_run.to_string());
        row("Created", results.created_at.clone());
        row("Selected", results.selected_features.join(", "));
    }
    println!();
    Ok(())
}
