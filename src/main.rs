//! NoiseMap - Main Entry Point
//!
//! Hybrid hyperparameter and feature-selection optimizer for noise classification models.

use clap::Parser;
use noisemap::cli::{cmd_info, cmd_optimize, cmd_predict, cmd_select_features, cmd_synth, cmd_tune, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noisemap=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth { output, samples, seed } => {
            cmd_synth(&output, samples, seed)?;
        }
        Commands::Optimize { data, output, config, generations, population, seed } => {
            cmd_optimize(&data, &output, config.as_deref(), generations, population, seed)?;
        }
        Commands::Tune { data, strategy, population, generations, seed } => {
            cmd_tune(&data, strategy, population, generations, seed)?;
        }
        Commands::SelectFeatures { data, population, iterations, seed } => {
            cmd_select_features(&data, population, iterations, seed)?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Info { model } => {
            cmd_info(&model)?;
        }
    }

    Ok(())
}
