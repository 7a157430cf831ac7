//! End-to-end training pipeline
//!
//! Split → scale → optimize → select features → final training → persist.

use crate::data::NoiseDataset;
use crate::error::{NoiseMapError, Result};
use crate::export::{ArtifactBundle, FeatureSchema, OptimizationResults, ResultMetrics};
use crate::optimizer::{Candidate, FeatureMask, GenerationRecord, HybridConfig, HybridOptimizer};
use crate::preprocessing::StandardScaler;
use crate::training::{FinalTrainer, TrainingReport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Configuration for a full pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Held-out fraction used for the final report
    pub test_size: f64,

    /// Seed of the train/test shuffle
    pub split_seed: u64,

    /// Importances reported per model
    pub top_n_features: usize,

    pub optimizer: HybridConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            split_seed: 42,
            top_n_features: 10,
            optimizer: HybridConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a (possibly partial) JSON configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| NoiseMapError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_optimizer(mut self, optimizer: HybridConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(NoiseMapError::ConfigError(format!("test_size must be in (0, 1), got {}", self.test_size)));
        }
        self.optimizer.validate()
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub champion: Candidate,
    pub history: Vec<GenerationRecord>,
    pub evaluations: usize,
    pub training: TrainingReport,
    pub results: OptimizationResults,
    /// Where artifacts were written, if they were
    pub artifacts_dir: Option<PathBuf>,
    pub elapsed_secs: f64,
}

/// Runs the complete optimize-and-train workflow
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train everything in memory without persisting
    pub fn fit(&self, dataset: &NoiseDataset) -> Result<(ArtifactBundle, PipelineReport)> {
        self.config.validate()?;
        let start = Instant::now();

        let (train, test) = dataset.train_test_split(self.config.test_size, self.config.split_seed)?;
        info!(train = train.n_samples(), test = test.n_samples(), "Split dataset");

        let mut scaler = StandardScaler::new();
        let train = train.with_features(scaler.fit_transform(train.features())?)?;
        let test = test.with_features(scaler.transform(test.features())?)?;

        let outcome = HybridOptimizer::new(self.config.optimizer.clone()).optimize(&train)?;
        let mask = outcome
            .champion
            .feature_mask
            .clone()
            .unwrap_or_else(|| FeatureMask::all(dataset.n_features()));

        let (models, training) = FinalTrainer::new(outcome.champion.hyperparameters)
            .with_random_seed(self.config.optimizer.seed)
            .with_top_n(self.config.top_n_features)
            .train(&train.select_features(&mask)?, Some(&test.select_features(&mask)?))?;

        let schema = FeatureSchema::new(dataset.feature_names().to_vec(), &mask, dataset.source_classes().to_vec())?;
        let metrics = ResultMetrics {
            noise_level_rmse: training.level_rmse_validation.unwrap_or(training.level_rmse_train),
            noise_source_accuracy: training.source_accuracy_validation.unwrap_or(training.source_accuracy_train),
            health_impact_accuracy: training.health_accuracy_validation.unwrap_or(training.health_accuracy_train),
            fitness: outcome.champion.fitness,
        };
        let results = OptimizationResults::new(
            outcome.champion.hyperparameters,
            schema.selected_features.clone(),
            metrics,
            outcome.history.len(),
            outcome.evaluations,
        );

        let bundle = ArtifactBundle { models, scaler, mask, schema, results: Some(results.clone()) };
        let report = PipelineReport {
            champion: outcome.champion,
            history: outcome.history,
            evaluations: outcome.evaluations,
            training,
            results,
            artifacts_dir: None,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        Ok((bundle, report))
    }

    /// Train and persist artifacts into `output_dir`
    pub fn run(&self, dataset: &NoiseDataset, output_dir: impl AsRef<Path>) -> Result<PipelineReport> {
        let (bundle, mut report) = self.fit(dataset)?;
        bundle.save(output_dir.as_ref())?;
        report.artifacts_dir = Some(output_dir.as_ref().to_path_buf());
        info!(
            fitness = report.champion.fitness,
            selected = report.results.selected_features_count,
            rmse = report.results.metrics.noise_level_rmse,
            elapsed_secs = report.elapsed_secs,
            "Pipeline complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_validation() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.test_size, 0.2);
        assert!(PipelineConfig::new().with_test_size(1.0).validate().is_err());
    }

    #[test]
    fn test_config_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"test_size": 0.25, "optimizer": {"generations": 2}}"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.optimizer.generations, 2);
        assert_eq!(config.optimizer.population_size, 20);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(PipelineConfig::from_file(&path), Err(NoiseMapError::ConfigError(_))));
    }
}
