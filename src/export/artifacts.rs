//! Persisted pipeline artifacts
//!
//! A trained pipeline is stored as independent files in one directory: the
//! three models and the scaler as enveloped bincode, the feature mask, the
//! feature schema and the optimization results as JSON. Loading validates
//! the schema against every other artifact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::serializer::{load_json, load_payload, save_json, save_payload};
use crate::data::HealthImpact;
use crate::error::{NoiseMapError, Result};
use crate::optimizer::{FeatureMask, Hyperparameters};
use crate::preprocessing::StandardScaler;
use crate::training::{CatBoostClassifier, CatBoostRegressor, Model, ModelTriple};

pub const NOISE_LEVEL_MODEL_FILE: &str = "noise_level_model.bin";
pub const NOISE_SOURCE_MODEL_FILE: &str = "noise_source_model.bin";
pub const HEALTH_IMPACT_MODEL_FILE: &str = "health_impact_model.bin";
pub const FEATURE_SCALER_FILE: &str = "feature_scaler.bin";
pub const FEATURE_MASK_FILE: &str = "feature_mask.json";
pub const FEATURE_SCHEMA_FILE: &str = "feature_schema.json";
pub const OPTIMIZATION_RESULTS_FILE: &str = "optimization_results.json";

/// Current feature schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Shape of the feature vector the artifacts were trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    /// Width of the raw vector the scaler expects
    pub n_input_features: usize,
    /// Width after masking, as seen by the models
    pub n_selected_features: usize,
    pub feature_names: Vec<String>,
    pub selected_features: Vec<String>,
    /// Label of each source class index
    pub source_classes: Vec<String>,
    /// Label of each health tier index
    pub health_classes: Vec<String>,
}

impl FeatureSchema {
    pub fn new(feature_names: Vec<String>, mask: &FeatureMask, source_classes: Vec<String>) -> Result<Self> {
        if feature_names.len() != mask.len() {
            return Err(NoiseMapError::ShapeError {
                expected: format!("{} mask bits", feature_names.len()),
                actual: format!("{} mask bits", mask.len()),
            });
        }
        let selected_features = mask.selected_indices().into_iter().map(|i| feature_names[i].clone()).collect();
        Ok(Self {
            version: SCHEMA_VERSION,
            n_input_features: feature_names.len(),
            n_selected_features: mask.count_selected(),
            feature_names,
            selected_features,
            source_classes,
            health_classes: HealthImpact::ALL.iter().map(|h| h.as_str().to_string()).collect(),
        })
    }

    /// Reject a raw feature vector of the wrong width
    pub fn check_input(&self, n_features: usize) -> Result<()> {
        if n_features != self.n_input_features {
            return Err(NoiseMapError::SchemaMismatch(format!(
                "expected {} input features, got {}",
                self.n_input_features, n_features
            )));
        }
        Ok(())
    }
}

/// Held-out quality of the persisted models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    pub noise_level_rmse: f64,
    pub noise_source_accuracy: f64,
    pub health_impact_accuracy: f64,
    /// Champion fitness of the optimization run
    pub fitness: f64,
}

/// JSON metadata document written next to the models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResults {
    pub hyperparameters: Hyperparameters,
    pub selected_features_count: usize,
    pub selected_features: Vec<String>,
    pub metrics: ResultMetrics,
    pub generations_run: usize,
    pub evaluations: usize,
    pub created_at: String,
}

impl OptimizationResults {
    pub fn new(
        hyperparameters: Hyperparameters,
        selected_features: Vec<String>,
        metrics: ResultMetrics,
        generations_run: usize,
        evaluations: usize,
    ) -> Self {
        Self {
            hyperparameters,
            selected_features_count: selected_features.len(),
            selected_features,
            metrics,
            generations_run,
            evaluations,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Everything needed to serve predictions
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub models: ModelTriple,
    pub scaler: StandardScaler,
    pub mask: FeatureMask,
    pub schema: FeatureSchema,
    pub results: Option<OptimizationResults>,
}

impl ArtifactBundle {
    /// Check that the schema agrees with the scaler, mask and models
    pub fn validate(&self) -> Result<()> {
        let schema = &self.schema;
        if schema.version != SCHEMA_VERSION {
            return Err(NoiseMapError::SchemaMismatch(format!(
                "unsupported schema version {} (expected {})",
                schema.version, SCHEMA_VERSION
            )));
        }
        if schema.feature_names.len() != schema.n_input_features {
            return Err(NoiseMapError::SchemaMismatch("feature name count differs from input width".into()));
        }
        if !self.scaler.is_fitted() || self.scaler.n_features() != schema.n_input_features {
            return Err(NoiseMapError::SchemaMismatch(format!(
                "scaler expects {} features, schema declares {}",
                self.scaler.n_features(),
                schema.n_input_features
            )));
        }
        if self.mask.len() != schema.n_input_features || self.mask.count_selected() != schema.n_selected_features {
            return Err(NoiseMapError::SchemaMismatch(format!(
                "mask selects {} of {} features, schema declares {} of {}",
                self.mask.count_selected(),
                self.mask.len(),
                schema.n_selected_features,
                schema.n_input_features
            )));
        }
        let models = [
            ("noise_level", self.models.noise_level.n_features()),
            ("noise_source", self.models.noise_source.n_features()),
            ("health_impact", self.models.health_impact.n_features()),
        ];
        for (name, width) in models {
            if width != schema.n_selected_features {
                return Err(NoiseMapError::SchemaMismatch(format!(
                    "{} model expects {} features, schema declares {}",
                    name, width, schema.n_selected_features
                )));
            }
        }
        Ok(())
    }

    /// Write every artifact into `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        save_payload(self.models.noise_level.to_bytes()?, "noise_level_model", dir.join(NOISE_LEVEL_MODEL_FILE))?;
        save_payload(self.models.noise_source.to_bytes()?, "noise_source_model", dir.join(NOISE_SOURCE_MODEL_FILE))?;
        save_payload(
            self.models.health_impact.to_bytes()?,
            "health_impact_model",
            dir.join(HEALTH_IMPACT_MODEL_FILE),
        )?;
        save_payload(bincode::serialize(&self.scaler)?, "feature_scaler", dir.join(FEATURE_SCALER_FILE))?;
        save_json(&self.mask, dir.join(FEATURE_MASK_FILE))?;
        save_json(&self.schema, dir.join(FEATURE_SCHEMA_FILE))?;
        if let Some(results) = &self.results {
            save_json(results, dir.join(OPTIMIZATION_RESULTS_FILE))?;
        }

        info!(dir = %dir.display(), selected = self.schema.n_selected_features, "Artifacts saved");
        Ok(())
    }

    /// Load and validate a bundle; the results document is optional
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(NoiseMapError::PersistenceError(format!("Artifact directory {} not found", dir.display())));
        }

        let models = ModelTriple {
            noise_level: CatBoostRegressor::from_bytes(&load_payload(
                "noise_level_model",
                dir.join(NOISE_LEVEL_MODEL_FILE),
            )?)?,
            noise_source: CatBoostClassifier::from_bytes(&load_payload(
                "noise_source_model",
                dir.join(NOISE_SOURCE_MODEL_FILE),
            )?)?,
            health_impact: CatBoostClassifier::from_bytes(&load_payload(
                "health_impact_model",
                dir.join(HEALTH_IMPACT_MODEL_FILE),
            )?)?,
        };
        let scaler: StandardScaler = bincode::deserialize(&load_payload("feature_scaler", dir.join(FEATURE_SCALER_FILE))?)?;
        let mask: FeatureMask = load_json(dir.join(FEATURE_MASK_FILE))?;
        let schema: FeatureSchema = load_json(dir.join(FEATURE_SCHEMA_FILE))?;
        let results_path = dir.join(OPTIMIZATION_RESULTS_FILE);
        let results = if results_path.exists() { Some(load_json(results_path)?) } else { None };

        let bundle = Self { models, scaler, mask, schema, results };
        bundle.validate()?;
        info!(dir = %dir.display(), "Artifacts loaded");
        Ok(bundle)
    }
}
