//! NoiseMap - Hybrid optimizer for noise classification models
//!
//! This crate trains, optimizes and serves a three-model noise pipeline:
//! from an audio clip's feature vector it predicts the noise level in dB,
//! the dominant noise source and the resulting health-impact tier.
//!
//! # Modules
//!
//! ## Core
//! - [`optimizer`] - Firefly, fruit-fly and hybrid hyperparameter / feature search
//! - [`training`] - CatBoost-style boosted trees, cross-validation, final training
//! - [`inference`] - Prediction service with an explicit fallback chain
//!
//! ## Data
//! - [`data`] - Noise datasets, label vocabularies, CSV loading
//! - [`preprocessing`] - Feature scaling
//! - [`synthetic`] - Synthetic noise dataset generation
//!
//! ## Workflow
//! - [`pipeline`] - Split, scale, optimize, train and persist in one run
//! - [`export`] - Artifact persistence and schema validation
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod optimizer;
pub mod training;
pub mod inference;

// Data
pub mod data;
pub mod preprocessing;
pub mod synthetic;

// Workflow
pub mod pipeline;
pub mod export;

// Services
pub mod cli;

pub use error::{NoiseMapError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{NoiseMapError, Result};

    // Data
    pub use crate::data::{DatasetLoader, HealthImpact, LabelEncoder, NoiseDataset};
    pub use crate::preprocessing::StandardScaler;
    pub use crate::synthetic::SyntheticNoiseData;

    // Optimization
    pub use crate::optimizer::{
        Candidate, FeatureMask, FireflyConfig, FireflySearch, FitnessEvaluator, FitnessFunction, FruitFlyConfig,
        FruitFlySearch, HybridConfig, HybridOptimizer, Hyperparameters, OptimizationOutcome, ParamBounds,
        SearchStrategy,
    };

    // Training
    pub use crate::training::{CatBoostClassifier, CatBoostConfig, CatBoostRegressor, FinalTrainer, ModelTriple};

    // Persistence and serving
    pub use crate::export::{ArtifactBundle, FeatureSchema, OptimizationResults};
    pub use crate::inference::{FallbackChain, NoisePrediction, NoisePredictor};
    pub use crate::pipeline::{PipelineConfig, TrainingPipeline};
}
