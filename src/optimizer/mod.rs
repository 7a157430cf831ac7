//! Hyperparameter and feature-subset optimization
//!
//! Provides the nature-inspired searches used to tune the noise models:
//! - Firefly attraction search over hyperparameters, with mask co-evolution
//! - Fruit-fly swarm search for hyperparameters or feature selection
//! - The hybrid loop that interleaves both over a shared population

mod candidate;
mod config;
mod fitness;
mod strategy;
pub mod firefly;
pub mod fruitfly;
pub mod hybrid;

pub use candidate::{
    Candidate, FeatureMask, Hyperparameters, ParamBounds, INTEGER_DIMS, MIN_SELECTED_FEATURES, N_PARAMS,
    PARAM_NAMES,
};
pub use config::{FireflyConfig, FruitFlyConfig, HybridConfig, RefinementConfig};
pub use fitness::{
    evaluate_population, FitnessBreakdown, FitnessEvaluator, FitnessFunction, FitnessWeights, LevelFitness,
};
pub use strategy::{GenerationRecord, OptimizationOutcome, SearchStrategy};
pub use firefly::{initial_population, FireflySearch};
pub use fruitfly::{FeatureRefinement, FeatureSelection, Fly, FruitFlySearch, IterationReport};
pub use hybrid::HybridOptimizer;
