//! Inference module
//!
//! Provides prediction from persisted artifacts:
//! - [`NoisePredictor`], an explicitly constructed service over one bundle
//! - [`FallbackChain`], ordered strategies ending in a threshold heuristic

mod engine;
mod fallback;

pub use engine::{NoisePrediction, NoisePredictor, PredictorStatus};
pub use fallback::{
    FallbackChain, ModelStrategy, PredictionStrategy, StrategyOutcome, ThresholdHeuristic, DEFAULT_LEVEL_DB,
    UNKNOWN_SOURCE,
};
