//! Model export and serialization module
//!
//! Provides persistence for a trained noise pipeline:
//! - Checksummed binary envelopes for models and the scaler
//! - JSON documents for the feature mask, schema and optimization results
//! - The [`ArtifactBundle`] that saves and validates them as a unit

mod serializer;
mod artifacts;

pub use serializer::{load_binary, load_json, load_payload, save_binary, save_json, save_payload, ArtifactEnvelope};
pub use artifacts::{
    ArtifactBundle, FeatureSchema, OptimizationResults, ResultMetrics, FEATURE_MASK_FILE, FEATURE_SCALER_FILE,
    FEATURE_SCHEMA_FILE, HEALTH_IMPACT_MODEL_FILE, NOISE_LEVEL_MODEL_FILE, NOISE_SOURCE_MODEL_FILE,
    OPTIMIZATION_RESULTS_FILE, SCHEMA_VERSION,
};
