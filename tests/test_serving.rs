//! Integration test: serving from persisted artifacts

use noisemap::data::HealthImpact;
use noisemap::export::{ArtifactBundle, FeatureSchema, FEATURE_SCALER_FILE, NOISE_LEVEL_MODEL_FILE};
use noisemap::inference::{FallbackChain, ModelStrategy, NoisePredictor, PredictionStrategy, StrategyOutcome};
use noisemap::optimizer::{FeatureMask, Hyperparameters};
use noisemap::preprocessing::StandardScaler;
use noisemap::synthetic::SyntheticNoiseData;
use noisemap::training::FinalTrainer;
use noisemap::NoiseMapError;
use std::path::Path;
use tempfile::tempdir;

fn write_bundle(dir: &Path) -> noisemap::data::NoiseDataset {
    let data = SyntheticNoiseData::new(100).with_seed(12).generate().unwrap();
    let mut scaler = StandardScaler::new();
    let scaled = data.with_features(scaler.fit_transform(data.features()).unwrap()).unwrap();
    let mask = FeatureMask::from_indices(20, &[0, 1, 2, 16, 17, 18, 19]).unwrap();
    let hp = Hyperparameters { learning_rate: 0.2, depth: 3, l2_leaf_reg: 3.0, iterations: 20 };
    let (models, _) = FinalTrainer::new(hp).train(&scaled.select_features(&mask).unwrap(), None).unwrap();
    let schema = FeatureSchema::new(data.feature_names().to_vec(), &mask, data.source_classes().to_vec()).unwrap();
    ArtifactBundle { models, scaler, mask, schema, results: None }.save(dir).unwrap();
    data
}

#[test]
fn test_chain_serves_model_when_available() {
    let dir = tempdir().unwrap();
    let data = write_bundle(dir.path());

    let chain = FallbackChain::standard(dir.path());
    let row = data.features().row(0).to_vec();
    let prediction = chain.predict(&row).unwrap();
    assert_eq!(prediction.strategy, "model");
    assert_eq!(prediction, NoisePredictor::load(dir.path()).unwrap().predict(&row).unwrap());
}

#[test]
fn test_corrupt_artifact_falls_back() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path());
    std::fs::write(dir.path().join(NOISE_LEVEL_MODEL_FILE), b"truncated").unwrap();

    let strategy = ModelStrategy::from_dir(dir.path());
    assert!(strategy.predictor().is_none());
    assert!(matches!(strategy.predict(&[0.0; 20]), Ok(StrategyOutcome::Unavailable(_))));

    let prediction = FallbackChain::standard(dir.path()).predict(&[0.0; 20]).unwrap();
    assert_eq!(prediction.strategy, "threshold-heuristic");
    assert_eq!(prediction.health_impact, HealthImpact::Moderate);
}

#[test]
fn test_tampered_scaler_rejected() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path());
    let path = dir.path().join(FEATURE_SCALER_FILE);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(NoisePredictor::load(dir.path()), Err(NoiseMapError::PersistenceError(_))));
}

#[test]
fn test_malformed_input_is_rejected_not_served_by_heuristic() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path());
    let chain = FallbackChain::standard(dir.path());

    assert!(matches!(chain.predict(&[1.0, 2.0, 3.0]), Err(NoiseMapError::SchemaMismatch(_))));

    let mut row = vec![0.5; 20];
    row[4] = f64::NAN;
    assert!(matches!(chain.predict(&row), Err(NoiseMapError::InferenceError(_))));
}

#[test]
fn test_model_only_chain_exhausts_when_artifacts_missing() {
    let dir = tempdir().unwrap();
    let chain = FallbackChain::new().with_strategy(Box::new(ModelStrategy::from_dir(dir.path())));
    match chain.predict(&[1.0; 20]) {
        Err(NoiseMapError::StrategiesExhausted(reason)) => assert!(reason.starts_with("model:")),
        other => panic!("unexpected {:?}", other),
    }
}
