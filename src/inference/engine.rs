//! Noise predictor service
//!
//! Applies the persisted pipeline in serving order: scaler on the full
//! feature vector, then the feature mask, then the three models.

use crate::data::HealthImpact;
use crate::error::{NoiseMapError, Result};
use crate::export::ArtifactBundle;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One served prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePrediction {
    pub noise_level_db: f64,
    pub noise_source: String,
    /// Probability of the predicted source class
    pub source_confidence: f64,
    pub health_impact: HealthImpact,
    pub health_label: String,
    /// Name of the strategy that produced the prediction
    pub strategy: String,
}

/// Loaded components and usage of a predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorStatus {
    pub noise_level_model: bool,
    pub noise_source_model: bool,
    pub health_impact_model: bool,
    pub scaler: bool,
    pub schema_version: u32,
    pub n_input_features: usize,
    pub n_selected_features: usize,
    pub predictions_served: u64,
}

/// Explicitly constructed prediction service over one artifact bundle
#[derive(Debug)]
pub struct NoisePredictor {
    bundle: ArtifactBundle,
    selected: Vec<usize>,
    predictions_served: AtomicU64,
}

impl NoisePredictor {
    pub fn new(bundle: ArtifactBundle) -> Result<Self> {
        bundle.validate()?;
        let selected = bundle.mask.selected_indices();
        Ok(Self { bundle, selected, predictions_served: AtomicU64::new(0) })
    }

    /// Load and validate artifacts from `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(ArtifactBundle::load(dir)?)
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Predict from one raw (unscaled, unmasked) feature vector
    pub fn predict(&self, features: &[f64]) -> Result<NoisePrediction> {
        let x = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
        self.predict_batch(&x)?
            .pop()
            .ok_or_else(|| NoiseMapError::InferenceError("Empty prediction batch".into()))
    }

    /// Predict every row of a raw feature matrix
    pub fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<NoisePrediction>> {
        self.bundle.schema.check_input(x.ncols())?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(NoiseMapError::InferenceError("Feature values must be finite".into()));
        }

        let scaled = self.bundle.scaler.transform(x)?;
        let selected = scaled.select(Axis(1), &self.selected);
        let raw = self.bundle.models.predict(&selected)?;

        let predictions = (0..x.nrows())
            .map(|i| {
                let level = raw.noise_level[i];
                let health = HealthImpact::from_index(raw.health_impact[i]).unwrap_or_else(|| HealthImpact::from_db(level));
                NoisePrediction {
                    noise_level_db: level,
                    noise_source: self.source_label(raw.noise_source[i]),
                    source_confidence: max_probability(raw.source_proba.row(i)),
                    health_impact: health,
                    health_label: health.as_str().to_string(),
                    strategy: "model".to_string(),
                }
            })
            .collect::<Vec<_>>();

        let served = self.predictions_served.fetch_add(predictions.len() as u64, Ordering::Relaxed);
        debug!(rows = predictions.len(), total = served + predictions.len() as u64, "Predictions served");
        Ok(predictions)
    }

    pub fn status(&self) -> PredictorStatus {
        let models = &self.bundle.models;
        PredictorStatus {
            noise_level_model: models.noise_level.is_fitted(),
            noise_source_model: models.noise_source.is_fitted(),
            health_impact_model: models.health_impact.is_fitted(),
            scaler: self.bundle.scaler.is_fitted(),
            schema_version: self.bundle.schema.version,
            n_input_features: self.bundle.schema.n_input_features,
            n_selected_features: self.bundle.schema.n_selected_features,
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
        }
    }

    fn source_label(&self, class: f64) -> String {
        let classes = &self.bundle.schema.source_classes;
        if class >= 0.0 && class.fract() == 0.0 {
            if let Some(name) = classes.get(class as usize) {
                return name.clone();
            }
        }
        format!("source_{}", class)
    }
}

fn max_probability(row: ArrayView1<f64>) -> f64 {
    row.iter().copied().fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{FeatureSchema, ResultMetrics, OptimizationResults};
    use crate::optimizer::{FeatureMask, Hyperparameters};
    use crate::preprocessing::StandardScaler;
    use crate::synthetic::SyntheticNoiseData;
    use crate::training::FinalTrainer;

    fn predictor() -> (NoisePredictor, crate::data::NoiseDataset) {
        let data = SyntheticNoiseData::new(80).with_seed(9).generate().unwrap();
        let mut scaler = StandardScaler::new();
        let scaled = data.with_features(scaler.fit_transform(data.features()).unwrap()).unwrap();
        let mask = FeatureMask::from_indices(20, &[0, 1, 2, 3, 16, 17]).unwrap();
        let hp = Hyperparameters { learning_rate: 0.2, depth: 3, l2_leaf_reg: 3.0, iterations: 15 };
        let (models, _) = FinalTrainer::new(hp).train(&scaled.select_features(&mask).unwrap(), None).unwrap();
        let schema = FeatureSchema::new(data.feature_names().to_vec(), &mask, data.source_classes().to_vec()).unwrap();
        let results = OptimizationResults::new(hp, schema.selected_features.clone(), ResultMetrics::default(), 1, 1);
        let bundle = ArtifactBundle { models, scaler, mask, schema, results: Some(results) };
        (NoisePredictor::new(bundle).unwrap(), data)
    }

    #[test]
    fn test_single_matches_batch() {
        let (predictor, data) = predictor();
        let batch = predictor.predict_batch(data.features()).unwrap();
        assert_eq!(batch.len(), 80);

        let row: Vec<f64> = data.features().row(7).to_vec();
        let single = predictor.predict(&row).unwrap();
        assert_eq!(single, batch[7]);
        assert!(data.source_classes().contains(&single.noise_source));
        assert!((0.0..=1.0).contains(&single.source_confidence));
        assert_eq!(single.health_label, single.health_impact.as_str());
    }

    #[test]
    fn test_wrong_width_rejected() {
        let (predictor, _) = predictor();
        assert!(matches!(predictor.predict(&[1.0; 6]), Err(NoiseMapError::SchemaMismatch(_))));
        let mut row = vec![0.0; 20];
        row[3] = f64::NAN;
        assert!(predictor.predict(&row).is_err());
    }

    #[test]
    fn test_status_counts_predictions() {
        let (predictor, data) = predictor();
        predictor.predict_batch(data.features()).unwrap();
        let status = predictor.status();
        assert!(status.noise_level_model && status.scaler);
        assert_eq!(status.n_input_features, 20);
        assert_eq!(status.n_selected_features, 6);
        assert_eq!(status.predictions_served, 80);
    }
}
