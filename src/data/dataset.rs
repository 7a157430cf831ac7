//! Co-indexed noise dataset
//!
//! A feature matrix plus three label vectors (noise level, noise source,
//! health impact). Every row operation applies one index list to all four
//! arrays so rows never drift apart.

use crate::error::{NoiseMapError, Result};
use crate::optimizer::FeatureMask;
use super::labels::HealthImpact;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Feature matrix with noise-level, source and health-impact labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseDataset {
    features: Array2<f64>,
    feature_names: Vec<String>,
    noise_level: Array1<f64>,
    noise_source: Array1<f64>,
    health_impact: Array1<f64>,
    source_classes: Vec<String>,
}

impl NoiseDataset {
    /// Build a dataset, validating that all arrays share the row count.
    ///
    /// `noise_source` holds class indices into `source_classes`;
    /// `health_impact` holds tier indices (0..=3).
    pub fn new(
        features: Array2<f64>,
        feature_names: Vec<String>,
        noise_level: Array1<f64>,
        noise_source: Array1<f64>,
        health_impact: Array1<f64>,
        source_classes: Vec<String>,
    ) -> Result<Self> {
        let n = features.nrows();
        for (name, len) in [
            ("noise_level", noise_level.len()),
            ("noise_source", noise_source.len()),
            ("health_impact", health_impact.len()),
        ] {
            if len != n {
                return Err(NoiseMapError::ShapeError {
                    expected: format!("{} length = {}", name, n),
                    actual: format!("{} length = {}", name, len),
                });
            }
        }
        if feature_names.len() != features.ncols() {
            return Err(NoiseMapError::ShapeError {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if let Some(&bad) = health_impact.iter().find(|&&t| HealthImpact::from_index(t).is_none()) {
            return Err(NoiseMapError::DataError(format!("Invalid health impact tier: {}", bad)));
        }
        if let Some(&bad) = noise_source
            .iter()
            .find(|&&s| s < 0.0 || s.fract() != 0.0 || s as usize >= source_classes.len().max(1))
        {
            return Err(NoiseMapError::DataError(format!(
                "Noise source index {} outside {} known classes",
                bad,
                source_classes.len()
            )));
        }

        Ok(Self { features, feature_names, noise_level, noise_source, health_impact, source_classes })
    }

    /// Build a dataset whose feature columns are named `feature_0..`
    pub fn with_default_names(
        features: Array2<f64>,
        noise_level: Array1<f64>,
        noise_source: Array1<f64>,
        health_impact: Array1<f64>,
        source_classes: Vec<String>,
    ) -> Result<Self> {
        let names = (0..features.ncols()).map(|i| format!("feature_{}", i)).collect();
        Self::new(features, names, noise_level, noise_source, health_impact, source_classes)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn noise_level(&self) -> &Array1<f64> {
        &self.noise_level
    }

    pub fn noise_source(&self) -> &Array1<f64> {
        &self.noise_source
    }

    pub fn health_impact(&self) -> &Array1<f64> {
        &self.health_impact
    }

    pub fn source_classes(&self) -> &[String] {
        &self.source_classes
    }

    /// Replace the feature matrix (e.g. after scaling), keeping labels.
    pub fn with_features(&self, features: Array2<f64>) -> Result<Self> {
        if features.dim() != self.features.dim() {
            return Err(NoiseMapError::ShapeError {
                expected: format!("{:?}", self.features.dim()),
                actual: format!("{:?}", features.dim()),
            });
        }
        Ok(Self { features, ..self.clone() })
    }

    /// Subset of rows, co-indexed across features and labels
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let take = |a: &Array1<f64>| Array1::from_vec(indices.iter().map(|&i| a[i]).collect());
        Self {
            features: self.features.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            noise_level: take(&self.noise_level),
            noise_source: take(&self.noise_source),
            health_impact: take(&self.health_impact),
            source_classes: self.source_classes.clone(),
        }
    }

    /// Keep only the columns selected by `mask`
    pub fn select_features(&self, mask: &FeatureMask) -> Result<Self> {
        if mask.len() != self.n_features() {
            return Err(NoiseMapError::ShapeError {
                expected: format!("mask of length {}", self.n_features()),
                actual: format!("mask of length {}", mask.len()),
            });
        }
        let cols = mask.selected_indices();
        Ok(Self {
            features: self.features.select(Axis(1), &cols),
            feature_names: cols.iter().map(|&c| self.feature_names[c].clone()).collect(),
            ..self.clone()
        })
    }

    /// Shuffled train/test split; `test_size` is the held-out fraction.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
            return Err(NoiseMapError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        let n = self.n_samples();
        let n_test = ((n as f64) * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(NoiseMapError::DataError(format!(
                "Cannot split {} samples with test_size {}",
                n, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok((self.select_rows(train_idx), self.select_rows(test_idx)))
    }
}
