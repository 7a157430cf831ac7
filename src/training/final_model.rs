//! Final training of the noise model triple

use crate::data::NoiseDataset;
use crate::error::{NoiseMapError, Result};
use crate::optimizer::Hyperparameters;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::catboost::{CatBoostClassifier, CatBoostRegressor};
use super::models::{accuracy, root_mean_squared_error};

/// Fitted level regressor plus source and health classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTriple {
    pub noise_level: CatBoostRegressor,
    pub noise_source: CatBoostClassifier,
    pub health_impact: CatBoostClassifier,
}

/// Raw outputs of the three models for a batch
#[derive(Debug, Clone)]
pub struct TriplePrediction {
    pub noise_level: Array1<f64>,
    pub noise_source: Array1<f64>,
    pub source_proba: Array2<f64>,
    pub health_impact: Array1<f64>,
}

impl ModelTriple {
    /// Predict all three targets; `x` holds the selected features only
    pub fn predict(&self, x: &Array2<f64>) -> Result<TriplePrediction> {
        Ok(TriplePrediction {
            noise_level: self.noise_level.predict(x)?,
            noise_source: self.noise_source.predict(x)?,
            source_proba: self.noise_source.predict_proba(x)?,
            health_impact: self.health_impact.predict(x)?,
        })
    }

    pub fn n_features(&self) -> usize {
        self.noise_level.n_features()
    }
}

/// Named importance scores of one model, highest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRanking {
    pub model: String,
    pub features: Vec<(String, f64)>,
}

/// Fit and hold-out quality of a trained triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub level_rmse_train: f64,
    pub level_rmse_validation: Option<f64>,
    /// Validation RMSE over train RMSE
    pub overfitting_ratio: Option<f64>,
    pub source_accuracy_train: f64,
    pub source_accuracy_validation: Option<f64>,
    pub health_accuracy_train: f64,
    pub health_accuracy_validation: Option<f64>,
    pub top_features: Vec<FeatureRanking>,
    pub training_secs: f64,
}

/// Trains the final models with the chosen hyperparameters
#[derive(Debug, Clone)]
pub struct FinalTrainer {
    hyperparameters: Hyperparameters,
    random_seed: u64,
    top_n: usize,
}

impl FinalTrainer {
    pub fn new(hyperparameters: Hyperparameters) -> Self {
        Self { hyperparameters, random_seed: 42, top_n: 10 }
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Number of importances reported per model
    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Fit on `train`; `validation` is only used for the report.
    ///
    /// Both datasets must already be restricted to the selected features.
    pub fn train(&self, train: &NoiseDataset, validation: Option<&NoiseDataset>) -> Result<(ModelTriple, TrainingReport)> {
        if let Some(val) = validation {
            if val.n_features() != train.n_features() {
                return Err(NoiseMapError::ShapeError {
                    expected: format!("{} features", train.n_features()),
                    actual: format!("{} features", val.n_features()),
                });
            }
        }

        let start = Instant::now();
        let config = self.hyperparameters.to_catboost_config(self.random_seed);
        config.validate()?;
        info!(params = %self.hyperparameters, samples = train.n_samples(), features = train.n_features(), "Training final models");

        let x = train.features();
        let fit_regressor = || -> Result<CatBoostRegressor> {
            let mut model = CatBoostRegressor::new(config.clone());
            model.fit(x, train.noise_level())?;
            Ok(model)
        };
        let fit_classifier = |y: &Array1<f64>| -> Result<CatBoostClassifier> {
            let mut model = CatBoostClassifier::new(config.clone());
            model.fit(x, y)?;
            Ok(model)
        };
        let (level, (source, health)) = rayon::join(fit_regressor, || {
            rayon::join(|| fit_classifier(train.noise_source()), || fit_classifier(train.health_impact()))
        });
        let models = ModelTriple { noise_level: level?, noise_source: source?, health_impact: health? };

        let train_pred = models.predict(x)?;
        let level_rmse_train = root_mean_squared_error(train.noise_level(), &train_pred.noise_level)?;
        let source_accuracy_train = accuracy(train.noise_source(), &train_pred.noise_source)?;
        let health_accuracy_train = accuracy(train.health_impact(), &train_pred.health_impact)?;

        let (level_rmse_validation, source_accuracy_validation, health_accuracy_validation) = match validation {
            Some(val) => {
                let pred = models.predict(val.features())?;
                (
                    Some(root_mean_squared_error(val.noise_level(), &pred.noise_level)?),
                    Some(accuracy(val.noise_source(), &pred.noise_source)?),
                    Some(accuracy(val.health_impact(), &pred.health_impact)?),
                )
            }
            None => (None, None, None),
        };
        let overfitting_ratio = level_rmse_validation
            .filter(|_| level_rmse_train > 0.0)
            .map(|v| v / level_rmse_train);

        let names = train.feature_names();
        let top_features = vec![
            rank_features("noise_level", &models.noise_level.feature_importances(), names, self.top_n),
            rank_features("noise_source", &models.noise_source.feature_importances(), names, self.top_n),
            rank_features("health_impact", &models.health_impact.feature_importances(), names, self.top_n),
        ];
        for ranking in &top_features {
            let listed: Vec<String> = ranking.features.iter().map(|(n, s)| format!("{}={:.3}", n, s)).collect();
            info!(model = %ranking.model, top = %listed.join(", "), "Feature importances");
        }

        let report = TrainingReport {
            level_rmse_train,
            level_rmse_validation,
            overfitting_ratio,
            source_accuracy_train,
            source_accuracy_validation,
            health_accuracy_train,
            health_accuracy_validation,
            top_features,
            training_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            rmse_train = report.level_rmse_train,
            rmse_validation = ?report.level_rmse_validation,
            overfitting_ratio = ?report.overfitting_ratio,
            source_accuracy = ?report.source_accuracy_validation,
            health_accuracy = ?report.health_accuracy_validation,
            "Final training complete"
        );
        Ok((models, report))
    }
}

/// Top `n` features by importance, ties broken by position
pub fn rank_features(model: &str, importances: &Array1<f64>, names: &[String], n: usize) -> FeatureRanking {
    let mut ranked: Vec<(usize, f64)> = importances.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let features = ranked
        .into_iter()
        .take(n)
        .map(|(i, s)| (names.get(i).cloned().unwrap_or_else(|| format!("feature_{}", i)), s))
        .collect();
    FeatureRanking { model: model.to_string(), features }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticNoiseData;

    fn small_hp() -> Hyperparameters {
        Hyperparameters { learning_rate: 0.2, depth: 3, l2_leaf_reg: 3.0, iterations: 30 }
    }

    #[test]
    fn test_train_with_validation() {
        let data = SyntheticNoiseData::new(200).with_seed(5).generate().unwrap();
        let (train, test) = data.train_test_split(0.2, 5).unwrap();
        let (models, report) = FinalTrainer::new(small_hp()).with_top_n(3).train(&train, Some(&test)).unwrap();

        assert_eq!(models.n_features(), 20);
        assert!(report.level_rmse_train.is_finite());
        assert!(report.level_rmse_validation.is_some());
        assert!(report.overfitting_ratio.unwrap() > 0.0);
        assert!((0.0..=1.0).contains(&report.source_accuracy_validation.unwrap()));
        assert_eq!(report.top_features.len(), 3);
        assert!(report.top_features.iter().all(|r| r.features.len() == 3));
    }

    #[test]
    fn test_train_without_validation() {
        let data = SyntheticNoiseData::new(80).with_seed(2).generate().unwrap();
        let (_, report) = FinalTrainer::new(small_hp()).train(&data, None).unwrap();
        assert!(report.level_rmse_validation.is_none());
        assert!(report.overfitting_ratio.is_none());
    }

    #[test]
    fn test_feature_mismatch_rejected() {
        let data = SyntheticNoiseData::new(60).generate().unwrap();
        let narrow = data.select_features(&crate::optimizer::FeatureMask::from_indices(20, &[0, 1, 2]).unwrap()).unwrap();
        assert!(FinalTrainer::new(small_hp()).train(&data, Some(&narrow)).is_err());
    }

    #[test]
    fn test_rank_features() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ranking = rank_features("m", &Array1::from(vec![0.2, 0.5, 0.3]), &names, 2);
        assert_eq!(ranking.features, vec![("b".to_string(), 0.5), ("c".to_string(), 0.3)]);
    }
}
