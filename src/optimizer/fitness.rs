//! Fitness functions
//!
//! [`FitnessEvaluator`] scores a candidate by cross-validating all three noise
//! models on the candidate's feature subset. [`LevelFitness`] scores the
//! noise-level regressor alone. Both turn every training failure into
//! `f64::NEG_INFINITY`; nothing is propagated or retried.

use crate::data::NoiseDataset;
use crate::error::{NoiseMapError, Result};
use crate::training::{
    accuracy, cross_val_score, mean_squared_error, CVStrategy, CatBoostClassifier, CatBoostRegressor,
    CrossValidator,
};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

use super::candidate::{Candidate, Hyperparameters};

/// Anything that can score a candidate; higher is better
pub trait FitnessFunction: Sync {
    fn evaluate(&self, candidate: &Candidate) -> f64;
}

impl<F> FitnessFunction for F
where
    F: Fn(&Candidate) -> f64 + Sync,
{
    fn evaluate(&self, candidate: &Candidate) -> f64 {
        self(candidate)
    }
}

/// Score every candidate in place, in parallel; returns the number scored
pub fn evaluate_population<F: FitnessFunction + ?Sized>(population: &mut [Candidate], fitness: &F) -> usize {
    population.par_iter_mut().for_each(|c| c.fitness = fitness.evaluate(c));
    population.len()
}

/// Weights of the combined fitness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub noise_level: f64,
    pub noise_source: f64,
    pub health_impact: f64,
    /// Subtracted once per unit of selected-feature fraction
    pub feature_penalty: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self { noise_level: 0.4, noise_source: 0.3, health_impact: 0.3, feature_penalty: 0.1 }
    }
}

impl FitnessWeights {
    pub fn validate(&self) -> Result<()> {
        let all = [self.noise_level, self.noise_source, self.health_impact, self.feature_penalty];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(NoiseMapError::ConfigError("fitness weights must be finite and >= 0".into()));
        }
        Ok(())
    }

    pub fn combine(&self, level_score: f64, source_acc: f64, health_acc: f64, selected_fraction: f64) -> f64 {
        self.noise_level * level_score + self.noise_source * source_acc + self.health_impact * health_acc
            - self.feature_penalty * selected_fraction
    }
}

/// Components of one combined-fitness evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub level_mse: f64,
    /// `1 / (1 + level_mse)`
    pub level_score: f64,
    pub source_accuracy: f64,
    pub health_accuracy: f64,
    pub n_selected: usize,
    pub n_features: usize,
    pub fitness: f64,
}

fn regression_cv_mse(x: &Array2<f64>, y: &Array1<f64>, hp: &Hyperparameters, folds: usize, seed: u64) -> Result<f64> {
    let cv = CrossValidator::new(CVStrategy::KFold { n_splits: folds, shuffle: false });
    let results = cross_val_score(&cv, x, y, |x_tr, y_tr, x_te, y_te| {
        let mut model = CatBoostRegressor::new(hp.to_catboost_config(seed));
        model.fit(x_tr, y_tr)?;
        mean_squared_error(y_te, &model.predict(x_te)?)
    })?;
    Ok(results.mean_score)
}

fn classification_cv_accuracy(
    x: &Array2<f64>,
    y: &Array1<f64>,
    hp: &Hyperparameters,
    folds: usize,
    seed: u64,
) -> Result<f64> {
    let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: folds, shuffle: false });
    let results = cross_val_score(&cv, x, y, |x_tr, y_tr, x_te, y_te| {
        let mut model = CatBoostClassifier::new(hp.to_catboost_config(seed));
        model.fit(x_tr, y_tr)?;
        accuracy(y_te, &model.predict(x_te)?)
    })?;
    Ok(results.mean_score)
}

/// Resolve the feature matrix a candidate trains on, or `None` if it cannot score
fn candidate_features<'d>(
    dataset: &'d NoiseDataset,
    candidate: &Candidate,
    require_mask: bool,
) -> Result<Option<Cow<'d, Array2<f64>>>> {
    match &candidate.feature_mask {
        None if require_mask => Ok(None),
        None => Ok(Some(Cow::Borrowed(dataset.features()))),
        Some(mask) if !mask.is_viable() => Ok(None),
        Some(mask) => Ok(Some(Cow::Owned(dataset.select_features(mask)?.features().clone()))),
    }
}

/// Combined three-model fitness over a fixed dataset
#[derive(Debug, Clone)]
pub struct FitnessEvaluator<'a> {
    dataset: &'a NoiseDataset,
    weights: FitnessWeights,
    cv_folds: usize,
    require_mask: bool,
    random_seed: u64,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(dataset: &'a NoiseDataset, weights: FitnessWeights) -> Self {
        Self { dataset, weights, cv_folds: 3, require_mask: true, random_seed: 42 }
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Allow candidates without a mask to train on every feature
    pub fn allow_unmasked(mut self) -> Self {
        self.require_mask = false;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Full evaluation; `Ok(None)` for masks that cannot score
    pub fn evaluate_detailed(&self, candidate: &Candidate) -> Result<Option<FitnessBreakdown>> {
        let x = match candidate_features(self.dataset, candidate, self.require_mask)? {
            Some(x) => x,
            None => return Ok(None),
        };
        let hp = &candidate.hyperparameters;
        let n_features = self.dataset.n_features();
        let n_selected = x.ncols();

        let level_mse = regression_cv_mse(&x, self.dataset.noise_level(), hp, self.cv_folds, self.random_seed)?;
        let source_accuracy =
            classification_cv_accuracy(&x, self.dataset.noise_source(), hp, self.cv_folds, self.random_seed)?;
        let health_accuracy =
            classification_cv_accuracy(&x, self.dataset.health_impact(), hp, self.cv_folds, self.random_seed)?;

        let level_score = 1.0 / (1.0 + level_mse);
        let fitness = self.weights.combine(
            level_score,
            source_accuracy,
            health_accuracy,
            n_selected as f64 / n_features as f64,
        );

        Ok(Some(FitnessBreakdown {
            level_mse,
            level_score,
            source_accuracy,
            health_accuracy,
            n_selected,
            n_features,
            fitness,
        }))
    }
}

impl FitnessFunction for FitnessEvaluator<'_> {
    fn evaluate(&self, candidate: &Candidate) -> f64 {
        match self.evaluate_detailed(candidate) {
            Ok(Some(breakdown)) if breakdown.fitness.is_finite() => breakdown.fitness,
            Ok(_) => f64::NEG_INFINITY,
            Err(e) => {
                debug!(error = %e, params = %candidate.hyperparameters, "Candidate failed to train");
                f64::NEG_INFINITY
            }
        }
    }
}

/// Noise-level regressor fitness, `1 / (1 + cv_mse)`
#[derive(Debug, Clone)]
pub struct LevelFitness<'a> {
    dataset: &'a NoiseDataset,
    cv_folds: usize,
    random_seed: u64,
}

impl<'a> LevelFitness<'a> {
    pub fn new(dataset: &'a NoiseDataset) -> Self {
        Self { dataset, cv_folds: 3, random_seed: 42 }
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    fn score(&self, candidate: &Candidate) -> Result<Option<f64>> {
        let x = match candidate_features(self.dataset, candidate, false)? {
            Some(x) => x,
            None => return Ok(None),
        };
        let mse = regression_cv_mse(
            &x,
            self.dataset.noise_level(),
            &candidate.hyperparameters,
            self.cv_folds,
            self.random_seed,
        )?;
        Ok(Some(1.0 / (1.0 + mse)))
    }
}

impl FitnessFunction for LevelFitness<'_> {
    fn evaluate(&self, candidate: &Candidate) -> f64 {
        match self.score(candidate) {
            Ok(Some(score)) if score.is_finite() => score,
            Ok(_) => f64::NEG_INFINITY,
            Err(e) => {
                debug!(error = %e, params = %candidate.hyperparameters, "Candidate failed to train");
                f64::NEG_INFINITY
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::FeatureMask;
    use crate::synthetic::SyntheticNoiseData;

    fn tiny_hp() -> Hyperparameters {
        Hyperparameters { learning_rate: 0.2, depth: 2, l2_leaf_reg: 3.0, iterations: 5 }
    }

    #[test]
    fn test_weights_combine() {
        let w = FitnessWeights::default();
        let f = w.combine(0.5, 0.8, 0.6, 0.25);
        assert!((f - (0.2 + 0.24 + 0.18 - 0.025)).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_features_is_neg_infinity() {
        let ds = SyntheticNoiseData::new(60).generate().unwrap();
        let eval = FitnessEvaluator::new(&ds, FitnessWeights::default());

        let none = FeatureMask::from_bools(vec![false; 20]);
        let two = FeatureMask::from_indices(20, &[0, 5]).unwrap();
        for mask in [none, two] {
            let c = Candidate::new(tiny_hp(), Some(mask));
            assert_eq!(eval.evaluate(&c), f64::NEG_INFINITY);
        }
    }

    #[test]
    fn test_missing_mask_when_required() {
        let ds = SyntheticNoiseData::new(60).generate().unwrap();
        let eval = FitnessEvaluator::new(&ds, FitnessWeights::default());
        assert_eq!(eval.evaluate(&Candidate::new(tiny_hp(), None)), f64::NEG_INFINITY);
    }

    #[test]
    fn test_valid_candidate_scores() {
        let ds = SyntheticNoiseData::new(90).generate().unwrap();
        let eval = FitnessEvaluator::new(&ds, FitnessWeights::default());
        let mask = FeatureMask::from_indices(20, &[13, 16, 19]).unwrap();
        let breakdown = eval
            .evaluate_detailed(&Candidate::new(tiny_hp(), Some(mask)))
            .unwrap()
            .unwrap();

        assert_eq!(breakdown.n_selected, 3);
        assert!(breakdown.level_score > 0.0 && breakdown.level_score <= 1.0);
        assert!((0.0..=1.0).contains(&breakdown.source_accuracy));
        assert!((0.0..=1.0).contains(&breakdown.health_accuracy));
        assert!(breakdown.fitness.is_finite());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let ds = SyntheticNoiseData::new(60).generate().unwrap();
        let eval = FitnessEvaluator::new(&ds, FitnessWeights::default());
        let c = Candidate::new(tiny_hp(), Some(FeatureMask::all(20)));
        assert_eq!(eval.evaluate(&c), eval.evaluate(&c));
    }

    #[test]
    fn test_invalid_hyperparameters_are_caught() {
        let ds = SyntheticNoiseData::new(60).generate().unwrap();
        let eval = LevelFitness::new(&ds);
        let bad = Hyperparameters { learning_rate: -1.0, ..tiny_hp() };
        assert_eq!(eval.evaluate(&Candidate::new(bad, None)), f64::NEG_INFINITY);
        assert!(eval.evaluate(&Candidate::new(tiny_hp(), None)) > 0.0);
    }

    #[test]
    fn test_evaluate_population_in_place() {
        let mut population: Vec<Candidate> = (1..=4)
            .map(|d| Candidate::new(Hyperparameters { depth: d, ..tiny_hp() }, None))
            .collect();
        let n = evaluate_population(&mut population, &|c: &Candidate| c.hyperparameters.depth as f64);
        assert_eq!(n, 4);
        let scores: Vec<f64> = population.iter().map(|c| c.fitness).collect();
        assert_eq!(scores, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_closure_fitness() {
        let f = |c: &Candidate| c.hyperparameters.learning_rate;
        assert_eq!(FitnessFunction::evaluate(&f, &Candidate::new(tiny_hp(), None)), 0.2);
    }
}
