//! Optimization configuration

use crate::error::{NoiseMapError, Result};
use serde::{Deserialize, Serialize};
use super::candidate::ParamBounds;
use super::fitness::FitnessWeights;

/// Configuration for the firefly attraction search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireflyConfig {
    /// Number of fireflies
    pub population_size: usize,

    /// Generations for a standalone run
    pub max_generations: usize,

    /// Random-walk scale, in normalized units
    pub alpha: f64,

    /// Attractiveness at distance zero
    pub beta0: f64,

    /// Light absorption coefficient
    pub gamma: f64,

    /// Per-bit probability of copying the attractor's mask bit
    pub mask_copy_rate: f64,

    /// Per-bit flip probability during a fallback move
    pub mask_flip_rate: f64,

    /// Random seed
    pub seed: u64,
}

impl Default for FireflyConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generations: 30,
            alpha: 0.2,
            beta0: 1.0,
            gamma: 1.0,
            mask_copy_rate: 0.10,
            mask_flip_rate: 0.05,
            seed: 42,
        }
    }
}

impl FireflyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(NoiseMapError::ConfigError("firefly population_size must be > 0".into()));
        }
        for (name, v) in [("alpha", self.alpha), ("beta0", self.beta0), ("gamma", self.gamma)] {
            if !v.is_finite() || v < 0.0 {
                return Err(NoiseMapError::ConfigError(format!("firefly {} must be finite and >= 0", name)));
            }
        }
        check_probability("mask_copy_rate", self.mask_copy_rate)?;
        check_probability("mask_flip_rate", self.mask_flip_rate)
    }
}

/// Configuration for the fruit-fly swarm search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FruitFlyConfig {
    /// Flies sampled around the swarm center per iteration
    pub population_size: usize,

    /// Iterations for a standalone run
    pub max_iterations: usize,

    /// Half-width of the random walk around the center
    pub step_size: f64,

    /// Random seed
    pub seed: u64,
}

impl Default for FruitFlyConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_iterations: 50,
            step_size: 1.0,
            seed: 42,
        }
    }
}

impl FruitFlyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(NoiseMapError::ConfigError("fruit-fly population_size must be > 0".into()));
        }
        if !self.step_size.is_finite() || self.step_size < 0.0 {
            return Err(NoiseMapError::ConfigError("fruit-fly step_size must be finite and >= 0".into()));
        }
        Ok(())
    }
}

/// Mask refinement applied inside the hybrid loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Per-bit probability of being revisited
    pub exploration_rate: f64,

    /// Probability a revisited bit copies the reference best
    pub follow_best_rate: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self { exploration_rate: 0.10, follow_best_rate: 0.70 }
    }
}

impl RefinementConfig {
    pub fn validate(&self) -> Result<()> {
        check_probability("exploration_rate", self.exploration_rate)?;
        check_probability("follow_best_rate", self.follow_best_rate)
    }
}

/// Configuration for the hybrid orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Candidates per generation
    pub population_size: usize,

    /// Generations to run
    pub generations: usize,

    /// Run mask refinement when `generation % refine_interval == 0`
    pub refine_interval: usize,

    /// Wall-clock bound, checked between generations
    pub time_budget_secs: Option<f64>,

    /// Hyperparameter search space
    pub bounds: ParamBounds,

    /// Firefly movement settings; its population and generation fields are unused here
    pub firefly: FireflyConfig,

    pub refinement: RefinementConfig,

    pub fitness: FitnessWeights,

    /// Folds for every fitness evaluation
    pub cv_folds: usize,

    /// Random seed
    pub seed: u64,

    /// Whether to log per-generation progress at info level
    pub verbose: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 30,
            refine_interval: 5,
            time_budget_secs: None,
            bounds: ParamBounds::default(),
            firefly: FireflyConfig::default(),
            refinement: RefinementConfig::default(),
            fitness: FitnessWeights::default(),
            cv_folds: 3,
            seed: 42,
            verbose: true,
        }
    }
}

impl HybridConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the population size
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Builder method to set the generation count
    pub fn with_generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    /// Builder method to set a wall-clock budget
    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.time_budget_secs = Some(secs);
        self
    }

    /// Builder method to set hyperparameter bounds
    pub fn with_bounds(mut self, bounds: ParamBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Builder method to set the seed for every random stream
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.firefly.seed = seed;
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(NoiseMapError::ConfigError("population_size must be > 0".into()));
        }
        if self.refine_interval == 0 {
            return Err(NoiseMapError::ConfigError("refine_interval must be > 0".into()));
        }
        if self.cv_folds < 2 {
            return Err(NoiseMapError::ConfigError("cv_folds must be at least 2".into()));
        }
        if let Some(budget) = self.time_budget_secs {
            if !budget.is_finite() || budget <= 0.0 {
                return Err(NoiseMapError::ConfigError("time_budget_secs must be > 0".into()));
            }
        }
        self.bounds.validate()?;
        self.firefly.validate()?;
        self.refinement.validate()?;
        self.fitness.validate()
    }
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(NoiseMapError::ConfigError(format!("{} must be in [0, 1], got {}", name, p)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(HybridConfig::default().validate().is_ok());
        assert!(FruitFlyConfig::default().validate().is_ok());
        let ff = FireflyConfig::default();
        assert_eq!((ff.alpha, ff.beta0, ff.gamma), (0.2, 1.0, 1.0));
        assert_eq!(HybridConfig::default().refine_interval, 5);
    }

    #[test]
    fn test_builder() {
        let config = HybridConfig::new()
            .with_population_size(10)
            .with_generations(4)
            .with_seed(7)
            .with_time_budget(30.0);
        assert_eq!(config.population_size, 10);
        assert_eq!(config.generations, 4);
        assert_eq!(config.firefly.seed, 7);
        assert_eq!(config.time_budget_secs, Some(30.0));
    }

    #[test]
    fn test_invalid_values() {
        assert!(HybridConfig::new().with_population_size(0).validate().is_err());
        assert!(HybridConfig::new().with_cv_folds(1).validate().is_err());
        let mut config = HybridConfig::default();
        config.refinement.follow_best_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: HybridConfig = serde_json::from_str(r#"{"generations": 3}"#).unwrap();
        assert_eq!(config.generations, 3);
        assert_eq!(config.population_size, 20);
    }
}
