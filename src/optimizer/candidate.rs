//! Search-space primitives shared by every strategy
//!
//! A [`Candidate`] pairs [`Hyperparameters`] with an optional [`FeatureMask`].
//! Hyperparameters move through a normalized `[0, 1]^4` view defined by
//! [`ParamBounds`]; mapping back always rounds integer dimensions and clamps.

use crate::error::{NoiseMapError, Result};
use crate::training::{CatBoostConfig, MAX_DEPTH};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Masks selecting fewer columns than this score negative infinity
pub const MIN_SELECTED_FEATURES: usize = 3;

/// Number of tuned hyperparameters
pub const N_PARAMS: usize = 4;

/// Dimension order used by every vector view
pub const PARAM_NAMES: [&str; N_PARAMS] = ["learning_rate", "depth", "l2_leaf_reg", "iterations"];

/// Which vector dimensions hold integers
pub const INTEGER_DIMS: [bool; N_PARAMS] = [false, true, false, true];

/// Inclusive bounds of the hyperparameter search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub learning_rate: (f64, f64),
    pub depth: (usize, usize),
    pub l2_leaf_reg: (f64, f64),
    pub iterations: (usize, usize),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            learning_rate: (0.01, 0.3),
            depth: (3, 10),
            l2_leaf_reg: (1.0, 10.0),
            iterations: (100, 1000),
        }
    }
}

impl ParamBounds {
    /// `(low, high)` per dimension in vector order
    pub fn ranges(&self) -> [(f64, f64); N_PARAMS] {
        [
            self.learning_rate,
            (self.depth.0 as f64, self.depth.1 as f64),
            self.l2_leaf_reg,
            (self.iterations.0 as f64, self.iterations.1 as f64),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, (low, high)) in PARAM_NAMES.iter().zip(self.ranges()) {
            if !low.is_finite() || !high.is_finite() || low > high {
                return Err(NoiseMapError::ConfigError(format!(
                    "Invalid bounds for {}: [{}, {}]",
                    name, low, high
                )));
            }
        }
        if self.learning_rate.0 <= 0.0 {
            return Err(NoiseMapError::ConfigError("learning_rate lower bound must be > 0".into()));
        }
        if self.depth.0 == 0 || self.depth.1 > MAX_DEPTH {
            return Err(NoiseMapError::ConfigError(format!("depth bounds must lie in 1..={}", MAX_DEPTH)));
        }
        if self.l2_leaf_reg.0 < 0.0 {
            return Err(NoiseMapError::ConfigError("l2_leaf_reg lower bound must be >= 0".into()));
        }
        if self.iterations.0 == 0 {
            return Err(NoiseMapError::ConfigError("iterations lower bound must be >= 1".into()));
        }
        Ok(())
    }

    /// Uniform draw; integer dimensions inclusive of both ends
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Hyperparameters {
        Hyperparameters {
            learning_rate: uniform(rng, self.learning_rate),
            depth: rng.gen_range(self.depth.0..=self.depth.1),
            l2_leaf_reg: uniform(rng, self.l2_leaf_reg),
            iterations: rng.gen_range(self.iterations.0..=self.iterations.1),
        }
    }

    /// Map raw values into `[0, 1]` per dimension
    pub fn normalize(&self, values: &[f64; N_PARAMS]) -> [f64; N_PARAMS] {
        let mut out = [0.0; N_PARAMS];
        for (d, (low, high)) in self.ranges().into_iter().enumerate() {
            let span = high - low;
            out[d] = if span > 0.0 { (values[d] - low) / span } else { 0.0 };
        }
        out
    }

    /// Inverse of [`normalize`](Self::normalize); result is rounded and clamped
    pub fn denormalize(&self, unit: &[f64; N_PARAMS]) -> Hyperparameters {
        let mut raw = [0.0; N_PARAMS];
        for (d, (low, high)) in self.ranges().into_iter().enumerate() {
            raw[d] = low + unit[d] * (high - low);
        }
        Hyperparameters::from_vector(&raw, self)
    }

    pub fn contains(&self, hp: &Hyperparameters) -> bool {
        hp.to_vector()
            .iter()
            .zip(self.ranges())
            .all(|(&v, (low, high))| v >= low && v <= high)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (low, high): (f64, f64)) -> f64 {
    if high > low { rng.gen_range(low..high) } else { low }
}

/// Gradient-boosting hyperparameters under search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub iterations: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self { learning_rate: 0.1, depth: 6, l2_leaf_reg: 3.0, iterations: 500 }
    }
}

impl Hyperparameters {
    pub fn to_vector(&self) -> [f64; N_PARAMS] {
        [self.learning_rate, self.depth as f64, self.l2_leaf_reg, self.iterations as f64]
    }

    /// Build from a raw vector, rounding integer dimensions and clamping to `bounds`
    pub fn from_vector(values: &[f64; N_PARAMS], bounds: &ParamBounds) -> Self {
        let mut v = [0.0; N_PARAMS];
        for (d, (low, high)) in bounds.ranges().into_iter().enumerate() {
            let x = if values[d].is_finite() { values[d] } else { low };
            let x = if INTEGER_DIMS[d] { x.round() } else { x };
            v[d] = x.clamp(low, high);
        }
        Self {
            learning_rate: v[0],
            depth: v[1] as usize,
            l2_leaf_reg: v[2],
            iterations: v[3] as usize,
        }
    }

    pub fn to_catboost_config(&self, random_seed: u64) -> CatBoostConfig {
        CatBoostConfig {
            iterations: self.iterations,
            learning_rate: self.learning_rate,
            depth: self.depth,
            l2_leaf_reg: self.l2_leaf_reg,
            random_seed,
            ..Default::default()
        }
    }
}

impl std::fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lr={:.4} depth={} l2={:.3} iterations={}",
            self.learning_rate, self.depth, self.l2_leaf_reg, self.iterations
        )
    }
}

/// Boolean selection over feature columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureMask {
    bits: Vec<bool>,
}

impl FeatureMask {
    pub fn from_bools(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Mask selecting every column
    pub fn all(n_features: usize) -> Self {
        Self { bits: vec![true; n_features] }
    }

    /// Each bit set independently with probability `p`
    pub fn random<R: Rng + ?Sized>(n_features: usize, p: f64, rng: &mut R) -> Self {
        Self { bits: (0..n_features).map(|_| rng.gen::<f64>() < p).collect() }
    }

    pub fn from_indices(n_features: usize, indices: &[usize]) -> Result<Self> {
        let mut bits = vec![false; n_features];
        for &i in indices {
            let slot = bits.get_mut(i).ok_or_else(|| {
                NoiseMapError::DataError(format!("Feature index {} outside {} features", i, n_features))
            })?;
            *slot = true;
        }
        Ok(Self { bits })
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn count_selected(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.bits.iter().enumerate().filter(|(_, &b)| b).map(|(i, _)| i).collect()
    }

    /// At least [`MIN_SELECTED_FEATURES`] columns selected
    pub fn is_viable(&self) -> bool {
        self.count_selected() >= MIN_SELECTED_FEATURES
    }

    pub fn get(&self, i: usize) -> bool {
        self.bits[i]
    }

    pub fn set(&mut self, i: usize, value: bool) {
        self.bits[i] = value;
    }

    pub fn flip(&mut self, i: usize) {
        self.bits[i] = !self.bits[i];
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }
}

/// One point in the joint hyperparameter + feature-mask space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub hyperparameters: Hyperparameters,
    pub feature_mask: Option<FeatureMask>,
    /// Last evaluated fitness, `NEG_INFINITY` until scored
    pub fitness: f64,
}

impl Candidate {
    pub fn new(hyperparameters: Hyperparameters, feature_mask: Option<FeatureMask>) -> Self {
        Self { hyperparameters, feature_mask, fitness: f64::NEG_INFINITY }
    }

    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = fitness;
        self
    }

    pub fn has_finite_fitness(&self) -> bool {
        self.fitness.is_finite()
    }
}
