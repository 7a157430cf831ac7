//! Fruit-fly swarm search
//!
//! Flies are scattered around a 2-D swarm center. Each fly's `(x, y)` is
//! mapped into the search space (even dimensions read `x`, odd ones `y`,
//! both through `(v + 10) / 20`), its smell is `1 / sqrt(x² + y²)`, and the
//! whole swarm relocates to the best-smelling fly every iteration. The run
//! remembers the best-fitness position seen.
//!
//! [`FeatureRefinement`] is the mask-only variant used between hybrid
//! generations.

use crate::error::{NoiseMapError, Result};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::candidate::{Candidate, FeatureMask, Hyperparameters, ParamBounds, INTEGER_DIMS, N_PARAMS};
use super::config::{FruitFlyConfig, RefinementConfig};
use super::fitness::FitnessFunction;
use super::strategy::{best_index, GenerationRecord, OptimizationOutcome, SearchStrategy};

/// Swarm center coordinates are drawn from `[-CENTER_INIT_RANGE, CENTER_INIT_RANGE]`
pub const CENTER_INIT_RANGE: f64 = 5.0;

/// One fly of one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fly {
    pub x: f64,
    pub y: f64,
    pub distance: f64,
    /// `1 / distance`, infinite at the origin
    pub smell: f64,
    /// Coordinates mapped into the search space, one entry per dimension
    pub position: Vec<f64>,
    pub fitness: f64,
}

/// Flies of one iteration and which one the swarm followed
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub flies: Vec<Fly>,
    pub best_smell_index: usize,
    /// Whether the running best fitness improved this iteration
    pub improved: bool,
}

/// Result of standalone feature selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub mask: FeatureMask,
    /// Per-feature weight in `[0, 1]`; above 0.5 selects
    pub weights: Vec<f64>,
    pub fitness: f64,
    pub history: Vec<GenerationRecord>,
}

/// Map a swarm coordinate pair into `ranges`, clamped
pub fn map_coordinates(x: f64, y: f64, ranges: &[(f64, f64)]) -> Vec<f64> {
    ranges
        .iter()
        .enumerate()
        .map(|(d, &(low, high))| {
            let v = if d % 2 == 0 { x } else { y };
            let normalized = (v + 10.0) / 20.0;
            (low + normalized * (high - low)).clamp(low, high)
        })
        .collect()
}

/// Hyperparameters at a mapped position; integer dimensions truncate
fn position_to_hyperparameters(position: &[f64], bounds: &ParamBounds) -> Hyperparameters {
    let mut v = [0.0; N_PARAMS];
    for d in 0..N_PARAMS {
        v[d] = if INTEGER_DIMS[d] { position[d].trunc() } else { position[d] };
    }
    Hyperparameters::from_vector(&v, bounds)
}

fn weights_to_mask(weights: &[f64]) -> FeatureMask {
    FeatureMask::from_bools(weights.iter().map(|&w| w > 0.5).collect())
}

/// Fruit-fly optimization over an arbitrary box
#[derive(Debug, Clone)]
pub struct FruitFlySearch {
    config: FruitFlyConfig,
    rng: Xoshiro256PlusPlus,
    center: (f64, f64),
    best: Option<Fly>,
}

impl FruitFlySearch {
    pub fn new(config: FruitFlyConfig) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let center = Self::draw_center(&mut rng);
        Self { config, rng, center, best: None }
    }

    fn draw_center(rng: &mut Xoshiro256PlusPlus) -> (f64, f64) {
        (
            rng.gen_range(-CENTER_INIT_RANGE..CENTER_INIT_RANGE),
            rng.gen_range(-CENTER_INIT_RANGE..CENTER_INIT_RANGE),
        )
    }

    /// Fresh center and no remembered best
    pub fn reset(&mut self) {
        self.center = Self::draw_center(&mut self.rng);
        self.best = None;
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Best-fitness fly seen since the last reset
    pub fn best(&self) -> Option<&Fly> {
        self.best.as_ref()
    }

    /// Scatter the swarm around the center
    pub fn sample_flies(&mut self, ranges: &[(f64, f64)]) -> Vec<Fly> {
        let step = self.config.step_size;
        (0..self.config.population_size)
            .map(|_| {
                let x = self.center.0 + self.rng.gen_range(-step..=step);
                let y = self.center.1 + self.rng.gen_range(-step..=step);
                let distance = (x * x + y * y).sqrt();
                let smell = if distance == 0.0 { f64::INFINITY } else { 1.0 / distance };
                Fly { x, y, distance, smell, position: map_coordinates(x, y, ranges), fitness: f64::NEG_INFINITY }
            })
            .collect()
    }

    /// One iteration: sample, score in parallel, follow the best smell
    pub fn iterate<F, M>(&mut self, ranges: &[(f64, f64)], fitness: &F, to_candidate: &M) -> IterationReport
    where
        F: FitnessFunction + ?Sized,
        M: Fn(&[f64]) -> Candidate + Sync,
    {
        let mut flies = self.sample_flies(ranges);
        flies.par_iter_mut().for_each(|fly| {
            fly.fitness = fitness.evaluate(&to_candidate(&fly.position));
        });

        let mut best_smell_index = 0;
        for (i, fly) in flies.iter().enumerate().skip(1) {
            if fly.smell > flies[best_smell_index].smell {
                best_smell_index = i;
            }
        }

        let leader = &flies[best_smell_index];
        let improved = leader.fitness > self.best.as_ref().map_or(f64::NEG_INFINITY, |b| b.fitness);
        if improved {
            self.best = Some(leader.clone());
        }
        self.center = (leader.x, leader.y);

        IterationReport { flies, best_smell_index, improved }
    }

    fn run<F, M>(&mut self, ranges: &[(f64, f64)], fitness: &F, to_candidate: &M) -> Result<(Fly, Vec<GenerationRecord>)>
    where
        F: FitnessFunction + ?Sized,
        M: Fn(&[f64]) -> Candidate + Sync,
    {
        self.config.validate()?;
        self.reset();
        let start = Instant::now();
        let mut history = Vec::with_capacity(self.config.max_iterations);

        for iteration in 0..self.config.max_iterations {
            let report = self.iterate(ranges, fitness, to_candidate);
            let generation_best = best_index(report.flies.iter().map(|f| f.fitness)).map(|(_, v)| v);
            history.push(GenerationRecord {
                generation: iteration,
                generation_best,
                champion_fitness: self.best.as_ref().map(|b| b.fitness),
                refined: false,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
            debug!(
                iteration,
                center_x = self.center.0,
                center_y = self.center.1,
                best_fitness = ?self.best.as_ref().map(|b| b.fitness),
                "Fruit-fly iteration complete"
            );
        }

        let best = self.best.clone().ok_or(NoiseMapError::OptimizationExhausted {
            generations: self.config.max_iterations,
            evaluations: self.config.max_iterations * self.config.population_size,
        })?;
        Ok((best, history))
    }

    /// Search the four hyperparameters
    pub fn optimize_hyperparameters<F: FitnessFunction + ?Sized>(
        &mut self,
        bounds: &ParamBounds,
        fitness: &F,
    ) -> Result<OptimizationOutcome> {
        bounds.validate()?;
        let start = Instant::now();
        let ranges = bounds.ranges();
        let to_candidate = |position: &[f64]| Candidate::new(position_to_hyperparameters(position, bounds), None);

        let (best, history) = self.run(&ranges, fitness, &to_candidate)?;
        let champion = to_candidate(&best.position).with_fitness(best.fitness);
        info!(fitness = champion.fitness, params = %champion.hyperparameters, "Fruit-fly search finished");

        Ok(OptimizationOutcome {
            champion,
            history,
            evaluations: self.config.max_iterations * self.config.population_size,
            elapsed_secs: start.elapsed().as_secs_f64(),
            stopped_early: false,
        })
    }

    /// Search one `[0, 1]` weight per feature with fixed hyperparameters
    pub fn optimize_features<F: FitnessFunction + ?Sized>(
        &mut self,
        n_features: usize,
        hyperparameters: Hyperparameters,
        fitness: &F,
    ) -> Result<FeatureSelection> {
        if n_features == 0 {
            return Err(NoiseMapError::DataError("No features to select from".into()));
        }
        let ranges = vec![(0.0, 1.0); n_features];
        let to_candidate = |weights: &[f64]| Candidate::new(hyperparameters, Some(weights_to_mask(weights)));

        let (best, history) = self.run(&ranges, fitness, &to_candidate)?;
        let mask = weights_to_mask(&best.position);
        info!(selected = mask.count_selected(), total = n_features, fitness = best.fitness, "Feature selection finished");

        Ok(FeatureSelection { mask, weights: best.position, fitness: best.fitness, history })
    }
}

/// Fruit-fly style mask refinement toward a reference candidate
#[derive(Debug, Clone)]
pub struct FeatureRefinement {
    config: RefinementConfig,
    reference: Option<FeatureMask>,
    rng: Xoshiro256PlusPlus,
}

impl FeatureRefinement {
    pub fn new(config: RefinementConfig, seed: u64) -> Self {
        Self { config, reference: None, rng: Xoshiro256PlusPlus::seed_from_u64(seed) }
    }

    /// Candidate whose mask the population is pulled toward
    pub fn set_reference(&mut self, best: &Candidate) {
        self.reference = best.feature_mask.clone();
    }

    pub fn reference(&self) -> Option<&FeatureMask> {
        self.reference.as_ref()
    }

    fn refine_mask(&mut self, mask: &FeatureMask, reference: &FeatureMask) -> FeatureMask {
        let mut refined = mask.clone();
        for bit in 0..refined.len().min(reference.len()) {
            if self.rng.gen::<f64>() < self.config.exploration_rate {
                let value = if self.rng.gen::<f64>() < self.config.follow_best_rate {
                    reference.get(bit)
                } else {
                    self.rng.gen_bool(0.5)
                };
                refined.set(bit, value);
            }
        }
        refined
    }
}

impl SearchStrategy for FeatureRefinement {
    fn name(&self) -> &'static str {
        "fruitfly-refinement"
    }

    /// Hyperparameters and fitness are carried over unchanged
    fn generate_neighbors(&mut self, population: &[Candidate]) -> Vec<Candidate> {
        let reference = match self.reference.clone() {
            Some(r) => r,
            None => return population.to_vec(),
        };
        population
            .iter()
            .map(|c| {
                let mut refined = c.clone();
                if let Some(mask) = &c.feature_mask {
                    refined.feature_mask = Some(self.refine_mask(mask, &reference));
                }
                refined
            })
            .collect()
    }
}
