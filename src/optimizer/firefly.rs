//! Firefly attraction search
//!
//! Each firefly moves toward the first brighter firefly in population order:
//! `β = β₀·exp(−γ·r²)`, `u' = u + β(u_j − u) + α(rand − 0.5)`, computed in
//! bounds-normalized coordinates. A firefly with no brighter neighbor takes a
//! small random step on its continuous hyperparameters. In hybrid mode the
//! feature mask co-evolves: attraction copies bits from the attractor, the
//! random step flips bits.

use crate::error::{NoiseMapError, Result};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Instant;
use tracing::{debug, info};

use super::candidate::{Candidate, FeatureMask, ParamBounds, INTEGER_DIMS, N_PARAMS};
use super::config::FireflyConfig;
use super::fitness::{evaluate_population, FitnessFunction};
use super::strategy::{best_index, GenerationRecord, OptimizationOutcome, SearchStrategy};

/// Seed of the RNG stream that draws initial candidate `k`
pub(crate) fn candidate_stream_seed(seed: u64, k: usize) -> u64 {
    seed ^ (k as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Random initial population; candidate `k` depends only on `(seed, k)`,
/// so a larger population extends a smaller one with the same seed.
pub fn initial_population(
    bounds: &ParamBounds,
    size: usize,
    n_features: Option<usize>,
    seed: u64,
) -> Vec<Candidate> {
    (0..size)
        .map(|k| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(candidate_stream_seed(seed, k));
            let hp = bounds.sample(&mut rng);
            let mask = n_features.map(|n| FeatureMask::random(n, 0.5, &mut rng));
            Candidate::new(hp, mask)
        })
        .collect()
}

/// Firefly movement over hyperparameters, with optional mask co-evolution
#[derive(Debug, Clone)]
pub struct FireflySearch {
    config: FireflyConfig,
    bounds: ParamBounds,
    hybrid: bool,
    rng: Xoshiro256PlusPlus,
}

impl FireflySearch {
    /// Hyperparameter-only search
    pub fn new(config: FireflyConfig, bounds: ParamBounds) -> Self {
        let rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        Self { config, bounds, hybrid: false, rng }
    }

    /// Search that also evolves each candidate's feature mask
    pub fn hybrid(config: FireflyConfig, bounds: ParamBounds) -> Self {
        Self { hybrid: true, ..Self::new(config, bounds) }
    }

    pub fn config(&self) -> &FireflyConfig {
        &self.config
    }

    pub fn bounds(&self) -> &ParamBounds {
        &self.bounds
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    /// Move `fly` toward the brighter `attractor`
    pub fn attract(&mut self, fly: &Candidate, attractor: &Candidate) -> Candidate {
        let ui = self.bounds.normalize(&fly.hyperparameters.to_vector());
        let uj = self.bounds.normalize(&attractor.hyperparameters.to_vector());

        let r2: f64 = ui.iter().zip(uj.iter()).map(|(a, b)| (b - a).powi(2)).sum();
        let beta = self.config.beta0 * (-self.config.gamma * r2).exp();

        let mut moved = [0.0; N_PARAMS];
        for d in 0..N_PARAMS {
            moved[d] = ui[d] + beta * (uj[d] - ui[d]) + self.config.alpha * (self.rng.gen::<f64>() - 0.5);
        }

        let mask = match (&fly.feature_mask, &attractor.feature_mask) {
            (Some(own), Some(other)) if self.hybrid => {
                let mut mask = own.clone();
                for bit in 0..mask.len().min(other.len()) {
                    if self.rng.gen::<f64>() < self.config.mask_copy_rate {
                        mask.set(bit, other.get(bit));
                    }
                }
                Some(mask)
            }
            (own, _) => own.clone(),
        };

        Candidate::new(self.bounds.denormalize(&moved), mask)
    }

    /// Random step on continuous hyperparameters; integers stay put
    pub fn random_move(&mut self, fly: &Candidate) -> Candidate {
        let mut u = self.bounds.normalize(&fly.hyperparameters.to_vector());
        for d in 0..N_PARAMS {
            if !INTEGER_DIMS[d] {
                u[d] += self.config.alpha * (self.rng.gen::<f64>() - 0.5);
            }
        }

        let mask = match &fly.feature_mask {
            Some(own) if self.hybrid => {
                let mut mask = own.clone();
                for bit in 0..mask.len() {
                    if self.rng.gen::<f64>() < self.config.mask_flip_rate {
                        mask.flip(bit);
                    }
                }
                Some(mask)
            }
            other => other.clone(),
        };

        Candidate::new(self.bounds.denormalize(&u), mask)
    }

    /// Standalone run: evaluate, track the best, move; repeated `max_generations` times
    pub fn optimize<F: FitnessFunction + ?Sized>(
        &mut self,
        fitness: &F,
        n_features: Option<usize>,
    ) -> Result<OptimizationOutcome> {
        self.config.validate()?;
        self.bounds.validate()?;

        let start = Instant::now();
        let features = if self.hybrid { n_features } else { None };
        let mut population = initial_population(&self.bounds, self.config.population_size, features, self.config.seed);
        let mut champion: Option<Candidate> = None;
        let mut history = Vec::with_capacity(self.config.max_generations);
        let mut evaluations = 0;

        for generation in 0..self.config.max_generations {
            evaluations += evaluate_population(&mut population, fitness);

            let generation_best = best_index(population.iter().map(|c| c.fitness));
            if let Some((idx, value)) = generation_best {
                if champion.as_ref().map_or(true, |c| value > c.fitness) {
                    champion = Some(population[idx].clone());
                }
            }

            let champion_fitness = champion.as_ref().map(|c| c.fitness);
            history.push(GenerationRecord {
                generation,
                generation_best: generation_best.map(|(_, v)| v),
                champion_fitness,
                refined: false,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
            debug!(generation, ?champion_fitness, "Firefly generation complete");

            population = self.generate_neighbors(&population);
        }

        let champion = champion.ok_or(NoiseMapError::OptimizationExhausted {
            generations: self.config.max_generations,
            evaluations,
        })?;
        info!(
            fitness = champion.fitness,
            params = %champion.hyperparameters,
            evaluations,
            "Firefly search finished"
        );

        Ok(OptimizationOutcome {
            champion,
            history,
            evaluations,
            elapsed_secs: start.elapsed().as_secs_f64(),
            stopped_early: false,
        })
    }
}

impl SearchStrategy for FireflySearch {
    fn name(&self) -> &'static str {
        if self.hybrid { "firefly-hybrid" } else { "firefly" }
    }

    fn generate_neighbors(&mut self, population: &[Candidate]) -> Vec<Candidate> {
        population
            .iter()
            .map(|fly| match population.iter().find(|other| other.fitness > fly.fitness) {
                Some(brighter) => self.attract(fly, brighter),
                None => self.random_move(fly),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Hyperparameters;

    fn scored(hp: Hyperparameters, mask: Option<FeatureMask>, fitness: f64) -> Candidate {
        Candidate::new(hp, mask).with_fitness(fitness)
    }

    #[test]
    fn test_moves_stay_within_bounds() {
        let bounds = ParamBounds::default();
        // large alpha pushes hard against the bounds
        let config = FireflyConfig { alpha: 3.0, ..FireflyConfig::default() };
        let mut search = FireflySearch::hybrid(config, bounds.clone());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);

        let mut population = initial_population(&bounds, 20, Some(8), 11);
        for round in 0..60 {
            for c in population.iter_mut() {
                c.fitness = rng.gen::<f64>();
            }
            population = search.generate_neighbors(&population);
            for c in &population {
                assert!(bounds.contains(&c.hyperparameters), "round {}: {}", round, c.hyperparameters);
                assert_eq!(c.feature_mask.as_ref().map(|m| m.len()), Some(8));
            }
        }
    }

    #[test]
    fn test_first_brighter_neighbor_attracts() {
        let bounds = ParamBounds::default();
        let config = FireflyConfig { alpha: 0.0, beta0: 1.0, gamma: 0.0, ..FireflyConfig::default() };
        let mut search = FireflySearch::new(config, bounds);

        let low = Hyperparameters { learning_rate: 0.01, depth: 3, l2_leaf_reg: 1.0, iterations: 100 };
        let first = Hyperparameters { learning_rate: 0.2, depth: 8, l2_leaf_reg: 5.0, iterations: 500 };
        let second = Hyperparameters { learning_rate: 0.3, depth: 10, l2_leaf_reg: 10.0, iterations: 1000 };
        let population = vec![scored(low, None, 0.1), scored(first, None, 0.5), scored(second, None, 0.9)];

        let next = search.generate_neighbors(&population);
        // with gamma = 0 and beta0 = 1 the firefly lands on its attractor
        assert_eq!(next[0].hyperparameters.depth, 8);
        assert!((next[0].hyperparameters.learning_rate - 0.2).abs() < 1e-9);
        assert_eq!(next[1].hyperparameters.depth, 10);
        // the brightest takes a random move, which with alpha = 0 is a no-op
        assert!((next[2].hyperparameters.learning_rate - 0.3).abs() < 1e-12);
        assert_eq!(next[2].hyperparameters.iterations, 1000);
        assert!(next.iter().all(|c| c.fitness == f64::NEG_INFINITY));
    }

    #[test]
    fn test_random_move_keeps_integers() {
        let bounds = ParamBounds::default();
        let mut search = FireflySearch::new(FireflyConfig::default(), bounds.clone());
        let hp = Hyperparameters { learning_rate: 0.1, depth: 5, l2_leaf_reg: 4.0, iterations: 321 };
        for _ in 0..50 {
            let moved = search.random_move(&Candidate::new(hp, None));
            assert_eq!((moved.hyperparameters.depth, moved.hyperparameters.iterations), (5, 321));
            assert!(bounds.contains(&moved.hyperparameters));
        }
    }

    #[test]
    fn test_mask_rates_apply() {
        let bounds = ParamBounds::default();
        let config = FireflyConfig { mask_copy_rate: 1.0, mask_flip_rate: 1.0, ..FireflyConfig::default() };
        let mut search = FireflySearch::hybrid(config, bounds);
        let hp = Hyperparameters::default();

        let dim = FeatureMask::from_bools(vec![false, false, true, false]);
        let bright = FeatureMask::from_bools(vec![true, true, false, true]);
        let moved = search.attract(&Candidate::new(hp, Some(dim.clone())), &Candidate::new(hp, Some(bright.clone())));
        assert_eq!(moved.feature_mask, Some(bright));

        let flipped = search.random_move(&Candidate::new(hp, Some(dim)));
        assert_eq!(flipped.feature_mask.unwrap().as_slice(), &[true, true, false, true]);
    }

    #[test]
    fn test_plain_search_leaves_masks_alone() {
        let bounds = ParamBounds::default();
        let config = FireflyConfig { mask_copy_rate: 1.0, mask_flip_rate: 1.0, ..FireflyConfig::default() };
        let mut search = FireflySearch::new(config, bounds);
        let mask = FeatureMask::from_bools(vec![true, false, true]);
        let moved = search.random_move(&Candidate::new(Hyperparameters::default(), Some(mask.clone())));
        assert_eq!(moved.feature_mask, Some(mask));
    }

    #[test]
    fn test_same_seed_same_populations() {
        let bounds = ParamBounds::default();
        let start = initial_population(&bounds, 10, Some(6), 3);
        let run = || {
            let mut search = FireflySearch::hybrid(FireflyConfig::default().with_seed(9), bounds.clone());
            let mut population = start.clone();
            for _ in 0..5 {
                for c in population.iter_mut() {
                    c.fitness = c.hyperparameters.learning_rate;
                }
                population = search.generate_neighbors(&population);
            }
            population
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_initial_population_prefix() {
        let bounds = ParamBounds::default();
        let small = initial_population(&bounds, 5, Some(10), 42);
        let large = initial_population(&bounds, 50, Some(10), 42);
        assert_eq!(&large[..5], &small[..]);
    }

    #[test]
    fn test_optimize_tracks_best() {
        let bounds = ParamBounds::default();
        let config = FireflyConfig::default().with_population_size(8).with_max_generations(6);
        let mut search = FireflySearch::new(config, bounds);
        // peak at learning rate 0.15
        let fitness = |c: &Candidate| -(c.hyperparameters.learning_rate - 0.15).abs();
        let outcome = search.optimize(&fitness, None).unwrap();

        assert_eq!(outcome.history.len(), 6);
        assert_eq!(outcome.evaluations, 48);
        let trace = outcome.champion_trace();
        assert!(trace.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*trace.last().unwrap(), outcome.champion.fitness);
    }

    #[test]
    fn test_optimize_exhausted() {
        let config = FireflyConfig::default().with_population_size(3).with_max_generations(2);
        let mut search = FireflySearch::new(config, ParamBounds::default());
        let fitness = |_: &Candidate| f64::NEG_INFINITY;
        let result = search.optimize(&fitness, None);
        assert!(matches!(result, Err(NoiseMapError::OptimizationExhausted { generations: 2, evaluations: 6 })));
    }
}
