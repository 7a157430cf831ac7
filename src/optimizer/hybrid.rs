//! Hybrid firefly / fruit-fly optimizer
//!
//! Every generation the population is scored in parallel, the champion is
//! updated, fireflies move (hyperparameters and masks together) and, every
//! `refine_interval` generations, the masks are pulled toward the best
//! candidate of the generation by fruit-fly refinement.

use crate::data::NoiseDataset;
use crate::error::{NoiseMapError, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::candidate::{Candidate, MIN_SELECTED_FEATURES};
use super::config::HybridConfig;
use super::firefly::{initial_population, FireflySearch};
use super::fitness::{evaluate_population, FitnessEvaluator, FitnessFunction};
use super::fruitfly::FeatureRefinement;
use super::strategy::{best_index, GenerationRecord, OptimizationOutcome, SearchStrategy};

/// Offset of the refinement RNG stream from the run seed
const REFINEMENT_SEED_OFFSET: u64 = 0x5EED_F1E5;

/// Joint hyperparameter and feature-subset search
#[derive(Debug, Clone)]
pub struct HybridOptimizer {
    config: HybridConfig,
}

impl HybridOptimizer {
    pub fn new(config: HybridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Optimize against the combined three-model fitness on `dataset`
    pub fn optimize(&self, dataset: &NoiseDataset) -> Result<OptimizationOutcome> {
        if dataset.n_features() < MIN_SELECTED_FEATURES {
            return Err(NoiseMapError::DataError(format!(
                "Feature selection needs at least {} features, dataset has {}",
                MIN_SELECTED_FEATURES,
                dataset.n_features()
            )));
        }
        info!(
            samples = dataset.n_samples(),
            features = dataset.n_features(),
            population = self.config.population_size,
            generations = self.config.generations,
            "Starting hybrid optimization"
        );
        let evaluator = FitnessEvaluator::new(dataset, self.config.fitness.clone())
            .with_cv_folds(self.config.cv_folds)
            .with_random_seed(self.config.seed);
        self.optimize_with(&evaluator, dataset.n_features())
    }

    /// Optimize against any fitness function over `n_features` mask bits
    pub fn optimize_with<F: FitnessFunction + ?Sized>(
        &self,
        fitness: &F,
        n_features: usize,
    ) -> Result<OptimizationOutcome> {
        self.config.validate()?;
        let config = &self.config;

        let mut firefly_config = config.firefly.clone();
        firefly_config.seed = config.seed;
        let mut mover = FireflySearch::hybrid(firefly_config, config.bounds.clone());
        let mut refiner = FeatureRefinement::new(config.refinement.clone(), config.seed ^ REFINEMENT_SEED_OFFSET);

        let start = Instant::now();
        let mut population = initial_population(&config.bounds, config.population_size, Some(n_features), config.seed);
        let mut champion: Option<Candidate> = None;
        let mut history = Vec::with_capacity(config.generations);
        let mut evaluations = 0;
        let mut stopped_early = false;

        for generation in 0..config.generations {
            evaluations += evaluate_population(&mut population, fitness);

            let generation_best = best_index(population.iter().map(|c| c.fitness));
            if let Some((idx, value)) = generation_best {
                if champion.as_ref().map_or(true, |c| value > c.fitness) {
                    champion = Some(population[idx].clone());
                }
            }

            let refine = generation % config.refine_interval == 0;
            let reference = generation_best.map(|(idx, _)| population[idx].clone());

            population = mover.generate_neighbors(&population);
            let refined = match (refine, reference) {
                (true, Some(best)) => {
                    refiner.set_reference(&best);
                    population = refiner.generate_neighbors(&population);
                    true
                }
                _ => false,
            };

            let record = GenerationRecord {
                generation,
                generation_best: generation_best.map(|(_, v)| v),
                champion_fitness: champion.as_ref().map(|c| c.fitness),
                refined,
                elapsed_secs: start.elapsed().as_secs_f64(),
            };
            self.log_generation(&record, champion.as_ref());
            history.push(record);

            if let Some(budget) = config.time_budget_secs {
                if start.elapsed().as_secs_f64() >= budget && generation + 1 < config.generations {
                    warn!(generation, budget_secs = budget, "Time budget exhausted, stopping early");
                    stopped_early = true;
                    break;
                }
            }
        }

        let champion = match champion {
            Some(c) => c,
            None => {
                warn!(evaluations, "No candidate produced a finite fitness");
                return Err(NoiseMapError::OptimizationExhausted { generations: history.len(), evaluations });
            }
        };

        let selected = champion.feature_mask.as_ref().map_or(n_features, |m| m.count_selected());
        info!(
            fitness = champion.fitness,
            params = %champion.hyperparameters,
            selected_features = selected,
            total_features = n_features,
            evaluations,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Hybrid optimization finished"
        );

        Ok(OptimizationOutcome {
            champion,
            history,
            evaluations,
            elapsed_secs: start.elapsed().as_secs_f64(),
            stopped_early,
        })
    }

    fn log_generation(&self, record: &GenerationRecord, champion: Option<&Candidate>) {
        let selected = champion.and_then(|c| c.feature_mask.as_ref()).map(|m| m.count_selected());
        if self.config.verbose {
            info!(
                generation = record.generation,
                best_fitness = ?record.champion_fitness,
                generation_best = ?record.generation_best,
                ?selected,
                refined = record.refined,
                elapsed_secs = record.elapsed_secs,
                "Generation complete"
            );
        } else {
            debug!(
                generation = record.generation,
                best_fitness = ?record.champion_fitness,
                generation_best = ?record.generation_best,
                "Generation complete"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParamBounds;

    /// Peaks at learning_rate 0.1 with every feature selected
    fn synthetic_fitness(c: &Candidate) -> f64 {
        let mask = match &c.feature_mask {
            Some(m) if m.is_viable() => m,
            _ => return f64::NEG_INFINITY,
        };
        let lr = c.hyperparameters.learning_rate;
        1.0 - (lr - 0.1).powi(2) + 0.01 * mask.count_selected() as f64
    }

    fn small_config() -> HybridConfig {
        HybridConfig::new().with_population_size(8).with_generations(7).with_seed(11).with_verbose(false)
    }

    #[test]
    fn test_champion_never_decreases() {
        let outcome = HybridOptimizer::new(small_config()).optimize_with(&synthetic_fitness, 10).unwrap();
        assert_eq!(outcome.history.len(), 7);
        assert_eq!(outcome.evaluations, 56);
        let trace = outcome.champion_trace();
        assert!(trace.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*trace.last().unwrap(), outcome.champion.fitness);
        assert!(ParamBounds::default().contains(&outcome.champion.hyperparameters));
        assert!(outcome.champion.feature_mask.as_ref().unwrap().is_viable());
    }

    #[test]
    fn test_refinement_cadence() {
        let outcome = HybridOptimizer::new(small_config()).optimize_with(&synthetic_fitness, 10).unwrap();
        let refined: Vec<usize> = outcome.history.iter().filter(|r| r.refined).map(|r| r.generation).collect();
        assert_eq!(refined, vec![0, 5]);
    }

    #[test]
    fn test_seeded_runs_match() {
        let a = HybridOptimizer::new(small_config()).optimize_with(&synthetic_fitness, 10).unwrap();
        let b = HybridOptimizer::new(small_config()).optimize_with(&synthetic_fitness, 10).unwrap();
        assert_eq!(a.champion, b.champion);
        assert_eq!(a.champion_trace(), b.champion_trace());
    }

    #[test]
    fn test_time_budget_stops_between_generations() {
        let config = small_config().with_time_budget(1e-9);
        let outcome = HybridOptimizer::new(config).optimize_with(&synthetic_fitness, 10).unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(outcome.history.len(), 1);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let never = |_: &Candidate| f64::NEG_INFINITY;
        let err = HybridOptimizer::new(small_config()).optimize_with(&never, 10).unwrap_err();
        assert!(matches!(err, NoiseMapError::OptimizationExhausted { generations: 7, evaluations: 56 }));
    }

    #[test]
    fn test_larger_population_extends_smaller() {
        // the larger initial population extends the smaller one, so a single
        // generation cannot lose; later generations move both swarms differently
        // and carry no such ordering
        let run = |population: usize| {
            let config = small_config().with_population_size(population).with_generations(1);
            HybridOptimizer::new(config).optimize_with(&synthetic_fitness, 10).unwrap().champion.fitness
        };
        assert!(run(50) >= run(5));
    }
}
