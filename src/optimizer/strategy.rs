//! Common interface and results of the population search strategies

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// A move rule that turns an evaluated population into the next one.
///
/// The returned population has the same length and order as the input;
/// fitness of moved candidates is reset to `NEG_INFINITY` unless the
/// strategy leaves a candidate's search position untouched.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    fn generate_neighbors(&mut self, population: &[Candidate]) -> Vec<Candidate>;
}

/// Progress of one generation (or fruit-fly iteration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    /// Best fitness within this generation; `None` if nothing scored
    pub generation_best: Option<f64>,
    /// Best fitness seen so far; `None` until something scores
    pub champion_fitness: Option<f64>,
    /// Whether mask refinement ran after this generation
    pub refined: bool,
    pub elapsed_secs: f64,
}

/// Result of a complete search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub champion: Candidate,
    pub history: Vec<GenerationRecord>,
    pub evaluations: usize,
    pub elapsed_secs: f64,
    /// The time budget ended the run before the configured generation count
    pub stopped_early: bool,
}

impl OptimizationOutcome {
    /// Champion fitness per recorded generation
    pub fn champion_trace(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(|r| r.champion_fitness.unwrap_or(f64::NEG_INFINITY))
            .collect()
    }
}

/// Finite maximum of `values`, first index on ties
pub(crate) fn best_index(values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_finite() && best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_index_skips_non_finite() {
        let values = [f64::NEG_INFINITY, 0.3, f64::NAN, 0.7, 0.7];
        assert_eq!(best_index(values), Some((3, 0.7)));
        assert_eq!(best_index([f64::NEG_INFINITY; 3]), None);
    }
}
