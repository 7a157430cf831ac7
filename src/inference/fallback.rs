//! Ordered prediction strategies
//!
//! A [`FallbackChain`] asks each strategy in turn and returns the first
//! ready prediction. When every strategy is unavailable the chain fails
//! with the collected reasons. Malformed input is an error, never a reason
//! to fall back.

use crate::data::HealthImpact;
use crate::error::{NoiseMapError, Result};
use std::path::Path;
use tracing::{debug, warn};

use super::engine::{NoisePrediction, NoisePredictor};

/// Default level reported when no model is available, in dB
pub const DEFAULT_LEVEL_DB: f64 = 55.0;
/// Source reported when no model is available
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Result of asking one strategy
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome<T> {
    Ready(T),
    Unavailable(String),
}

/// One way of producing a prediction
pub trait PredictionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` for input the strategy rejects; `Unavailable` when it cannot serve at all
    fn predict(&self, features: &[f64]) -> Result<StrategyOutcome<NoisePrediction>>;
}

fn is_input_error(err: &NoiseMapError) -> bool {
    matches!(
        err,
        NoiseMapError::SchemaMismatch(_) | NoiseMapError::InferenceError(_) | NoiseMapError::ShapeError { .. }
    )
}

/// Serves the persisted model bundle, if it loaded
#[derive(Debug)]
pub struct ModelStrategy {
    predictor: std::result::Result<NoisePredictor, String>,
}

impl ModelStrategy {
    pub fn new(predictor: NoisePredictor) -> Self {
        Self { predictor: Ok(predictor) }
    }

    /// Strategy over the artifacts in `dir`; a load failure makes it unavailable
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let predictor = NoisePredictor::load(dir.as_ref()).map_err(|e| {
            warn!(dir = %dir.as_ref().display(), error = %e, "Model artifacts unavailable");
            e.to_string()
        });
        Self { predictor }
    }

    pub fn predictor(&self) -> Option<&NoisePredictor> {
        self.predictor.as_ref().ok()
    }
}

impl PredictionStrategy for ModelStrategy {
    fn name(&self) -> &str {
        "model"
    }

    fn predict(&self, features: &[f64]) -> Result<StrategyOutcome<NoisePrediction>> {
        match &self.predictor {
            Ok(predictor) => match predictor.predict(features) {
                Ok(prediction) => Ok(StrategyOutcome::Ready(prediction)),
                Err(e) if is_input_error(&e) => Err(e),
                Err(e) => Ok(StrategyOutcome::Unavailable(e.to_string())),
            },
            Err(reason) => Ok(StrategyOutcome::Unavailable(reason.clone())),
        }
    }
}

/// Fixed-level estimate mapped through the health thresholds
#[derive(Debug, Clone)]
pub struct ThresholdHeuristic {
    level_db: f64,
}

impl Default for ThresholdHeuristic {
    fn default() -> Self {
        Self { level_db: DEFAULT_LEVEL_DB }
    }
}

impl ThresholdHeuristic {
    pub fn with_level(level_db: f64) -> Self {
        Self { level_db }
    }
}

impl PredictionStrategy for ThresholdHeuristic {
    fn name(&self) -> &str {
        "threshold-heuristic"
    }

    fn predict(&self, _features: &[f64]) -> Result<StrategyOutcome<NoisePrediction>> {
        let health = HealthImpact::from_db(self.level_db);
        Ok(StrategyOutcome::Ready(NoisePrediction {
            noise_level_db: self.level_db,
            noise_source: UNKNOWN_SOURCE.to_string(),
            source_confidence: 0.0,
            health_impact: health,
            health_label: health.as_str().to_string(),
            strategy: self.name().to_string(),
        }))
    }
}

/// Strategies tried in order
#[derive(Default)]
pub struct FallbackChain {
    strategies: Vec<Box<dyn PredictionStrategy>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model bundle from `dir`, then the threshold heuristic
    pub fn standard(dir: impl AsRef<Path>) -> Self {
        Self::new()
            .with_strategy(Box::new(ModelStrategy::from_dir(dir)))
            .with_strategy(Box::new(ThresholdHeuristic::default()))
    }

    pub fn with_strategy(mut self, strategy: Box<dyn PredictionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn predict(&self, features: &[f64]) -> Result<NoisePrediction> {
        let mut reasons = Vec::new();
        for strategy in &self.strategies {
            match strategy.predict(features)? {
                StrategyOutcome::Ready(prediction) => return Ok(prediction),
                StrategyOutcome::Unavailable(reason) => {
                    debug!(strategy = strategy.name(), %reason, "Strategy unavailable");
                    reasons.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }
        if reasons.is_empty() {
            reasons.push("no strategies configured".to_string());
        }
        Err(NoiseMapError::StrategiesExhausted(reasons.join("; ")))
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain").field("strategies", &self.strategy_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Offline;

    impl PredictionStrategy for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn predict(&self, _: &[f64]) -> Result<StrategyOutcome<NoisePrediction>> {
            Ok(StrategyOutcome::Unavailable("service down".into()))
        }
    }

    #[test]
    fn test_missing_model_falls_back_to_heuristic() {
        let dir = tempdir().unwrap();
        let chain = FallbackChain::standard(dir.path().join("missing"));
        assert_eq!(chain.strategy_names(), vec!["model", "threshold-heuristic"]);

        let prediction = chain.predict(&[0.0; 20]).unwrap();
        assert_eq!(prediction.strategy, "threshold-heuristic");
        assert_eq!(prediction.noise_level_db, DEFAULT_LEVEL_DB);
        assert_eq!(prediction.noise_source, UNKNOWN_SOURCE);
        assert_eq!(prediction.health_impact, HealthImpact::Moderate);
    }

    #[test]
    fn test_exhausted_chain_lists_reasons() {
        let chain = FallbackChain::new().with_strategy(Box::new(Offline)).with_strategy(Box::new(Offline));
        match chain.predict(&[1.0]) {
            Err(NoiseMapError::StrategiesExhausted(reasons)) => {
                assert_eq!(reasons, "offline: service down; offline: service down");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(FallbackChain::new().predict(&[1.0]).is_err());
    }

    #[test]
    fn test_heuristic_level() {
        let outcome = ThresholdHeuristic::with_level(90.0).predict(&[]).unwrap();
        match outcome {
            StrategyOutcome::Ready(p) => assert_eq!(p.health_impact, HealthImpact::Severe),
            StrategyOutcome::Unavailable(r) => panic!("unavailable: {}", r),
        }
    }

    struct Rejecting;

    impl PredictionStrategy for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn predict(&self, _: &[f64]) -> Result<StrategyOutcome<NoisePrediction>> {
            Err(NoiseMapError::SchemaMismatch("expected 20 input features, got 3".into()))
        }
    }

    #[test]
    fn test_rejected_input_skips_later_strategies() {
        let chain = FallbackChain::new()
            .with_strategy(Box::new(Rejecting))
            .with_strategy(Box::new(ThresholdHeuristic::default()));
        assert!(matches!(chain.predict(&[1.0, 2.0, 3.0]), Err(NoiseMapError::SchemaMismatch(_))));
    }
}
