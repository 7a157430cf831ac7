//! Model training module
//!
//! Provides the gradient-boosted trees behind the three noise models:
//! - CatBoost-style symmetric-tree regressor and multiclass classifier
//! - K-fold and stratified cross-validation
//! - Metrics and the `Model` persistence trait
//! - Final training of the model triple with a quality report

mod models;
pub mod catboost;
pub mod cross_validation;
pub mod final_model;

pub use catboost::{CatBoostClassifier, CatBoostConfig, CatBoostRegressor, MAX_BORDER_COUNT, MAX_DEPTH};
pub use cross_validation::{cross_val_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use final_model::{rank_features, FeatureRanking, FinalTrainer, ModelTriple, TrainingReport, TriplePrediction};
pub use models::{accuracy, mean_squared_error, root_mean_squared_error, Model, ModelMetrics};
