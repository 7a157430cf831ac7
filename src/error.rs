//! Error types for the NoiseMap optimizer

use thiserror::Error;

/// Result type alias for NoiseMap operations
pub type Result<T> = std::result::Result<T, NoiseMapError>;

/// Main error type for the NoiseMap crate
#[derive(Error, Debug)]
pub enum NoiseMapError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Every candidate of every generation scored negative infinity.
    #[error("Optimization exhausted: no valid candidate after {generations} generations ({evaluations} evaluations)")]
    OptimizationExhausted { generations: usize, evaluations: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("All prediction strategies unavailable: {0}")]
    StrategiesExhausted(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<polars::error::PolarsError> for NoiseMapError {
    fn from(err: polars::error::PolarsError) -> Self {
        NoiseMapError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for NoiseMapError {
    fn from(err: serde_json::Error) -> Self {
        NoiseMapError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for NoiseMapError {
    fn from(err: bincode::Error) -> Self {
        NoiseMapError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for NoiseMapError {
    fn from(err: ndarray::ShapeError) -> Self {
        NoiseMapError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NoiseMapError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NoiseMapError = io_err.into();
        assert!(matches!(err, NoiseMapError::IoError(_)));
    }

    #[test]
    fn test_exhausted_display() {
        let err = NoiseMapError::OptimizationExhausted { generations: 4, evaluations: 40 };
        assert!(err.to_string().contains("4 generations"));
    }
}
