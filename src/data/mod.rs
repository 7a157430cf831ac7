//! Noise datasets: co-indexed features and labels, label vocabularies, CSV I/O

mod dataset;
mod labels;
mod loader;

pub use dataset::NoiseDataset;
pub use labels::{
    HealthImpact, LabelEncoder, HIGH_THRESHOLD_DB, LOW_THRESHOLD_DB, MODERATE_THRESHOLD_DB,
};
pub use loader::{
    dataset_files, DatasetLoader, FEATURES_FILE, HEALTH_IMPACT_FILE, NOISE_LEVEL_FILE,
    NOISE_SOURCE_FILE, SOURCE_CLASSES_FILE,
};

/// Health-impact tier for a noise level in dB
pub fn health_tier_from_db(db: f64) -> HealthImpact {
    HealthImpact::from_db(db)
}
