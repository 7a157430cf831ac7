//! Label vocabularies: health-impact tiers and noise-source encoding

use crate::error::{NoiseMapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound (exclusive) of the Low tier, in dB
pub const LOW_THRESHOLD_DB: f64 = 55.0;
/// Upper bound (exclusive) of the Moderate tier, in dB
pub const MODERATE_THRESHOLD_DB: f64 = 70.0;
/// Upper bound (exclusive) of the High tier, in dB
pub const HIGH_THRESHOLD_DB: f64 = 85.0;

/// Ordinal health-impact tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthImpact {
    Low = 0,
    Moderate = 1,
    High = 2,
    Severe = 3,
}

impl HealthImpact {
    pub const ALL: [HealthImpact; 4] =
        [HealthImpact::Low, HealthImpact::Moderate, HealthImpact::High, HealthImpact::Severe];

    /// Tier for a noise level in decibels
    pub fn from_db(db: f64) -> Self {
        if db < LOW_THRESHOLD_DB {
            HealthImpact::Low
        } else if db < MODERATE_THRESHOLD_DB {
            HealthImpact::Moderate
        } else if db < HIGH_THRESHOLD_DB {
            HealthImpact::High
        } else {
            HealthImpact::Severe
        }
    }

    /// Tier for a class index as stored in a label vector
    pub fn from_index(value: f64) -> Option<Self> {
        if value.fract() != 0.0 {
            return None;
        }
        match value as i64 {
            0 => Some(HealthImpact::Low),
            1 => Some(HealthImpact::Moderate),
            2 => Some(HealthImpact::High),
            3 => Some(HealthImpact::Severe),
            _ => None,
        }
    }

    /// Parse a tier name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Some(HealthImpact::Low),
            "moderate" => Some(HealthImpact::Moderate),
            "high" => Some(HealthImpact::High),
            "severe" => Some(HealthImpact::Severe),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthImpact::Low => "Low",
            HealthImpact::Moderate => "Moderate",
            HealthImpact::High => "High",
            HealthImpact::Severe => "Severe",
        }
    }
}

impl std::fmt::Display for HealthImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps noise-source names to class indices (sorted, like sklearn's LabelEncoder)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder over a fixed, already ordered vocabulary
    pub fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Learn the sorted vocabulary of `labels`
    pub fn fit<S: AsRef<str>>(&mut self, labels: &[S]) -> &mut Self {
        let unique: BTreeSet<&str> = labels.iter().map(|s| s.as_ref()).collect();
        self.classes = unique.into_iter().map(str::to_string).collect();
        self
    }

    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<f64>> {
        if self.classes.is_empty() {
            return Err(NoiseMapError::ModelNotFitted);
        }
        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search_by(|c| c.as_str().cmp(label.as_ref()))
                    .or_else(|_| {
                        // vocabularies given via from_classes need not be sorted
                        self.classes.iter().position(|c| c == label.as_ref()).ok_or(())
                    })
                    .map(|i| i as f64)
                    .map_err(|_| NoiseMapError::DataError(format!("Unknown noise source: {}", label.as_ref())))
            })
            .collect()
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<Vec<f64>> {
        self.fit(labels);
        self.transform(labels)
    }

    /// Class name for an index, if known
    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(HealthImpact::from_db(30.0), HealthImpact::Low);
        assert_eq!(HealthImpact::from_db(54.99), HealthImpact::Low);
        assert_eq!(HealthImpact::from_db(55.0), HealthImpact::Moderate);
        assert_eq!(HealthImpact::from_db(70.0), HealthImpact::High);
        assert_eq!(HealthImpact::from_db(85.0), HealthImpact::Severe);
        assert_eq!(HealthImpact::from_db(120.0), HealthImpact::Severe);
    }

    #[test]
    fn test_tier_index_roundtrip() {
        for tier in HealthImpact::ALL {
            assert_eq!(HealthImpact::from_index(tier.index() as f64), Some(tier));
        }
        assert_eq!(HealthImpact::from_index(1.5), None);
        assert_eq!(HealthImpact::parse("SEVERE"), Some(HealthImpact::Severe));
    }

    #[test]
    fn test_label_encoder_sorted() {
        let mut enc = LabelEncoder::new();
        let encoded = enc.fit_transform(&["traffic", "human", "traffic", "nature"]).unwrap();
        assert_eq!(enc.classes(), &["human", "nature", "traffic"]);
        assert_eq!(encoded, vec![2.0, 0.0, 2.0, 1.0]);
        assert_eq!(enc.inverse(1), Some("nature"));
        assert!(enc.transform(&["siren"]).is_err());
    }
}
