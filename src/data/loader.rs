//! Dataset directory loading and writing (CSV via polars)
//!
//! Layout, one file per array, co-indexed by row:
//! - `features.csv`: header row of feature names, one numeric column per feature
//! - `noise_level.csv`: one numeric column (dB)
//! - `noise_source.csv`: one column of source names or class indices
//! - `health_impact.csv`: one column of tier indices (0..=3) or tier names
//! - `source_classes.json` (optional): ordered class names for index-encoded sources

use crate::error::{NoiseMapError, Result};
use super::dataset::NoiseDataset;
use super::labels::{HealthImpact, LabelEncoder};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub const FEATURES_FILE: &str = "features.csv";
pub const NOISE_LEVEL_FILE: &str = "noise_level.csv";
pub const NOISE_SOURCE_FILE: &str = "noise_source.csv";
pub const HEALTH_IMPACT_FILE: &str = "health_impact.csv";
pub const SOURCE_CLASSES_FILE: &str = "source_classes.json";

/// Loader for the on-disk dataset layout
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    infer_schema_length: usize,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self { infer_schema_length: 100 }
    }

    /// Set how many rows polars reads to infer column types
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Load a CSV file into a DataFrame
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| NoiseMapError::DataError(format!("{}: {}", path.display(), e)))?
            .finish()
            .map_err(|e| NoiseMapError::DataError(format!("{}: {}", path.display(), e)))?;
        Ok(df)
    }

    /// Load a numeric feature matrix and its column names
    pub fn load_feature_matrix(&self, path: &Path) -> Result<(Array2<f64>, Vec<String>)> {
        let df = self.load_csv(path)?;
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let (n_rows, n_cols) = (df.height(), df.width());

        let mut matrix = Array2::zeros((n_rows, n_cols));
        for (j, column) in df.get_columns().iter().enumerate() {
            let values = column_to_f64(column)?;
            for (i, v) in values.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        Ok((matrix, names))
    }

    /// Load a full dataset directory
    pub fn load_dir(&self, dir: &Path) -> Result<NoiseDataset> {
        let start = Instant::now();
        let (features, names) = self.load_feature_matrix(&dir.join(FEATURES_FILE))?;

        let level = single_column(&self.load_csv(&dir.join(NOISE_LEVEL_FILE))?, NOISE_LEVEL_FILE)?;
        let noise_level = Array1::from_vec(column_to_f64(&level)?);

        let source = single_column(&self.load_csv(&dir.join(NOISE_SOURCE_FILE))?, NOISE_SOURCE_FILE)?;
        let (noise_source, source_classes) = if source.dtype() == &DataType::String {
            let labels = column_to_strings(&source)?;
            let mut encoder = LabelEncoder::new();
            let encoded = encoder.fit_transform(&labels)?;
            (encoded, encoder.classes().to_vec())
        } else {
            let encoded = column_to_f64(&source)?;
            let classes = self.load_source_classes(dir, &encoded)?;
            (encoded, classes)
        };

        let health = single_column(&self.load_csv(&dir.join(HEALTH_IMPACT_FILE))?, HEALTH_IMPACT_FILE)?;
        let health_impact = if health.dtype() == &DataType::String {
            column_to_strings(&health)?
                .iter()
                .map(|name| {
                    HealthImpact::parse(name)
                        .map(|t| t.index() as f64)
                        .ok_or_else(|| NoiseMapError::DataError(format!("Unknown health impact tier: {}", name)))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            column_to_f64(&health)?
        };

        let dataset = NoiseDataset::new(
            features,
            names,
            noise_level,
            Array1::from_vec(noise_source),
            Array1::from_vec(health_impact),
            source_classes,
        )?;

        info!(
            dir = %dir.display(),
            samples = dataset.n_samples(),
            features = dataset.n_features(),
            sources = dataset.source_classes().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );
        Ok(dataset)
    }

    fn load_source_classes(&self, dir: &Path, encoded: &[f64]) -> Result<Vec<String>> {
        let path = dir.join(SOURCE_CLASSES_FILE);
        if path.exists() {
            let file = File::open(&path)?;
            let classes: Vec<String> = serde_json::from_reader(std::io::BufReader::new(file))?;
            return Ok(classes);
        }
        let n_classes = encoded.iter().fold(0.0f64, |m, &v| m.max(v)) as usize + 1;
        debug!(n_classes, "No source class file, generating class names");
        Ok((0..n_classes).map(|i| format!("source_{}", i)).collect())
    }

    /// Write a dataset in the directory layout read by [`DatasetLoader::load_dir`]
    pub fn write_dir(&self, dataset: &NoiseDataset, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let columns: Vec<Column> = dataset
            .feature_names()
            .iter()
            .enumerate()
            .map(|(j, name)| Column::new(name.as_str().into(), dataset.features().column(j).to_vec()))
            .collect();
        write_csv(DataFrame::new(columns)?, &dir.join(FEATURES_FILE))?;

        let level = Column::new("noise_level".into(), dataset.noise_level().to_vec());
        write_csv(DataFrame::new(vec![level])?, &dir.join(NOISE_LEVEL_FILE))?;

        let sources: Vec<&str> = dataset
            .noise_source()
            .iter()
            .map(|&s| dataset.source_classes()[s as usize].as_str())
            .collect();
        let source = Column::new("noise_source".into(), sources);
        write_csv(DataFrame::new(vec![source])?, &dir.join(NOISE_SOURCE_FILE))?;

        let tiers: Vec<i64> = dataset.health_impact().iter().map(|&t| t as i64).collect();
        let health = Column::new("health_impact".into(), tiers);
        write_csv(DataFrame::new(vec![health])?, &dir.join(HEALTH_IMPACT_FILE))?;

        let file = File::create(dir.join(SOURCE_CLASSES_FILE))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), dataset.source_classes())?;

        info!(dir = %dir.display(), samples = dataset.n_samples(), "Wrote dataset");
        Ok(())
    }
}

/// Paths of the dataset files inside `dir`
pub fn dataset_files(dir: &Path) -> Vec<PathBuf> {
    [FEATURES_FILE, NOISE_LEVEL_FILE, NOISE_SOURCE_FILE, HEALTH_IMPACT_FILE]
        .iter()
        .map(|f| dir.join(f))
        .collect()
}

fn write_csv(mut df: DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

fn single_column(df: &DataFrame, file: &str) -> Result<Column> {
    if df.width() != 1 {
        return Err(NoiseMapError::DataError(format!(
            "{} must have exactly one column, found {}",
            file,
            df.width()
        )));
    }
    Ok(df.get_columns()[0].clone())
}

fn column_to_f64(column: &Column) -> Result<Vec<f64>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                NoiseMapError::DataError(format!("Missing value in column '{}' at row {}", column.name(), i))
            })
        })
        .collect()
}

fn column_to_strings(column: &Column) -> Result<Vec<String>> {
    let ca = column.as_materialized_series().str()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string).ok_or_else(|| {
                NoiseMapError::DataError(format!("Missing value in column '{}' at row {}", column.name(), i))
            })
        })
        .collect()
}
