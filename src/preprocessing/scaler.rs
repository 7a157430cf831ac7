//! Feature scaling

use crate::error::{NoiseMapError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Parameters of one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Standard scaling (z-score): `(x - mean) / std`
///
/// Uses the population standard deviation. Constant columns get scale 1 so
/// they map to zero instead of NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    /// Create a new, unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(NoiseMapError::DataError("Cannot fit scaler on empty data".into()));
        }
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mean = col.mean().unwrap_or(0.0);
                let std = col.std(0.0);
                ScalerParams { center: mean, scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std } }
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Transform a single feature vector
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(row.iter().zip(&self.params).map(|(&v, p)| (v - p.center) / p.scale).collect())
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    pub fn means(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.center).collect()
    }

    pub fn scales(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }

    fn check_width(&self, ncols: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(NoiseMapError::ModelNotFitted);
        }
        if ncols != self.params.len() {
            return Err(NoiseMapError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", ncols),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        let mean = scaled.column(0).mean().unwrap();
        assert!(mean.abs() < 1e-10);
        assert!((scaled.column(0).std(0.0) - 1.0).abs() < 1e-10);
        // constant column
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
        assert_eq!(scaler.scales()[1], 1.0);
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -3.0], [2.5, 7.0], [4.0, 0.5]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (o, r) in x.iter().zip(restored.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_row_matches_batch() {
        let x = array![[1.0, 2.0], [3.0, 5.0], [6.0, 4.0]];
        let mut scaler = StandardScaler::new();
        let batch = scaler.fit_transform(&x).unwrap();
        let row = scaler.transform_row(x.row(1)).unwrap();
        assert_eq!(row, batch.row(1).to_owned());
    }

    #[test]
    fn test_unfitted_and_width_errors() {
        let scaler = StandardScaler::new();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(NoiseMapError::ModelNotFitted)));

        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(NoiseMapError::ShapeError { .. })));
    }
}
