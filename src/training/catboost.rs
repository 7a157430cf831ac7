//! CatBoost-style gradient boosting on symmetric trees
//!
//! Key features:
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Features quantized once per fit into at most `border_count` borders;
//!   split search runs over per-node gradient histograms
//! - Multiclass softmax: one tree per class per boosting round
//! - Split-gain feature importances

use crate::error::{NoiseMapError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const MAX_DEPTH: usize = 16;
pub const MAX_BORDER_COUNT: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub border_count: usize,
    /// Scale of the noise added to split scores; 0 gives plain greedy splits
    pub random_strength: f64,
    pub random_seed: u64,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 32,
            random_strength: 0.0,
            random_seed: 42,
        }
    }
}

impl CatBoostConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| {
            Err(NoiseMapError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: reason.to_string(),
            })
        };
        if self.iterations == 0 {
            return invalid("iterations", "0".into(), "must be at least 1");
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return invalid("learning_rate", self.learning_rate.to_string(), "must be finite and > 0");
        }
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return invalid("depth", self.depth.to_string(), "must be in 1..=16");
        }
        if !self.l2_leaf_reg.is_finite() || self.l2_leaf_reg < 0.0 {
            return invalid("l2_leaf_reg", self.l2_leaf_reg.to_string(), "must be finite and >= 0");
        }
        if self.border_count == 0 || self.border_count > MAX_BORDER_COUNT {
            return invalid("border_count", self.border_count.to_string(), "must be in 1..=255");
        }
        if !self.random_strength.is_finite() || self.random_strength < 0.0 {
            return invalid("random_strength", self.random_strength.to_string(), "must be finite and >= 0");
        }
        Ok(())
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>, // (feature, border) per level
    leaf_values: Vec<f64>,     // 2^depth leaf values, learning rate applied
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, border) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > border);
        }
        self.leaf_values[idx]
    }
}

/// Quantized feature matrix, column-major bins
struct QuantizedFeatures {
    borders: Vec<Vec<f64>>,
    bins: Vec<Vec<u8>>,
}

impl QuantizedFeatures {
    fn build(x: &Array2<f64>, border_count: usize) -> Self {
        let (borders, bins): (Vec<_>, Vec<_>) = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let column = x.column(j);
                let borders = select_borders(column, border_count);
                let bins = column
                    .iter()
                    .map(|&v| borders.partition_point(|&b| v > b) as u8)
                    .collect();
                (borders, bins)
            })
            .unzip();
        Self { borders, bins }
    }
}

/// Midpoints between quantiles of the distinct column values
fn select_borders(column: ArrayView1<f64>, border_count: usize) -> Vec<f64> {
    let mut values: Vec<f64> = column.to_vec();
    values.sort_by(f64::total_cmp);
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }

    let gaps = values.len() - 1;
    let mut borders: Vec<f64> = if gaps <= border_count {
        (0..gaps).map(|i| (values[i] + values[i + 1]) / 2.0).collect()
    } else {
        (1..=border_count)
            .map(|k| {
                let i = k * gaps / (border_count + 1);
                (values[i] + values[i + 1]) / 2.0
            })
            .collect()
    };
    borders.dedup();
    borders
}

fn leaf_score(g: f64, h: f64, l2: f64) -> f64 {
    let denom = h + l2;
    if denom > 0.0 { g * g / denom } else { 0.0 }
}

fn leaf_value(g: f64, h: f64, l2: f64) -> f64 {
    let denom = h + l2;
    if denom > 0.0 { -g / denom } else { 0.0 }
}

/// Grows one symmetric tree; returns it with (feature, gain) per chosen split.
fn build_symmetric_tree(
    data: &QuantizedFeatures,
    gradients: &[f64],
    hessians: &[f64],
    config: &CatBoostConfig,
    noise_scale: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> (SymmetricTree, Vec<(usize, f64)>) {
    let n = gradients.len();
    let l2 = config.l2_leaf_reg;
    let mut node = vec![0usize; n];
    let mut splits = Vec::with_capacity(config.depth);
    let mut split_gains = Vec::with_capacity(config.depth);

    for level in 0..config.depth {
        let n_nodes = 1usize << level;

        // Best border per feature, scored across every node of the level
        let candidates: Vec<Option<(usize, usize, f64)>> = (0..data.bins.len())
            .into_par_iter()
            .map(|feat| {
                let n_borders = data.borders[feat].len();
                if n_borders == 0 {
                    return None;
                }
                let n_bins = n_borders + 1;
                let mut hist = vec![(0.0f64, 0.0f64); n_nodes * n_bins];
                for (i, &bin) in data.bins[feat].iter().enumerate() {
                    let cell = &mut hist[node[i] * n_bins + bin as usize];
                    cell.0 += gradients[i];
                    cell.1 += hessians[i];
                }

                let totals: Vec<(f64, f64)> = hist
                    .chunks(n_bins)
                    .map(|c| c.iter().fold((0.0, 0.0), |(g, h), &(cg, ch)| (g + cg, h + ch)))
                    .collect();
                let parent: f64 = totals.iter().map(|&(g, h)| leaf_score(g, h, l2)).sum();

                let mut left = vec![(0.0f64, 0.0f64); n_nodes];
                let mut best: Option<(usize, f64)> = None;
                for k in 0..n_borders {
                    let mut score = 0.0;
                    for (nd, slot) in left.iter_mut().enumerate() {
                        let (cg, ch) = hist[nd * n_bins + k];
                        slot.0 += cg;
                        slot.1 += ch;
                        let (tg, th) = totals[nd];
                        score += leaf_score(slot.0, slot.1, l2) + leaf_score(tg - slot.0, th - slot.1, l2);
                    }
                    let gain = score - parent;
                    if best.map_or(true, |(_, g)| gain > g) {
                        best = Some((k, gain));
                    }
                }
                best.map(|(k, gain)| (feat, k, gain))
            })
            .collect();

        // Serial pick keeps ties on the lowest feature index
        let mut best: Option<(usize, usize, f64, f64)> = None;
        for (feat, k, gain) in candidates.into_iter().flatten() {
            let noisy = if noise_scale > 0.0 {
                gain + noise_scale * rng.sample::<f64, _>(StandardNormal)
            } else {
                gain
            };
            if best.map_or(true, |(_, _, _, b)| noisy > b) {
                best = Some((feat, k, gain, noisy));
            }
        }

        match best {
            Some((feat, k, gain, _)) if gain > 1e-12 => {
                let bins = &data.bins[feat];
                for (i, nd) in node.iter_mut().enumerate() {
                    *nd = *nd * 2 + usize::from(bins[i] as usize > k);
                }
                splits.push((feat, data.borders[feat][k]));
                split_gains.push((feat, gain));
            }
            _ => break,
        }
    }

    let n_leaves = 1usize << splits.len();
    let mut sums = vec![(0.0f64, 0.0f64); n_leaves];
    for i in 0..n {
        sums[node[i]].0 += gradients[i];
        sums[node[i]].1 += hessians[i];
    }
    let leaf_values = sums
        .into_iter()
        .map(|(g, h)| config.learning_rate * leaf_value(g, h, l2))
        .collect();

    (SymmetricTree { splits, leaf_values }, split_gains)
}

fn check_inputs(x: &Array2<f64>, n_targets: usize) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(NoiseMapError::TrainingError("Empty dataset".into()));
    }
    if x.nrows() != n_targets {
        return Err(NoiseMapError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", n_targets),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(NoiseMapError::TrainingError("Non-finite feature value".into()));
    }
    Ok(())
}

fn check_predict_shape(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(NoiseMapError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

fn normalized_importances(raw: &[f64]) -> Array1<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        Array1::from_iter(raw.iter().map(|v| v / total))
    } else {
        Array1::zeros(raw.len())
    }
}

/// Noise scale for split scores; shrinks as boosting proceeds
fn split_noise_scale(config: &CatBoostConfig, gradients: &[f64], round: usize) -> f64 {
    if config.random_strength == 0.0 {
        return 0.0;
    }
    let mean_sq = gradients.iter().map(|g| g * g).sum::<f64>() / gradients.len() as f64;
    let decay = 1.0 - round as f64 / config.iterations as f64;
    config.random_strength * mean_sq.sqrt() * decay
}

// ============ CatBoost Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
    importances: Vec<f64>,
    is_fitted: bool,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
            importances: Vec::new(),
            is_fitted: false,
        }
    }

    /// Squared-loss boosting from the target mean
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        check_inputs(x, y.len())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(NoiseMapError::TrainingError("Non-finite target value".into()));
        }

        let n = x.nrows();
        let data = QuantizedFeatures::build(x, self.config.border_count);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_seed);

        self.trees.clear();
        self.n_features = x.ncols();
        self.importances = vec![0.0; x.ncols()];
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = vec![self.base_prediction; n];
        let hessians = vec![1.0; n];

        for round in 0..self.config.iterations {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let noise = split_noise_scale(&self.config, &gradients, round);
            let (tree, gains) = build_symmetric_tree(&data, &gradients, &hessians, &self.config, noise, &mut rng);

            for (i, p) in predictions.iter_mut().enumerate() {
                *p += tree.predict(x.row(i));
            }
            for (feat, gain) in gains {
                self.importances[feat] += gain;
            }
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(NoiseMapError::ModelNotFitted);
        }
        check_predict_shape(x, self.n_features)?;
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            self.base_prediction + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
        })))
    }

    /// Split-gain importances, summing to 1
    pub fn feature_importances(&self) -> Array1<f64> {
        normalized_importances(&self.importances)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

// ============ CatBoost Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostClassifier {
    pub config: CatBoostConfig,
    /// One tree per class per round, round-major
    trees: Vec<SymmetricTree>,
    base_scores: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
    importances: Vec<f64>,
    is_fitted: bool,
}

impl CatBoostClassifier {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
            is_fitted: false,
        }
    }

    /// Softmax boosting; `y` holds class labels (any finite values)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        check_inputs(x, y.len())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(NoiseMapError::TrainingError("Non-finite class label".into()));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        let n = x.nrows();
        let k = classes.len();
        let targets: Vec<usize> = y
            .iter()
            .map(|v| classes.partition_point(|c| c < v))
            .collect();

        self.trees.clear();
        self.classes = classes;
        self.n_features = x.ncols();
        self.importances = vec![0.0; x.ncols()];

        let mut counts = vec![0usize; k];
        for &t in &targets {
            counts[t] += 1;
        }
        self.base_scores = counts.iter().map(|&c| (c as f64 / n as f64).ln()).collect();

        if k > 1 {
            let data = QuantizedFeatures::build(x, self.config.border_count);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_seed);
            let mut raw = Array2::from_shape_fn((n, k), |(_, c)| self.base_scores[c]);

            for round in 0..self.config.iterations {
                let probs = softmax_rows(&raw);
                for c in 0..k {
                    let gradients: Vec<f64> = (0..n)
                        .map(|i| probs[[i, c]] - if targets[i] == c { 1.0 } else { 0.0 })
                        .collect();
                    let hessians: Vec<f64> =
                        (0..n).map(|i| (probs[[i, c]] * (1.0 - probs[[i, c]])).max(1e-16)).collect();

                    let noise = split_noise_scale(&self.config, &gradients, round);
                    let (tree, gains) =
                        build_symmetric_tree(&data, &gradients, &hessians, &self.config, noise, &mut rng);
                    for i in 0..n {
                        raw[[i, c]] += tree.predict(x.row(i));
                    }
                    for (feat, gain) in gains {
                        self.importances[feat] += gain;
                    }
                    self.trees.push(tree);
                }
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Most probable class label per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(Array1::from_iter(proba.rows().into_iter().map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |acc, (c, &p)| if p > acc.1 { (c, p) } else { acc });
            self.classes[best.0]
        })))
    }

    /// `n × K` class probabilities, columns ordered like [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(NoiseMapError::ModelNotFitted);
        }
        check_predict_shape(x, self.n_features)?;
        let k = self.classes.len();
        let mut raw = Array2::from_shape_fn((x.nrows(), k), |(_, c)| self.base_scores[c]);
        if k > 1 {
            for (i, row) in x.rows().into_iter().enumerate() {
                for (t, tree) in self.trees.iter().enumerate() {
                    raw[[i, t % k]] += tree.predict(row);
                }
            }
        }
        Ok(softmax_rows(&raw))
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Split-gain importances, summing to 1
    pub fn feature_importances(&self) -> Array1<f64> {
        normalized_importances(&self.importances)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 3), |(i, j)| match j {
            0 => (i % 10) as f64,
            1 => ((i * 3) % 7) as f64,
            _ => ((i * 7) % 11) as f64,
        });
        let y = Array1::from_iter((0..100).map(|i| 3.0 * x[[i, 0]] + 0.5 * x[[i, 1]] + 1.0));
        (x, y)
    }

    fn make_multiclass_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 31) % 17) as f64 });
        let y = Array1::from_iter((0..120).map(|i| (i / 40) as f64 * 10.0));
        (x, y)
    }

    fn small_config() -> CatBoostConfig {
        CatBoostConfig { iterations: 30, depth: 3, learning_rate: 0.3, ..Default::default() }
    }

    #[test]
    fn test_catboost_regressor() {
        let (x, y) = make_regression_data();
        let mut model = CatBoostRegressor::new(small_config());
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 100);

        let mse = preds.iter().zip(y.iter()).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / 100.0;
        let var = y.var(0.0);
        assert!(mse < var * 0.2, "mse {} vs variance {}", mse, var);
    }

    #[test]
    fn test_catboost_multiclass() {
        let (x, y) = make_multiclass_data();
        let mut model = CatBoostClassifier::new(small_config());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[0.0, 10.0, 20.0]);

        let preds = model.predict(&x).unwrap();
        let acc = preds.iter().zip(y.iter()).filter(|(&p, &t)| p == t).count() as f64 / 120.0;
        assert!(acc > 0.9, "Accuracy too low: {}", acc);
    }

    #[test]
    fn test_catboost_predict_proba() {
        let (x, y) = make_multiclass_data();
        let mut model = CatBoostClassifier::new(CatBoostConfig { iterations: 5, ..small_config() });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (120, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_catboost_symmetric_tree() {
        let (x, y) = make_regression_data();
        let mut model = CatBoostRegressor::new(CatBoostConfig { iterations: 5, depth: 3, ..Default::default() });
        model.fit(&x, &y).unwrap();
        for tree in &model.trees {
            assert!(tree.splits.len() <= 3);
            assert_eq!(tree.leaf_values.len(), 1 << tree.splits.len());
        }
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_elem(10, 3.0);
        let mut model = CatBoostClassifier::new(small_config());
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|&p| p == 3.0));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = make_regression_data();
        let mut model = CatBoostRegressor::new(small_config());
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        // x0 carries most of the signal
        assert!(imp[0] > imp[2]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (x, y) = make_regression_data();
        for config in [
            CatBoostConfig { learning_rate: 0.0, ..Default::default() },
            CatBoostConfig { depth: 0, ..Default::default() },
            CatBoostConfig { depth: 17, ..Default::default() },
            CatBoostConfig { iterations: 0, ..Default::default() },
            CatBoostConfig { l2_leaf_reg: f64::NAN, ..Default::default() },
        ] {
            let mut model = CatBoostRegressor::new(config);
            assert!(matches!(model.fit(&x, &y), Err(NoiseMapError::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let (mut x, y) = make_regression_data();
        x[[3, 1]] = f64::INFINITY;
        let mut model = CatBoostRegressor::new(small_config());
        assert!(matches!(model.fit(&x, &y), Err(NoiseMapError::TrainingError(_))));
    }

    #[test]
    fn test_random_strength_is_seeded() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { random_strength: 1.0, ..small_config() };
        let mut a = CatBoostRegressor::new(config.clone());
        let mut b = CatBoostRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = CatBoostRegressor::new(CatBoostConfig::default());
        assert!(matches!(model.predict(&Array2::zeros((1, 3))), Err(NoiseMapError::ModelNotFitted)));
    }
}
