use super::tree::{normalize, RegressionTree, SplitStats, TreeParams};
use ndarray::{Array1, Array2, ArrayView1};

/// Tree growth flavour of the gradient booster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Depth-limited, every node split while gain is positive.
    LevelWise,
    /// Best-first, bounded by a leaf count.
    LeafWise,
}

#[derive(Debug, Clone, Copy)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub growth: Growth,
    pub tree: TreeParams,
}

impl BoostingConfig {
    /// Depth 6, eta 0.3, L2 leaf penalty 1.
    pub fn level_wise() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            growth: Growth::LevelWise,
            tree: TreeParams {
                max_depth: Some(6),
                min_child_weight: 1.0,
                lambda: 1.0,
                ..TreeParams::default()
            },
        }
    }

    /// 31 leaves, rate 0.1, at least 20 samples per leaf.
    pub fn leaf_wise() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            growth: Growth::LeafWise,
            tree: TreeParams {
                max_leaves: Some(31),
                min_samples_leaf: 20,
                min_samples_split: 40,
                min_child_weight: 1e-3,
                ..TreeParams::default()
            },
        }
    }
}

/// Squared-loss gradient boosting started from the label mean.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    config: BoostingConfig,
    base_score: f64,
    trees: Vec<RegressionTree>,
    stats: SplitStats,
}

impl GradientBoosting {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees: Vec::new(),
            stats: SplitStats::default(),
        }
    }

    pub fn growth(&self) -> Growth {
        self.config.growth
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), String> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(format!(
                "boosting fit needs matching non-empty inputs, got {} rows and {} labels",
                x.nrows(),
                y.len()
            ));
        }
        let n = x.nrows();
        self.base_score = y.mean().unwrap_or(0.0);
        self.stats = SplitStats::new(x.ncols());
        self.trees.clear();

        let mut pred = Array1::from_elem(n, self.base_score);
        let hess = Array1::ones(n);
        for _ in 0..self.config.n_estimators {
            let grad = &pred - y;
            let tree = RegressionTree::fit(
                x,
                grad.view(),
                hess.view(),
                (0..n).collect(),
                &self.config.tree,
                &mut self.stats,
            );
            for (p, row) in pred.iter_mut().zip(x.rows()) {
                *p += self.config.learning_rate * tree.predict_one(row);
            }
            self.trees.push(tree);
        }
        if pred.iter().any(|p| !p.is_finite()) {
            return Err("boosting produced non-finite training predictions".to_string());
        }
        Ok(())
    }

    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score
            + self.config.learning_rate
                * self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>()
    }

    /// Level-wise: mean gain per split, normalised. Leaf-wise: raw split counts.
    pub fn feature_importances(&self) -> Vec<f64> {
        match self.config.growth {
            Growth::LevelWise => {
                let avg: Vec<f64> = self
                    .stats
                    .gains
                    .iter()
                    .zip(&self.stats.counts)
                    .map(|(g, c)| if *c > 0 { g / *c as f64 } else { 0.0 })
                    .collect();
                normalize(&avg)
            }
            Growth::LeafWise => self.stats.counts.iter().map(|c| *c as f64).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((200, 2), |(i, j)| {
            if j == 0 {
                i as f64 / 10.0
            } else {
                ((i * 7) % 13) as f64
            }
        });
        let y = x.column(0).mapv(f64::sin);
        (x, y)
    }

    fn mse(model: &GradientBoosting, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        x.rows()
            .into_iter()
            .zip(y)
            .map(|(r, t)| (model.predict_one(r) - t).powi(2))
            .sum::<f64>()
            / y.len() as f64
    }

    #[test]
    fn both_flavours_fit_a_smooth_signal() {
        let (x, y) = data();
        for config in [BoostingConfig::level_wise(), BoostingConfig::leaf_wise()] {
            let mut model = GradientBoosting::new(config);
            model.fit(&x, &y).expect("fit");
            assert!(mse(&model, &x, &y) < 0.1, "{:?}", model.growth());
        }
    }

    #[test]
    fn leaf_wise_importance_counts_splits() {
        let (x, y) = data();
        let mut model = GradientBoosting::new(BoostingConfig::leaf_wise());
        model.fit(&x, &y).expect("fit");
        let imp = model.feature_importances();
        assert!(imp.iter().all(|v| v.fract() == 0.0));
        assert!(imp[0] > 0.0);
    }

    #[test]
    fn level_wise_importance_is_normalised() {
        let (x, y) = data();
        let mut model = GradientBoosting::new(BoostingConfig::level_wise());
        model.fit(&x, &y).expect("fit");
        let sum: f64 = model.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
