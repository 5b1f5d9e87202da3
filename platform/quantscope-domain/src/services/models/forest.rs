use super::tree::{normalize, RegressionTree, SplitStats, TreeParams};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
    pub tree: TreeParams,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            tree: TreeParams::default(),
        }
    }
}

/// Bagged CART regressors; fully grown, every feature considered per split.
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), String> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(format!(
                "forest fit needs matching non-empty inputs, got {} rows and {} labels",
                x.nrows(),
                y.len()
            ));
        }
        let n = x.nrows();
        let n_features = x.ncols();
        let grad = -y;
        let hess = Array1::ones(n);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        self.trees.clear();
        let mut importance_sum = vec![0.0; n_features];
        for _ in 0..self.config.n_trees.max(1) {
            let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut stats = SplitStats::new(n_features);
            let tree = RegressionTree::fit(
                x,
                grad.view(),
                hess.view(),
                samples,
                &self.config.tree,
                &mut stats,
            );
            for (acc, v) in importance_sum.iter_mut().zip(normalize(&stats.gains)) {
                *acc += v;
            }
            self.trees.push(tree);
        }
        self.importances = normalize(&importance_sum);
        Ok(())
    }

    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Impurity-decrease importances, normalised to sum to one.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}
