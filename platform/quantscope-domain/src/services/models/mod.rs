pub mod boosting;
pub mod forest;
pub mod linear;
pub mod scaler;
pub mod tree;

use boosting::{BoostingConfig, GradientBoosting};
use forest::{ForestConfig, RandomForest};
use linear::LinearRegression;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Linear,
    #[serde(rename = "rf")]
    RandomForest,
    Xgboost,
    #[default]
    Lightgbm,
}

impl ModelKind {
    /// Unrecognised selectors fall back to the leaf-wise booster.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "linear" => Self::Linear,
            "rf" | "random_forest" => Self::RandomForest,
            "xgboost" => Self::Xgboost,
            _ => Self::Lightgbm,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::RandomForest => "rf",
            Self::Xgboost => "xgboost",
            Self::Lightgbm => "lightgbm",
        }
    }
}

/// Fitted (or fittable) regressor of one of the supported kinds.
#[derive(Debug, Clone)]
pub enum Regressor {
    Linear(LinearRegression),
    RandomForest(RandomForest),
    Boosting(GradientBoosting),
}

impl Regressor {
    pub fn for_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Linear => Self::Linear(LinearRegression::new()),
            ModelKind::RandomForest => Self::RandomForest(RandomForest::new(ForestConfig::default())),
            ModelKind::Xgboost => {
                Self::Boosting(GradientBoosting::new(BoostingConfig::level_wise()))
            }
            ModelKind::Lightgbm => Self::Boosting(GradientBoosting::new(BoostingConfig::leaf_wise())),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), String> {
        match self {
            Self::Linear(model) => model.fit(x, y),
            Self::RandomForest(model) => model.fit(x, y),
            Self::Boosting(model) => model.fit(x, y),
        }
    }

    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            Self::Linear(model) => model.predict_one(row),
            Self::RandomForest(model) => model.predict_one(row),
            Self::Boosting(model) => model.predict_one(row),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_one(row)).collect()
    }

    /// `None` for models without a native importance measure.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Self::Linear(_) => None,
            Self::RandomForest(model) => Some(model.feature_importances().to_vec()),
            Self::Boosting(model) => Some(model.feature_importances()),
        }
    }
}
