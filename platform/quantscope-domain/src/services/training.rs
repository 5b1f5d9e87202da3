use crate::errors::AnalysisError;
use crate::numeric::{finite_or_zero, pearson};
use crate::services::dataset::Dataset;
use crate::services::models::scaler::StandardScaler;
use crate::services::models::{ModelKind, Regressor};
use ndarray::{s, Array1};
use serde::Serialize;

pub const TRAIN_FRACTION: f64 = 0.8;

/// Goodness-of-fit figures; every field is finite, degraded values are 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrainingMetrics {
    pub train_r2: f64,
    pub test_r2: f64,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub ic: f64,
}

impl TrainingMetrics {
    fn sanitized(self) -> Self {
        Self {
            train_r2: finite_or_zero(self.train_r2),
            test_r2: finite_or_zero(self.test_r2),
            train_rmse: finite_or_zero(self.train_rmse),
            test_rmse: finite_or_zero(self.test_rmse),
            ic: finite_or_zero(self.ic),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub kind: ModelKind,
    pub regressor: Regressor,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    pub metrics: TrainingMetrics,
    /// Column order; empty for models without importances.
    pub feature_importance: Vec<FeatureImportance>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Coefficient of determination. A constant target scores 1.0 on a perfect
/// fit and 0.0 otherwise; fewer than two points is undefined.
pub fn r2_score(actual: &Array1<f64>, predicted: &Array1<f64>) -> Option<f64> {
    if actual.len() < 2 || actual.len() != predicted.len() {
        return None;
    }
    let mean = actual.mean()?;
    let ss_tot = actual.mapv(|a| (a - mean).powi(2)).sum();
    let ss_res = (actual - predicted).mapv(|d| d * d).sum();
    if ss_tot == 0.0 {
        return Some(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Some(1.0 - ss_res / ss_tot)
}

pub fn rmse(actual: &Array1<f64>, predicted: &Array1<f64>) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    Some((actual - predicted).mapv(|d| d * d).mean()?.sqrt())
}

pub fn compute_metrics(
    train_actual: &Array1<f64>,
    train_pred: &Array1<f64>,
    test_actual: &Array1<f64>,
    test_pred: &Array1<f64>,
) -> Result<TrainingMetrics, AnalysisError> {
    if train_pred
        .iter()
        .chain(test_pred.iter())
        .any(|p| !p.is_finite())
    {
        return Err(AnalysisError::MetricComputationFailure(
            "model produced non-finite predictions".to_string(),
        ));
    }
    let rmse_of = |a: &Array1<f64>, p: &Array1<f64>| {
        rmse(a, p).ok_or_else(|| {
            AnalysisError::MetricComputationFailure(format!(
                "rmse needs matching non-empty inputs, got {} and {}",
                a.len(),
                p.len()
            ))
        })
    };
    let ic = if test_actual.len() < 2 {
        0.0
    } else {
        pearson(&test_actual.to_vec(), &test_pred.to_vec()).unwrap_or(0.0)
    };
    Ok(TrainingMetrics {
        train_r2: r2_score(train_actual, train_pred).unwrap_or(f64::NAN),
        test_r2: r2_score(test_actual, test_pred).unwrap_or(f64::NAN),
        train_rmse: rmse_of(train_actual, train_pred)?,
        test_rmse: rmse_of(test_actual, test_pred)?,
        ic,
    }
    .sanitized())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelTrainer {
    kind: ModelKind,
}

impl ModelTrainer {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    /// Fits on the leading 80% of rows and evaluates on the rest.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModel, AnalysisError> {
        let _span = tracing::debug_span!("train_model", kind = self.kind.label()).entered();
        let split = (dataset.len() as f64 * TRAIN_FRACTION) as usize;
        if split == 0 || split >= dataset.len() {
            return Err(AnalysisError::DataInsufficient {
                rows: dataset.len(),
                required: 2,
            });
        }
        let y_train = dataset.y.slice(s![..split]).to_owned();
        let y_test = dataset.y.slice(s![split..]).to_owned();

        let scaler = StandardScaler::fit(dataset.x.slice(s![..split, ..]));
        let x_train = scaler.transform(dataset.x.slice(s![..split, ..]));
        let x_test = scaler.transform(dataset.x.slice(s![split.., ..]));

        let mut regressor = Regressor::for_kind(self.kind);
        regressor.fit(&x_train, &y_train).map_err(|err| {
            AnalysisError::MetricComputationFailure(format!("model fit failed: {err}"))
        })?;

        let train_pred = regressor.predict(&x_train);
        let test_pred = regressor.predict(&x_test);
        let metrics = match compute_metrics(&y_train, &train_pred, &y_test, &test_pred) {
            Ok(metrics) => metrics,
            Err(err) => {
                tracing::warn!(reason = err.reason(), error = %err, "metrics degraded to zero");
                TrainingMetrics::default()
            }
        };

        let feature_importance = regressor
            .feature_importances()
            .map(|values| {
                dataset
                    .feature_names
                    .iter()
                    .zip(values)
                    .map(|(feature, importance)| FeatureImportance {
                        feature: feature.clone(),
                        importance: finite_or_zero(importance),
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            test_r2 = metrics.test_r2,
            ic = metrics.ic,
            "model trained"
        );
        Ok(TrainedModel {
            kind: self.kind,
            regressor,
            scaler,
            feature_names: dataset.feature_names.clone(),
            metrics,
            feature_importance,
            train_rows: x_train.nrows(),
            test_rows: x_test.nrows(),
        })
    }
}

pub fn train(dataset: &Dataset, kind: ModelKind) -> Result<TrainedModel, AnalysisError> {
    ModelTrainer::new(kind).train(dataset)
}
