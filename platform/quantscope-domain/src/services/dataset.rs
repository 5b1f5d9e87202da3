use crate::errors::AnalysisError;
use crate::numeric::finite;
use crate::services::factors::FactorPanel;
use crate::value_objects::price_bar::PriceSeries;
use chrono::NaiveDate;
use ndarray::{Array1, Array2};

pub const LABEL_HORIZON: usize = 5;
pub const MIN_TRAINING_ROWS: usize = 100;

/// Columns that never become model inputs even if a panel carries them.
pub const EXCLUDED_COLUMNS: &[&str] = &[
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "daily_return",
    "gap",
    "target",
];

/// Complete rows only: every feature and the label are present and finite.
///
/// `x` is rows by `feature_names`; `y` and `dates` share its row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub dates: Vec<NaiveDate>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// `close[i + h] / close[i] - 1`; the last `h` rows have no label.
pub fn forward_returns(closes: &[f64], horizon: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            let future = closes.get(i + horizon)?;
            finite(future / closes[i] - 1.0)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureLabelBuilder {
    horizon: usize,
    min_rows: usize,
}

impl Default for FeatureLabelBuilder {
    fn default() -> Self {
        Self {
            horizon: LABEL_HORIZON,
            min_rows: MIN_TRAINING_ROWS,
        }
    }
}

impl FeatureLabelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &self,
        series: &PriceSeries,
        panel: &FactorPanel,
    ) -> Result<Dataset, AnalysisError> {
        let _span = tracing::debug_span!("build_features", symbol = %series.symbol()).entered();
        if series.len() != panel.rows() {
            return Err(AnalysisError::MisalignedInput {
                series_rows: series.len(),
                panel_rows: panel.rows(),
            });
        }
        let feature_columns: Vec<_> = panel
            .columns()
            .iter()
            .filter(|c| !EXCLUDED_COLUMNS.contains(&c.name.as_str()))
            .collect();
        let labels = forward_returns(&series.closes(), self.horizon);
        let dates = series.dates();
        let n = series.len();
        let n_features = feature_columns.len();

        let mut flat = Vec::with_capacity(n * n_features);
        let mut kept_labels = Vec::new();
        let mut kept_dates = Vec::new();
        for i in 0..n {
            let Some(label) = labels[i] else {
                continue;
            };
            let row: Option<Vec<f64>> = feature_columns
                .iter()
                .map(|c| c.values[i].and_then(finite))
                .collect();
            if let Some(row) = row {
                flat.extend(row);
                kept_labels.push(label);
                kept_dates.push(dates[i]);
            }
        }
        let x = Array2::from_shape_vec((kept_labels.len(), n_features), flat).map_err(|err| {
            AnalysisError::MetricComputationFailure(format!("feature matrix shape: {err}"))
        })?;
        let dataset = Dataset {
            feature_names: feature_columns.iter().map(|c| c.name.clone()).collect(),
            x,
            y: Array1::from(kept_labels),
            dates: kept_dates,
        };

        tracing::debug!(
            input_rows = n,
            kept_rows = dataset.len(),
            features = dataset.n_features(),
            "feature/label rows aligned"
        );
        if dataset.len() < self.min_rows {
            return Err(AnalysisError::DataInsufficient {
                rows: dataset.len(),
                required: self.min_rows,
            });
        }
        Ok(dataset)
    }
}

pub fn build_features(series: &PriceSeries, panel: &FactorPanel) -> Result<Dataset, AnalysisError> {
    FeatureLabelBuilder::new().build(series, panel)
}
