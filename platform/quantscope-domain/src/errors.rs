use thiserror::Error;

/// Structured pipeline outcomes that have no safe degraded value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("insufficient data: {rows} usable rows, need at least {required}")]
    DataInsufficient { rows: usize, required: usize },

    #[error("no valid backtest data: {0}")]
    NoValidData(String),

    #[error("no price data available for {symbol}")]
    UpstreamDataUnavailable { symbol: String },

    #[error("metric computation failed: {0}")]
    MetricComputationFailure(String),

    #[error("unknown factor column: {0}")]
    UnknownFactor(String),

    #[error("factor panel has {panel_rows} rows but the price series has {series_rows}")]
    MisalignedInput {
        series_rows: usize,
        panel_rows: usize,
    },
}

impl AnalysisError {
    /// Machine-readable code reported alongside the message.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DataInsufficient { .. } => "data_insufficient",
            Self::NoValidData(_) => "no_valid_data",
            Self::UpstreamDataUnavailable { .. } => "upstream_data_unavailable",
            Self::MetricComputationFailure(_) => "metric_computation_failure",
            Self::UnknownFactor(_) => "unknown_factor",
            Self::MisalignedInput { .. } => "misaligned_input",
        }
    }
}
