use crate::analysis::{fetch_series, AnalysisSettings};
use crate::config::Config;
use quantscope_domain::repositories::market_data::PriceSupplier;
use quantscope_domain::services::dataset::{LABEL_HORIZON, MIN_TRAINING_ROWS};
use quantscope_domain::services::ohlcv::DataQualityReport;
use serde::Serialize;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone, Serialize)]
pub struct SymbolValidation {
    pub symbol: String,
    pub analysed_bars: usize,
    /// Enough bars for the model stage once labels are built.
    pub trainable: bool,
    pub data_quality: Option<DataQualityReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub period: &'static str,
    pub warmup_bars: usize,
    pub model_kind: &'static str,
    pub signal: String,
    pub symbols: Vec<SymbolValidation>,
    pub strict: bool,
}

/// Resolves the config and checks the data of every symbol. Under `strict`, any
/// fetch failure or data-quality finding is an error.
pub fn validate(
    config: &Config,
    strict: bool,
    supplier: &dyn PriceSupplier,
) -> Result<ValidationReport, String> {
    let _span = info_span!("validate", strict, run_id = %config.run.run_id).entered();
    if config.run.symbols.is_empty() {
        return Err("run.symbols must list at least one symbol".to_string());
    }
    let settings = AnalysisSettings::from_config(config)?;

    let stage_start = Instant::now();
    let mut symbols = Vec::with_capacity(config.run.symbols.len());
    for symbol in &config.run.symbols {
        let entry = match fetch_series(symbol, &settings, supplier) {
            Ok((series, quality)) => SymbolValidation {
                symbol: symbol.clone(),
                analysed_bars: series.len(),
                trainable: series.len() >= MIN_TRAINING_ROWS + LABEL_HORIZON,
                data_quality: Some(quality),
                error: None,
            },
            Err(err) => SymbolValidation {
                symbol: symbol.clone(),
                analysed_bars: 0,
                trainable: false,
                data_quality: None,
                error: Some(format!("{err} ({})", err.reason())),
            },
        };
        if let Some(quality) = &entry.data_quality {
            metrics::gauge!("quantscope.validate.duplicates", "symbol" => symbol.clone())
                .set(quality.duplicates as f64);
            metrics::gauge!("quantscope.validate.invalid_bars", "symbol" => symbol.clone())
                .set(quality.invalid_bars as f64);
        }
        symbols.push(entry);
    }
    metrics::histogram!("quantscope.validate.fetch_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    if strict {
        let failing: Vec<&str> = symbols
            .iter()
            .filter(|s| s.error.is_some() || s.data_quality.as_ref().is_some_and(|q| !q.is_clean()))
            .map(|s| s.symbol.as_str())
            .collect();
        if !failing.is_empty() {
            return Err(format!(
                "strict validation failed for: {}",
                failing.join(", ")
            ));
        }
    }

    Ok(ValidationReport {
        run_id: config.run.run_id.clone(),
        period: settings.period.label(),
        warmup_bars: settings.warmup_bars,
        model_kind: settings.model_kind.label(),
        signal: settings.signal,
        symbols,
        strict,
    })
}
