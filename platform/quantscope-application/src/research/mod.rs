//! Single-stage use cases behind the `factors`, `train` and `backtest`
//! subcommands. Each fetches and strips the series exactly like a full
//! analysis, then runs one pipeline stage.

use crate::analysis::{fetch_series, AnalysisSettings, ModelSummary};
use quantscope_domain::errors::AnalysisError;
use quantscope_domain::repositories::artifacts::ArtifactWriter;
use quantscope_domain::repositories::market_data::PriceSupplier;
use quantscope_domain::services::backtest::{BacktestReport, SignalBacktester};
use quantscope_domain::services::dataset::FeatureLabelBuilder;
use quantscope_domain::services::factors::FactorEngine;
use quantscope_domain::services::scoring::FactorSnapshot;
use quantscope_domain::services::training::ModelTrainer;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info_span;

fn describe(symbol: &str, err: &AnalysisError) -> String {
    format!("{symbol}: {err} ({})", err.reason())
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorTableResult {
    pub symbol: String,
    pub rows: usize,
    pub factor_names: Vec<String>,
    pub missing_before_fill: usize,
    pub latest: FactorSnapshot,
    pub csv_path: Option<PathBuf>,
}

pub fn compute_factor_table(
    symbol: &str,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
    csv_path: Option<&Path>,
    artifacts: &dyn ArtifactWriter,
) -> Result<FactorTableResult, String> {
    let _span = info_span!("compute_factor_table", symbol = %symbol).entered();
    let (series, _quality) =
        fetch_series(symbol, settings, supplier).map_err(|err| describe(symbol, &err))?;

    let stage_start = Instant::now();
    let engine = FactorEngine::new();
    let missing_before_fill = engine.compute_raw(&series).missing_count();
    let panel = engine.compute(&series);
    metrics::histogram!("quantscope.research.factors_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    if let Some(path) = csv_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            artifacts.ensure_dir(parent)?;
        }
        artifacts.write_factors_csv(path, &series.dates(), &panel)?;
    }

    Ok(FactorTableResult {
        symbol: symbol.to_string(),
        rows: panel.rows(),
        factor_names: panel.column_names().into_iter().map(str::to_string).collect(),
        missing_before_fill,
        latest: FactorSnapshot::from_panel(&panel),
        csv_path: csv_path.map(Path::to_path_buf),
    })
}

pub fn train_symbol(
    symbol: &str,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> Result<ModelSummary, String> {
    let _span = info_span!("train_symbol", symbol = %symbol, model = settings.model_kind.label())
        .entered();
    let (series, _quality) =
        fetch_series(symbol, settings, supplier).map_err(|err| describe(symbol, &err))?;
    let panel = FactorEngine::new().compute(&series);
    let dataset = FeatureLabelBuilder::new()
        .build(&series, &panel)
        .map_err(|err| describe(symbol, &err))?;

    let stage_start = Instant::now();
    let model = ModelTrainer::new(settings.model_kind)
        .train(&dataset)
        .map_err(|err| describe(symbol, &err))?;
    metrics::histogram!("quantscope.research.train_ms", "model" => settings.model_kind.label())
        .record(stage_start.elapsed().as_millis() as f64);

    Ok(ModelSummary {
        model_type: settings.model_kind.label(),
        metrics: model.metrics,
        feature_count: model.feature_names.len(),
        feature_importance: model.feature_importance,
        train_rows: model.train_rows,
        test_rows: model.test_rows,
    })
}

pub fn backtest_symbol(
    symbol: &str,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> Result<BacktestReport, String> {
    let _span = info_span!("backtest_symbol", symbol = %symbol, signal = %settings.signal).entered();
    let (series, _quality) =
        fetch_series(symbol, settings, supplier).map_err(|err| describe(symbol, &err))?;
    let panel = FactorEngine::new().compute(&series);

    let stage_start = Instant::now();
    let report = SignalBacktester::new(settings.backtest)
        .run(&series, &panel, &settings.signal)
        .map_err(|err| describe(symbol, &err))?;
    metrics::histogram!("quantscope.research.backtest_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("quantscope.research.backtest_trades").set(report.n_trades as f64);
    Ok(report)
}
