use crate::config::{validate_config, Config};
use crate::reporting::{self, ReportMeta};
use crate::shared::{
    factors_csv_enabled, resolve_backtest_params, resolve_model_kind, resolve_period,
    resolve_signal, resolve_warmup_bars, series_fingerprint,
};
use chrono::NaiveDate;
use quantscope_domain::errors::AnalysisError;
use quantscope_domain::repositories::artifacts::ArtifactWriter;
use quantscope_domain::repositories::market_data::{PriceQuery, PriceSupplier};
use quantscope_domain::services::backtest::{BacktestParams, BacktestReport, SignalBacktester};
use quantscope_domain::services::dataset::{FeatureLabelBuilder, MIN_TRAINING_ROWS};
use quantscope_domain::services::factors::{FactorEngine, FactorPanel};
use quantscope_domain::services::models::ModelKind;
use quantscope_domain::services::ohlcv::DataQualityReport;
use quantscope_domain::services::scoring::{self, FactorSnapshot, ScoreCard, Summary};
use quantscope_domain::services::training::{FeatureImportance, ModelTrainer, TrainingMetrics};
use quantscope_domain::value_objects::period::LookbackPeriod;
use quantscope_domain::value_objects::price_bar::PriceSeries;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info_span;

pub const MAX_BATCH_SYMBOLS: usize = 10;

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub period: LookbackPeriod,
    pub warmup_bars: usize,
    pub model_kind: ModelKind,
    pub signal: String,
    pub backtest: BacktestParams,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            period: LookbackPeriod::default(),
            warmup_bars: quantscope_domain::value_objects::period::DEFAULT_WARMUP_BARS,
            model_kind: ModelKind::default(),
            signal: quantscope_domain::services::backtest::DEFAULT_SIGNAL.to_string(),
            backtest: BacktestParams::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        Ok(Self {
            period: resolve_period(config),
            warmup_bars: resolve_warmup_bars(config),
            model_kind: resolve_model_kind(config),
            signal: resolve_signal(config)?,
            backtest: resolve_backtest_params(config)?,
        })
    }
}

/// A pipeline stage that could not produce a value, with its reason code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub reason: &'static str,
    pub error: String,
}

impl From<&AnalysisError> for StageFailure {
    fn from(err: &AnalysisError) -> Self {
        Self {
            reason: err.reason(),
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model_type: &'static str,
    pub metrics: TrainingMetrics,
    pub feature_importance: Vec<FeatureImportance>,
    pub feature_count: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    Trained(ModelSummary),
    Skipped(StageFailure),
}

impl ModelOutcome {
    pub fn metrics(&self) -> Option<&TrainingMetrics> {
        match self {
            Self::Trained(summary) => Some(&summary.metrics),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BacktestOutcome {
    Completed(BacktestReport),
    Failed(StageFailure),
}

impl BacktestOutcome {
    pub fn report(&self) -> Option<&BacktestReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub symbol: String,
    pub data_points: usize,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub latest_price: f64,
    pub latest_factors: FactorSnapshot,
    pub model: ModelOutcome,
    pub backtest: BacktestOutcome,
    #[serde(flatten)]
    pub scores: ScoreCard,
    pub summary: Summary,
    pub data_quality: DataQualityReport,
    pub series_sha256: String,
}

/// Report plus the intermediate tables artifacts are written from.
#[derive(Debug, Clone)]
pub struct SymbolAnalysis {
    pub report: AnalysisReport,
    pub series: PriceSeries,
    pub panel: FactorPanel,
}

/// Runs the whole pipeline on an already-stripped series.
pub fn analyze_series(
    series: &PriceSeries,
    data_quality: DataQualityReport,
    settings: &AnalysisSettings,
) -> Result<SymbolAnalysis, AnalysisError> {
    let symbol = series.symbol().to_string();
    let Some(last_bar) = series.last() else {
        return Err(AnalysisError::UpstreamDataUnavailable { symbol });
    };
    let _span = info_span!("analyze_series", symbol = %symbol, bars = series.len()).entered();

    let stage_start = Instant::now();
    let panel = FactorEngine::new().compute(series);
    metrics::histogram!("quantscope.analysis.factors_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let stage_start = Instant::now();
    let model = train_stage(series, &panel, settings.model_kind);
    metrics::histogram!("quantscope.analysis.train_ms", "model" => settings.model_kind.label())
        .record(stage_start.elapsed().as_millis() as f64);

    let stage_start = Instant::now();
    let backtest = match SignalBacktester::new(settings.backtest).run(series, &panel, &settings.signal)
    {
        Ok(report) => BacktestOutcome::Completed(report),
        Err(err) => {
            tracing::warn!(reason = err.reason(), error = %err, "backtest produced no report");
            BacktestOutcome::Failed(StageFailure::from(&err))
        }
    };
    metrics::histogram!("quantscope.analysis.backtest_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let latest_factors = FactorSnapshot::from_panel(&panel);
    let scores = scoring::score(&latest_factors);
    let summary = scoring::summarize(&latest_factors);

    let report = AnalysisReport {
        symbol,
        data_points: series.len(),
        first_date: series.bars().first().map(|bar| bar.date),
        latest_date: Some(last_bar.date),
        latest_price: last_bar.close,
        latest_factors,
        model,
        backtest,
        scores,
        summary,
        data_quality,
        series_sha256: series_fingerprint(series),
    };
    tracing::info!(
        composite_score = report.scores.composite_score,
        trend_score = report.scores.trend_score,
        risk_score = report.scores.risk_score,
        "analysis complete"
    );
    Ok(SymbolAnalysis {
        report,
        series: series.clone(),
        panel,
    })
}

fn train_stage(series: &PriceSeries, panel: &FactorPanel, kind: ModelKind) -> ModelOutcome {
    let dataset = match FeatureLabelBuilder::new().build(series, panel) {
        Ok(dataset) => dataset,
        Err(err) => {
            tracing::info!(
                reason = err.reason(),
                min_rows = MIN_TRAINING_ROWS,
                "model training skipped"
            );
            return ModelOutcome::Skipped(StageFailure::from(&err));
        }
    };
    match ModelTrainer::new(kind).train(&dataset) {
        Ok(model) => ModelOutcome::Trained(ModelSummary {
            model_type: kind.label(),
            metrics: model.metrics,
            feature_count: model.feature_names.len(),
            feature_importance: model.feature_importance,
            train_rows: model.train_rows,
            test_rows: model.test_rows,
        }),
        Err(err) => {
            tracing::warn!(reason = err.reason(), error = %err, "model training failed");
            ModelOutcome::Skipped(StageFailure::from(&err))
        }
    }
}

/// Fetches `period + warm-up` bars, drops the warm-up span, then analyses.
pub fn analyze_symbol(
    symbol: &str,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> Result<SymbolAnalysis, AnalysisError> {
    let _span = info_span!("analyze_symbol", symbol = %symbol, period = settings.period.label())
        .entered();
    let (series, quality) = fetch_series(symbol, settings, supplier)?;
    analyze_series(&series, quality, settings)
}

pub(crate) fn fetch_series(
    symbol: &str,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> Result<(PriceSeries, DataQualityReport), AnalysisError> {
    let query = PriceQuery {
        symbol: symbol.to_string(),
        period: settings.period,
        warmup_bars: settings.warmup_bars,
    };
    let stage_start = Instant::now();
    let fetched = supplier.fetch_daily_bars(&query);
    metrics::histogram!("quantscope.analysis.fetch_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let (series, quality) = fetched.map_err(|err| {
        tracing::error!(symbol = %symbol, error = %err, "price supplier failed");
        AnalysisError::UpstreamDataUnavailable {
            symbol: symbol.to_string(),
        }
    })?;
    if series.is_empty() {
        return Err(AnalysisError::UpstreamDataUnavailable {
            symbol: symbol.to_string(),
        });
    }
    if !quality.is_clean() {
        tracing::warn!(
            duplicates = quality.duplicates,
            out_of_order = quality.out_of_order,
            invalid_bars = quality.invalid_bars,
            "supplier data needed normalisation"
        );
    }
    let stripped = series.strip_warmup(settings.warmup_bars);
    tracing::debug!(
        fetched = series.len(),
        analysed = stripped.len(),
        "warm-up span removed"
    );
    Ok((stripped, quality))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchError {
    pub symbol: String,
    pub reason: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<AnalysisReport>,
    pub errors: Vec<BatchError>,
    pub total_analyzed: usize,
    pub total_errors: usize,
    /// Symbols beyond the per-batch cap, not analysed.
    pub skipped_symbols: Vec<String>,
    #[serde(skip)]
    pub analyses: Vec<SymbolAnalysis>,
}

/// Analyses up to [`MAX_BATCH_SYMBOLS`] symbols in order; a failing symbol
/// is recorded and the rest continue. Results are sorted by composite score,
/// highest first.
pub fn analyze_batch(
    symbols: &[String],
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> BatchReport {
    let _span = info_span!("analyze_batch", symbols = symbols.len()).entered();
    let (to_analyze, skipped) = symbols.split_at(symbols.len().min(MAX_BATCH_SYMBOLS));
    if !skipped.is_empty() {
        tracing::warn!(
            skipped = skipped.len(),
            cap = MAX_BATCH_SYMBOLS,
            "batch truncated"
        );
    }

    let mut analyses = Vec::with_capacity(to_analyze.len());
    let mut errors = Vec::new();
    for symbol in to_analyze {
        match analyze_symbol(symbol, settings, supplier) {
            Ok(analysis) => {
                metrics::counter!("quantscope.batch.symbols_total", "result" => "ok").increment(1);
                analyses.push(analysis);
            }
            Err(err) => {
                metrics::counter!("quantscope.batch.symbols_total", "result" => "err")
                    .increment(1);
                tracing::warn!(symbol = %symbol, reason = err.reason(), error = %err, "symbol failed");
                errors.push(BatchError {
                    symbol: symbol.clone(),
                    reason: err.reason(),
                    error: err.to_string(),
                });
            }
        }
    }

    analyses.sort_by(|a, b| {
        b.report
            .scores
            .composite_score
            .total_cmp(&a.report.scores.composite_score)
    });
    let results: Vec<AnalysisReport> = analyses.iter().map(|a| a.report.clone()).collect();
    BatchReport {
        total_analyzed: results.len(),
        total_errors: errors.len(),
        results,
        errors,
        skipped_symbols: skipped.to_vec(),
        analyses,
    }
}

/// Config-driven run: one symbol writes `analysis.json`, several write
/// `batch.json` plus a sub-directory per symbol.
pub fn run_analysis(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    supplier: &dyn PriceSupplier,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let _span = info_span!("run_analysis", run_id = %config.run.run_id).entered();
    if config.run.symbols.is_empty() {
        return Err("run.symbols must list at least one symbol".to_string());
    }
    validate_config(config)?;
    let settings = AnalysisSettings::from_config(config)?;
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;
    let meta = ReportMeta::new(&config.run.run_id, &settings);
    let with_factors = factors_csv_enabled(config);

    if let [symbol] = config.run.symbols.as_slice() {
        let analysis = analyze_symbol(symbol, &settings, supplier)
            .map_err(|err| format!("{symbol}: {} ({})", err, err.reason()))?;
        let value = reporting::analysis_json(&analysis.report, &meta)?;
        artifacts.write_report_json(run_dir.join("analysis.json").as_path(), &value)?;
        write_symbol_tables(&run_dir, &analysis, with_factors, artifacts)?;
    } else {
        let batch = analyze_batch(&config.run.symbols, &settings, supplier);
        let value = reporting::batch_json(&batch, &meta)?;
        artifacts.write_report_json(run_dir.join("batch.json").as_path(), &value)?;
        for analysis in &batch.analyses {
            let symbol_dir = run_dir.join(analysis.series.symbol());
            artifacts.ensure_dir(&symbol_dir)?;
            write_symbol_tables(&symbol_dir, analysis, with_factors, artifacts)?;
        }
    }

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;
    Ok(run_dir)
}

fn write_symbol_tables(
    dir: &Path,
    analysis: &SymbolAnalysis,
    with_factors: bool,
    artifacts: &dyn ArtifactWriter,
) -> Result<(), String> {
    if let Some(report) = analysis.report.backtest.report() {
        artifacts.write_cumulative_csv(
            dir.join("cumulative_returns.csv").as_path(),
            &report.cumulative_returns,
        )?;
    }
    if with_factors {
        artifacts.write_factors_csv(
            dir.join("factors.csv").as_path(),
            &analysis.series.dates(),
            &analysis.panel,
        )?;
    }
    Ok(())
}
