use crate::analysis::{AnalysisReport, AnalysisSettings, BatchReport};
use crate::meta::{engine_version, ENGINE_NAME};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    pub run_id: String,
    pub engine: &'static str,
    pub engine_version: &'static str,
    pub generated_at: String,
    pub period: &'static str,
    pub warmup_bars: usize,
    pub model_kind: &'static str,
    pub signal: String,
}

impl ReportMeta {
    pub fn new(run_id: &str, settings: &AnalysisSettings) -> Self {
        Self {
            run_id: run_id.to_string(),
            engine: ENGINE_NAME,
            engine_version: engine_version(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            period: settings.period.label(),
            warmup_bars: settings.warmup_bars,
            model_kind: settings.model_kind.label(),
            signal: settings.signal.clone(),
        }
    }
}

fn to_value<T: Serialize>(value: &T, what: &str) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|err| format!("failed to serialize {what}: {err}"))
}

pub fn analysis_json(
    report: &AnalysisReport,
    meta: &ReportMeta,
) -> Result<serde_json::Value, String> {
    let mut value = to_value(report, "analysis report")?;
    if let Some(map) = value.as_object_mut() {
        map.insert("meta".to_string(), to_value(meta, "report meta")?);
    }
    Ok(value)
}

pub fn batch_json(batch: &BatchReport, meta: &ReportMeta) -> Result<serde_json::Value, String> {
    let mut value = to_value(batch, "batch report")?;
    if let Some(map) = value.as_object_mut() {
        map.insert("meta".to_string(), to_value(meta, "report meta")?);
    }
    Ok(value)
}

/// One line per analysed symbol, highest composite score first.
pub fn format_batch_table(batch: &BatchReport) -> String {
    let mut out = format!(
        "{:<12} {:>10} {:>8} {:>8} {:>10} {:>10}\n",
        "symbol", "price", "trend", "risk", "composite", "return%"
    );
    for report in &batch.results {
        let total_return = report
            .backtest
            .report()
            .map(|bt| format!("{:.2}", bt.total_return))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<12} {:>10.2} {:>8.1} {:>8.1} {:>10.1} {:>10}\n",
            report.symbol,
            report.latest_price,
            report.scores.trend_score,
            report.scores.risk_score,
            report.scores.composite_score,
            total_return
        ));
    }
    for err in &batch.errors {
        out.push_str(&format!("{:<12} error: {} ({})\n", err.symbol, err.error, err.reason));
    }
    out
}
