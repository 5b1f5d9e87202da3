use crate::reporting;
use chrono::NaiveDate;
use quantscope_domain::repositories::artifacts::ArtifactWriter;
use quantscope_domain::services::backtest::CumulativePoint;
use quantscope_domain::services::factors::FactorPanel;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn record_write_metrics(kind: &'static str, start: Instant, result: &Result<(), String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "quantscope.infra.artifacts.write.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!(
        "quantscope.infra.artifacts.write_ms",
        "kind" => kind,
        "result" => result_label
    )
    .record(start.elapsed().as_millis() as f64);
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err));
        record_write_metrics("ensure_dir", start, &result);
        result
    }

    fn write_report_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_report_json(path, value);
        record_write_metrics("report_json", start, &result);
        result
    }

    fn write_cumulative_csv(&self, path: &Path, points: &[CumulativePoint]) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_cumulative_csv(path, points);
        record_write_metrics("cumulative_csv", start, &result);
        result
    }

    fn write_factors_csv(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        panel: &FactorPanel,
    ) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_factors_csv(path, dates, panel);
        record_write_metrics("factors_csv", start, &result);
        result
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        });
        record_write_metrics("config_snapshot_toml", start, &result);
        result
    }
}
