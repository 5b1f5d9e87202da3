use crate::services::backtest::CumulativePoint;
use crate::services::factors::FactorPanel;
use chrono::NaiveDate;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_report_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), String>;
    fn write_cumulative_csv(&self, path: &Path, points: &[CumulativePoint]) -> Result<(), String>;
    fn write_factors_csv(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        panel: &FactorPanel,
    ) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
}
