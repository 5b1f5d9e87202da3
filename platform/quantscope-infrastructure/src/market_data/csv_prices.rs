use chrono::NaiveDate;
use quantscope_domain::repositories::market_data::{validate_symbol, PriceQuery, PriceSupplier};
use quantscope_domain::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use quantscope_domain::value_objects::price_bar::{PriceBar, PriceSeries};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct DailyBarRecord {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Reads `<data_dir>/<SYMBOL>.csv` daily bar files.
#[derive(Debug, Clone)]
pub struct CsvPriceRepository {
    data_dir: PathBuf,
}

impl CsvPriceRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> Result<PathBuf, String> {
        validate_symbol(symbol)?;
        Ok(self.data_dir.join(format!("{symbol}.csv")))
    }
}

impl PriceSupplier for CsvPriceRepository {
    fn fetch_daily_bars(
        &self,
        query: &PriceQuery,
    ) -> Result<(PriceSeries, DataQualityReport), String> {
        let start = Instant::now();
        let result = self
            .path_for(&query.symbol)
            .and_then(|path| load_daily_csv(&path))
            .map(|(bars, report)| {
                let series = PriceSeries::new(&query.symbol, bars);
                let keep = series.len().saturating_sub(query.bars_requested());
                let bars = series.bars()[keep..].to_vec();
                (PriceSeries::new(&query.symbol, bars), report)
            });
        let result_label = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!("quantscope.infra.prices.load_total", "result" => result_label)
            .increment(1);
        metrics::histogram!("quantscope.infra.prices.load_ms", "result" => result_label)
            .record(start.elapsed().as_millis() as f64);
        result
    }
}

/// Parses every row, reports quality over the rows as read, and drops
/// bars with non-positive or non-finite prices.
pub fn load_daily_csv(path: &Path) -> Result<(Vec<PriceBar>, DataQualityReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open price CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut bars = Vec::new();
    for result in reader.deserialize::<DailyBarRecord>() {
        let record = result.map_err(|err| format!("failed to parse CSV row: {}", err))?;
        bars.push(PriceBar {
            date: parse_date(&record.date)?,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: if record.volume.is_finite() && record.volume > 0.0 {
                record.volume.round() as u64
            } else {
                0
            },
            amount: record.amount.unwrap_or(0.0),
        });
    }

    let report = data_quality_from_bars(&bars);
    bars.retain(PriceBar::is_valid);
    tracing::debug!(
        path = %path.display(),
        rows = report.rows_read,
        kept = bars.len(),
        "price CSV loaded"
    );
    Ok((bars, report))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .map_err(|_| format!("unsupported date format: {value}"))
}
