use chrono::NaiveDate;
use quantscope_domain::services::backtest::CumulativePoint;
use quantscope_domain::services::factors::FactorPanel;
use std::fs;
use std::path::Path;

pub fn write_report_json(path: &Path, value: &serde_json::Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize report json: {}", err))?;
    fs::write(path, json)
        .map_err(|err| format!("failed to write report json {}: {}", path.display(), err))
}

pub fn write_cumulative_csv(path: &Path, points: &[CumulativePoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path).map_err(|err| {
        format!("failed to create cumulative csv {}: {}", path.display(), err)
    })?;
    wtr.write_record(["date", "cumulative_market", "cumulative_strategy"])
        .map_err(|err| format!("failed to write cumulative csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            point.date.to_string(),
            point.cumulative_market.to_string(),
            point.cumulative_strategy.to_string(),
        ])
        .map_err(|err| format!("failed to write cumulative row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush cumulative csv: {}", err))
}

/// One row per date, one column per factor; missing values are empty cells.
pub fn write_factors_csv(path: &Path, dates: &[NaiveDate], panel: &FactorPanel) -> Result<(), String> {
    if dates.len() != panel.rows() {
        return Err(format!(
            "factor panel has {} rows but {} dates were supplied",
            panel.rows(),
            dates.len()
        ));
    }
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create factors csv {}: {}", path.display(), err))?;
    let mut header = vec!["date".to_string()];
    header.extend(panel.column_names().into_iter().map(str::to_string));
    wtr.write_record(&header)
        .map_err(|err| format!("failed to write factors csv header: {}", err))?;

    for (row, date) in dates.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(date.to_string());
        for column in panel.columns() {
            record.push(column.values[row].map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)
            .map_err(|err| format!("failed to write factors row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush factors csv: {}", err))
}
