use crate::value_objects::price_bar::PriceBar;
use chrono::NaiveDate;
use serde::Serialize;

/// Data-quality counters gathered while a supplier response is normalised.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub rows_read: usize,
    pub duplicates: usize,
    pub out_of_order: usize,
    pub invalid_bars: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub first_duplicate: Option<NaiveDate>,
    pub first_out_of_order: Option<NaiveDate>,
    pub first_invalid_bar: Option<NaiveDate>,
    /// Longest calendar gap between consecutive bars, in days.
    pub max_gap_days: Option<i64>,
}

impl DataQualityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.out_of_order == 0 && self.invalid_bars == 0
    }
}

/// Scans bars in the order received, before any canonicalisation.
pub fn data_quality_from_bars(bars: &[PriceBar]) -> DataQualityReport {
    let mut report = DataQualityReport {
        rows_read: bars.len(),
        ..DataQualityReport::default()
    };
    if bars.is_empty() {
        return report;
    }

    let mut last_date: Option<NaiveDate> = None;
    let mut max_gap: Option<i64> = None;

    for bar in bars {
        let date = bar.date;
        if !bar.is_valid() {
            report.invalid_bars += 1;
            report.first_invalid_bar.get_or_insert(date);
        }

        if let Some(prev) = last_date {
            if date == prev {
                report.duplicates += 1;
                report.first_duplicate.get_or_insert(date);
            } else if date < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(date);
            } else {
                let diff = (date - prev).num_days();
                max_gap = Some(max_gap.map_or(diff, |current| current.max(diff)));
            }
        }
        last_date = Some(date);
    }

    report.first_date = bars.iter().map(|b| b.date).min();
    report.last_date = bars.iter().map(|b| b.date).max();
    report.max_gap_days = max_gap;
    report
}
