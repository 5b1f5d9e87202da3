use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV observation as handed over by the data supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Turnover in quote currency. Suppliers without turnover report 0.
    pub amount: f64,
}

impl PriceBar {
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
            && self.amount.is_finite()
            && self.amount >= 0.0
    }
}

/// Date-ordered bars for one symbol.
///
/// Every rolling computation depends on ascending, unique dates, so the
/// constructor canonicalises the input: bars are sorted by date and a later
/// bar for an already-seen date replaces the earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.reverse();
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    /// Drops the leading warm-up span. A series not longer than the span is
    /// kept whole so short histories still produce a (noisier) analysis.
    pub fn strip_warmup(&self, warmup_bars: usize) -> PriceSeries {
        if self.bars.len() <= warmup_bars {
            tracing::warn!(
                symbol = %self.symbol,
                bars = self.bars.len(),
                warmup_bars,
                "series not longer than warm-up span; keeping all bars"
            );
            return self.clone();
        }
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[warmup_bars..].to_vec(),
        }
    }
}
