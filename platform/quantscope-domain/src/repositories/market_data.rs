use crate::services::ohlcv::DataQualityReport;
use crate::value_objects::period::LookbackPeriod;
use crate::value_objects::price_bar::PriceSeries;

#[derive(Debug, Clone)]
pub struct PriceQuery {
    pub symbol: String,
    pub period: LookbackPeriod,
    pub warmup_bars: usize,
}

impl PriceQuery {
    pub fn bars_requested(&self) -> usize {
        self.period.bars_with_warmup(self.warmup_bars)
    }
}

/// Source of daily bars. Implementations return at most
/// `query.bars_requested()` bars, ascending by date, warm-up included.
pub trait PriceSupplier {
    fn fetch_daily_bars(
        &self,
        query: &PriceQuery,
    ) -> Result<(PriceSeries, DataQualityReport), String>;
}

/// Symbols name files and run directories, so they must stay a single
/// path component.
pub fn validate_symbol(symbol: &str) -> Result<(), String> {
    if symbol.trim().is_empty() {
        return Err("symbol is empty".to_string());
    }
    if symbol.contains(['/', '\\'])
        || symbol.contains("..")
        || symbol.chars().any(char::is_control)
    {
        return Err(format!("invalid symbol: {symbol:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_symbol;

    #[test]
    fn validate_symbol_rejects_path_components() {
        assert!(validate_symbol("AAPL.US").is_ok());
        assert!(validate_symbol("00700.HK").is_ok());
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("  ").is_err());
        assert!(validate_symbol("../secrets").is_err());
        assert!(validate_symbol("a/b").is_err());
        assert!(validate_symbol("a\\b").is_err());
        assert!(validate_symbol("..").is_err());
        assert!(validate_symbol("A\0B").is_err());
    }
}
