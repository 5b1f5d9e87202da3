use serde::{Deserialize, Serialize};

pub const DEFAULT_WARMUP_BARS: usize = 60;

/// Lookback window requested from the data supplier, in trading days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[default]
    #[serde(rename = "3y")]
    ThreeYears,
}

impl LookbackPeriod {
    /// Unknown tokens resolve to the three-year window.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "6m" | "6mo" => Self::SixMonths,
            "1y" => Self::OneYear,
            "2y" => Self::TwoYears,
            _ => Self::ThreeYears,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::ThreeYears => "3y",
        }
    }

    pub fn trading_days(&self) -> usize {
        match self {
            Self::SixMonths => 125,
            Self::OneYear => 250,
            Self::TwoYears => 500,
            Self::ThreeYears => 750,
        }
    }

    /// Bars the supplier must return so the warm-up span can be discarded.
    pub fn bars_with_warmup(&self, warmup_bars: usize) -> usize {
        self.trading_days() + warmup_bars
    }
}

#[cfg(test)]
mod tests {
    use super::LookbackPeriod;

    #[test]
    fn parse_maps_tokens_and_falls_back_to_three_years() {
        assert_eq!(LookbackPeriod::parse("6m").trading_days(), 125);
        assert_eq!(LookbackPeriod::parse(" 1Y ").trading_days(), 250);
        assert_eq!(LookbackPeriod::parse("2y").trading_days(), 500);
        assert_eq!(LookbackPeriod::parse("10y"), LookbackPeriod::ThreeYears);
    }

    #[test]
    fn bars_with_warmup_adds_span() {
        assert_eq!(LookbackPeriod::OneYear.bars_with_warmup(60), 310);
    }
}
