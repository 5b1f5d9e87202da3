use crate::numeric::round_to;
use crate::services::factors::FactorPanel;
use serde::Serialize;
use std::collections::BTreeMap;

/// Factor values of the most recent bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactorSnapshot(BTreeMap<String, Option<f64>>);

impl FactorSnapshot {
    pub fn from_panel(panel: &FactorPanel) -> Self {
        Self(panel.latest().into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    fn get_or(&self, name: &str, fallback: f64) -> f64 {
        self.get(name).unwrap_or(fallback)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreCard {
    pub trend_score: f64,
    pub risk_score: f64,
    pub composite_score: f64,
}

pub fn trend_score(f: &FactorSnapshot) -> f64 {
    let mut score = 50.0;
    if f.get_or("momentum_20d", 0.0) > 0.0 {
        score += 20.0;
    }
    if f.get_or("momentum_5d", 0.0) > 0.0 {
        score += 15.0;
    }
    if f.get_or("rsi_14", 50.0) > 50.0 {
        score += 10.0;
    }
    if f.get_or("macd_dif", 0.0) > 0.0 {
        score += 5.0;
    }
    score
}

pub fn risk_score(f: &FactorSnapshot) -> f64 {
    let mut score = 50.0;
    let vol = f.get_or("volatility_20d", 0.2);
    if vol < 0.2 {
        score += 20.0;
    } else if vol > 0.4 {
        score -= 20.0;
    }
    let drawdown = f.get_or("max_drawdown_60d", 0.0);
    if drawdown > -0.1 {
        score += 15.0;
    } else if drawdown < -0.2 {
        score -= 15.0;
    }
    score
}

pub fn score(f: &FactorSnapshot) -> ScoreCard {
    let trend = trend_score(f);
    let risk = risk_score(f);
    ScoreCard {
        trend_score: round_to(trend, 1),
        risk_score: round_to(risk, 1),
        composite_score: round_to((trend + risk) / 2.0, 1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendSignal {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub trend_signal: TrendSignal,
    pub volatility_level: VolatilityLevel,
    pub technical_score: f64,
}

pub fn summarize(f: &FactorSnapshot) -> Summary {
    let trend_signal = if f.get_or("momentum_20d", 0.0) > 0.0 {
        TrendSignal::Bullish
    } else {
        TrendSignal::Bearish
    };
    let volatility_level = if f.get_or("volatility_20d", 0.0) > 0.3 {
        VolatilityLevel::High
    } else {
        VolatilityLevel::Normal
    };
    let macd_points = if f.get_or("macd_dif", 0.0) > 0.0 {
        100.0
    } else {
        50.0
    };
    Summary {
        trend_signal,
        volatility_level,
        technical_score: round_to((f.get_or("rsi_14", 50.0) + macd_points) / 2.0, 2),
    }
}
