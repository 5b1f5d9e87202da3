use crate::analysis::{fetch_series, AnalysisSettings};
use quantscope_domain::repositories::market_data::PriceSupplier;
use quantscope_domain::services::portfolio::{
    mean_variance, risk_parity, MeanVarianceAllocation, RiskParityAllocation,
};
use quantscope_domain::value_objects::price_bar::PriceSeries;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMethod {
    MeanVariance,
    RiskParity,
}

impl OptimizationMethod {
    /// Anything but `risk_parity` selects mean-variance.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "risk_parity" | "risk-parity" => Self::RiskParity,
            _ => Self::MeanVariance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortfolioAllocation {
    MeanVariance(MeanVarianceAllocation),
    RiskParity(RiskParityAllocation),
}

/// Daily close-to-close returns over the dates every series shares.
pub fn aligned_returns(series: &[PriceSeries]) -> Vec<(String, Vec<f64>)> {
    let mut common: Option<BTreeSet<chrono::NaiveDate>> = None;
    for s in series {
        let dates: BTreeSet<_> = s.dates().into_iter().collect();
        common = Some(match common {
            Some(acc) => acc.intersection(&dates).copied().collect(),
            None => dates,
        });
    }
    let common = common.unwrap_or_default();

    series
        .iter()
        .map(|s| {
            let closes: BTreeMap<_, _> = s
                .bars()
                .iter()
                .filter(|bar| common.contains(&bar.date))
                .map(|bar| (bar.date, bar.close))
                .collect();
            let values: Vec<f64> = closes.values().copied().collect();
            let returns = values.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
            (s.symbol().to_string(), returns)
        })
        .collect()
}

pub fn optimize_portfolio(
    symbols: &[String],
    method: OptimizationMethod,
    settings: &AnalysisSettings,
    supplier: &dyn PriceSupplier,
) -> Result<PortfolioAllocation, String> {
    let _span = info_span!("optimize_portfolio", symbols = symbols.len()).entered();
    if symbols.is_empty() {
        return Err("portfolio optimisation needs at least one symbol".to_string());
    }
    if method == OptimizationMethod::RiskParity {
        return Ok(PortfolioAllocation::RiskParity(risk_parity(symbols)));
    }

    let mut seen = BTreeSet::new();
    let mut series = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !seen.insert(symbol.as_str()) {
            continue;
        }
        let (s, _quality) = fetch_series(symbol, settings, supplier)
            .map_err(|err| format!("{symbol}: {err} ({})", err.reason()))?;
        series.push(s);
    }
    let returns = aligned_returns(&series);
    tracing::debug!(
        observations = returns.first().map_or(0, |(_, r)| r.len()),
        "returns aligned on common dates"
    );
    mean_variance(&returns)
        .map(PortfolioAllocation::MeanVariance)
        .map_err(|err| format!("{err} ({})", err.reason()))
}
