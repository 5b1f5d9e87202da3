use crate::errors::AnalysisError;
use crate::numeric::round_to;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const TRADING_DAYS: f64 = 252.0;
const RISK_FREE_RATE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanVarianceAllocation {
    pub weights: BTreeMap<String, f64>,
    /// Annualised, percent.
    pub expected_return: f64,
    /// Annualised, percent.
    pub expected_volatility: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskParityAllocation {
    pub weights: BTreeMap<String, f64>,
    pub method: &'static str,
}

/// Repeated symbols share one weight; the result always sums to one.
fn equal_weights<'a>(symbols: impl Iterator<Item = &'a str>) -> BTreeMap<String, f64> {
    let unique: BTreeSet<&str> = symbols.collect();
    let w = 1.0 / unique.len().max(1) as f64;
    unique.into_iter().map(|s| (s.to_string(), w)).collect()
}

/// Equal-weight baseline evaluated under the sample mean and covariance of
/// daily returns. Every series must have the same length (at least two).
/// A repeated symbol keeps its first series.
pub fn mean_variance(
    returns_by_symbol: &[(String, Vec<f64>)],
) -> Result<MeanVarianceAllocation, AnalysisError> {
    let mut seen = BTreeSet::new();
    let mut unique = Vec::with_capacity(returns_by_symbol.len());
    for entry in returns_by_symbol {
        if seen.insert(entry.0.as_str()) {
            unique.push(entry);
        }
    }
    let returns_by_symbol = unique;
    let n_assets = returns_by_symbol.len();
    let n_obs = returns_by_symbol.first().map_or(0, |(_, r)| r.len());
    if n_assets == 0 || n_obs < 2 {
        return Err(AnalysisError::NoValidData(
            "mean-variance needs at least one asset with two observations".to_string(),
        ));
    }
    if let Some((symbol, r)) = returns_by_symbol.iter().find(|(_, r)| r.len() != n_obs) {
        return Err(AnalysisError::NoValidData(format!(
            "return series for {symbol} has {} observations, expected {n_obs}",
            r.len()
        )));
    }

    let w = 1.0 / n_assets as f64;
    let means: Vec<f64> = returns_by_symbol
        .iter()
        .map(|(_, r)| r.iter().sum::<f64>() / n_obs as f64)
        .collect();
    let expected_return: f64 = means.iter().map(|m| w * m * TRADING_DAYS).sum();

    let mut variance = 0.0;
    for (i, (_, ri)) in returns_by_symbol.iter().enumerate() {
        for (j, (_, rj)) in returns_by_symbol.iter().enumerate() {
            let cov = ri
                .iter()
                .zip(rj)
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum::<f64>()
                / (n_obs - 1) as f64;
            variance += w * w * cov * TRADING_DAYS;
        }
    }
    let volatility = variance.max(0.0).sqrt();
    let sharpe = if volatility > 0.0 {
        (expected_return - RISK_FREE_RATE) / volatility
    } else {
        0.0
    };

    Ok(MeanVarianceAllocation {
        weights: equal_weights(returns_by_symbol.iter().map(|(s, _)| s.as_str())),
        expected_return: round_to(expected_return * 100.0, 2),
        expected_volatility: round_to(volatility * 100.0, 2),
        sharpe_ratio: round_to(sharpe, 2),
    })
}

pub fn risk_parity(symbols: &[String]) -> RiskParityAllocation {
    RiskParityAllocation {
        weights: equal_weights(symbols.iter().map(String::as_str)),
        method: "risk_parity",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_asset_uses_its_own_moments() {
        let returns = vec![("A".to_string(), vec![0.01, -0.01, 0.02, 0.0])];
        let out = mean_variance(&returns).expect("allocation");
        assert_eq!(out.weights["A"], 1.0);
        // mean 0.005 * 252 = 1.26
        assert_eq!(out.expected_return, 126.0);
        assert!(out.expected_volatility > 0.0);
    }

    #[test]
    fn perfectly_hedged_pair_has_zero_volatility() {
        let returns = vec![
            ("A".to_string(), vec![0.01, -0.01, 0.02]),
            ("B".to_string(), vec![-0.01, 0.01, -0.02]),
        ];
        let out = mean_variance(&returns).expect("allocation");
        assert_eq!(out.expected_volatility, 0.0);
        assert_eq!(out.sharpe_ratio, 0.0);
        assert_eq!(out.weights["B"], 0.5);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let returns = vec![
            ("A".to_string(), vec![0.01, 0.02]),
            ("B".to_string(), vec![0.01]),
        ];
        assert!(mean_variance(&returns).is_err());
    }

    #[test]
    fn repeated_symbols_share_one_weight() {
        let out = risk_parity(&["A".to_string(), "B".to_string(), "A".to_string()]);
        assert_eq!(out.weights.len(), 2);
        assert_eq!(out.weights["A"], 0.5);
        assert!((out.weights.values().sum::<f64>() - 1.0).abs() < 1e-12);

        let returns = vec![
            ("A".to_string(), vec![0.01, -0.01, 0.02, 0.0]),
            ("A".to_string(), vec![0.05, 0.05, 0.05, 0.05]),
        ];
        let mv = mean_variance(&returns).expect("allocation");
        assert_eq!(mv.weights["A"], 1.0);
        assert_eq!(mv.expected_return, 126.0);
    }

    #[test]
    fn risk_parity_is_equal_weight() {
        let out = risk_parity(&["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()]);
        assert_eq!(out.method, "risk_parity");
        assert!(out.weights.values().all(|w| *w == 0.25));
    }
}
