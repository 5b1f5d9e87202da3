use crate::errors::AnalysisError;
use crate::numeric::{finite_or_zero, round_to, sample_std};
use crate::services::factors::FactorPanel;
use crate::value_objects::price_bar::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIGNAL: &str = "momentum_20d";
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestParams {
    #[serde(default = "default_long_threshold")]
    pub long_threshold: f64,
    #[serde(default = "default_short_threshold")]
    pub short_threshold: f64,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

fn default_long_threshold() -> f64 {
    0.8
}

fn default_short_threshold() -> f64 {
    0.2
}

fn default_risk_free_rate() -> f64 {
    0.02
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            long_threshold: default_long_threshold(),
            short_threshold: default_short_threshold(),
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

impl BacktestParams {
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.long_threshold) || !in_unit(self.short_threshold) {
            return Err("backtest thresholds must lie in [0, 1]".to_string());
        }
        if self.short_threshold > self.long_threshold {
            return Err(format!(
                "short_threshold ({}) must not exceed long_threshold ({})",
                self.short_threshold, self.long_threshold
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err("risk_free_rate must be finite".to_string());
        }
        Ok(())
    }

    /// +1 above the long threshold, -1 below the short one, else flat.
    pub fn position_for(&self, rank: f64) -> i8 {
        if rank > self.long_threshold {
            1
        } else if rank < self.short_threshold {
            -1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub date: NaiveDate,
    pub cumulative_market: f64,
    pub cumulative_strategy: f64,
}

/// Percent figures are x100 and rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub signal: String,
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub n_trades: usize,
    pub n_days: usize,
    pub cumulative_returns: Vec<CumulativePoint>,
}

/// Fractional rank in (0, 1]; ties share the mean of their 1-based ranks.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end
        let avg = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = avg / n as f64;
        }
        start = end;
    }
    ranks
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalBacktester {
    params: BacktestParams,
}

impl SignalBacktester {
    pub fn new(params: BacktestParams) -> Self {
        Self { params }
    }

    pub fn run(
        &self,
        series: &PriceSeries,
        panel: &FactorPanel,
        signal: &str,
    ) -> Result<BacktestReport, AnalysisError> {
        let _span = tracing::debug_span!("backtest", symbol = %series.symbol(), signal).entered();
        let signal_values = panel
            .column(signal)
            .ok_or_else(|| AnalysisError::UnknownFactor(signal.to_string()))?;

        if series.len() != panel.rows() {
            return Err(AnalysisError::MisalignedInput {
                series_rows: series.len(),
                panel_rows: panel.rows(),
            });
        }
        let rows: Vec<usize> = (0..series.len())
            .filter(|i| panel.row_complete(*i))
            .collect();
        if rows.is_empty() {
            return Err(AnalysisError::NoValidData(
                "no rows left after dropping missing values".to_string(),
            ));
        }

        let bars = series.bars();
        let scores: Vec<f64> = rows
            .iter()
            .map(|i| signal_values[*i].unwrap_or(0.0))
            .collect();
        let positions: Vec<i8> = percentile_rank(&scores)
            .into_iter()
            .map(|r| self.params.position_for(r))
            .collect();

        let mut cumulative = Vec::with_capacity(rows.len());
        let mut strategy_returns = Vec::with_capacity(rows.len().saturating_sub(1));
        let mut market = 1.0;
        let mut strategy = 1.0;
        for (k, row) in rows.iter().enumerate() {
            if k > 0 {
                let prev_close = bars[rows[k - 1]].close;
                let daily = finite_or_zero(bars[*row].close / prev_close - 1.0);
                let strat = f64::from(positions[k - 1]) * daily;
                market *= 1.0 + daily;
                strategy *= 1.0 + strat;
                strategy_returns.push(strat);
            }
            cumulative.push(CumulativePoint {
                date: bars[*row].date,
                cumulative_market: finite_or_zero(market),
                cumulative_strategy: finite_or_zero(strategy),
            });
        }

        let volatility = match sample_std(&strategy_returns) {
            Some(std) if std > 0.0 => std,
            _ => {
                return Err(AnalysisError::NoValidData(
                    "strategy returns have zero variance".to_string(),
                ))
            }
        };

        let n_days = rows.len();
        let total_return = strategy - 1.0;
        let annual_return = (1.0 + total_return).powf(TRADING_DAYS / n_days as f64) - 1.0;
        let annual_volatility = volatility * TRADING_DAYS.sqrt();
        let sharpe = if annual_volatility > 0.0 {
            (annual_return - self.params.risk_free_rate) / annual_volatility
        } else {
            0.0
        };

        let mut peak = f64::MIN;
        let max_drawdown = cumulative
            .iter()
            .map(|p| {
                peak = peak.max(p.cumulative_strategy);
                if peak > 0.0 {
                    (p.cumulative_strategy - peak) / peak
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::min);

        let active: Vec<f64> = strategy_returns
            .iter()
            .copied()
            .filter(|r| *r != 0.0)
            .collect();
        let win_rate = if active.is_empty() {
            0.0
        } else {
            active.iter().filter(|r| **r > 0.0).count() as f64 / active.len() as f64
        };

        tracing::debug!(
            rows = n_days,
            dropped = series.len() - n_days,
            trades = active.len(),
            "backtest finished"
        );
        Ok(BacktestReport {
            signal: signal.to_string(),
            total_return: round_to(total_return * 100.0, 2),
            annual_return: round_to(annual_return * 100.0, 2),
            annual_volatility: round_to(annual_volatility * 100.0, 2),
            sharpe_ratio: round_to(sharpe, 2),
            max_drawdown: round_to(max_drawdown * 100.0, 2),
            win_rate: round_to(win_rate * 100.0, 2),
            n_trades: active.len(),
            n_days,
            cumulative_returns: cumulative,
        })
    }
}

pub fn backtest(
    series: &PriceSeries,
    panel: &FactorPanel,
    signal: &str,
    params: BacktestParams,
) -> Result<BacktestReport, AnalysisError> {
    SignalBacktester::new(params).run(series, panel, signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::price_bar::PriceBar;
    use chrono::Duration;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("date");
        PriceSeries::new(
            "BT",
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| PriceBar {
                    date: start + Duration::days(i as i64),
                    open: *c,
                    high: *c,
                    low: *c,
                    close: *c,
                    volume: 100,
                    amount: c * 100.0,
                })
                .collect(),
        )
    }

    fn panel(signal: &[f64]) -> FactorPanel {
        let mut panel = FactorPanel::new(signal.len());
        panel
            .push_column("momentum_20d", signal.iter().map(|v| Some(*v)).collect())
            .expect("push");
        panel
    }

    #[test]
    fn average_rank_shares_ties() {
        let ranks = percentile_rank(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5 / 4.0, 0.25, 3.5 / 4.0, 0.5]);
    }

    #[test]
    fn positions_are_lagged_one_bar() {
        // Ranks: 0.2 (flat), 1.0 (long), 0.6 (flat), 0.4 (flat), 0.8 (flat).
        let s = series(&[100.0, 110.0, 121.0, 108.9, 119.79]);
        let p = panel(&[1.0, 5.0, 3.0, 2.0, 4.0]);
        let report = backtest(&s, &p, "momentum_20d", BacktestParams::default()).expect("report");
        // Only the bar after the long signal earns: +10%.
        let last = report.cumulative_returns.last().expect("point");
        assert!((last.cumulative_strategy - 1.1).abs() < 1e-12);
        assert_eq!(report.total_return, 10.0);
        assert_eq!(report.n_trades, 1);
        assert_eq!(report.win_rate, 100.0);
        assert_eq!(report.cumulative_returns[0].cumulative_strategy, 1.0);
    }

    #[test]
    fn short_position_profits_from_decline() {
        let mut closes = vec![100.0];
        closes.extend([90.0; 9]);
        let mut signal = vec![0.0];
        signal.extend([5.0; 9]);
        // Row 0 ranks 0.1 (short); the tied rest rank 0.6 (flat).
        let report = backtest(&series(&closes), &panel(&signal), "momentum_20d", BacktestParams::default())
            .expect("report");
        assert_eq!(report.total_return, 10.0);
        assert_eq!(report.n_trades, 1);
        assert_eq!(report.win_rate, 100.0);
        assert_eq!(report.max_drawdown, 0.0);
        let last = report.cumulative_returns.last().expect("point");
        assert!((last.cumulative_market - 0.9).abs() < 1e-12);
    }

    #[test]
    fn unknown_signal_is_rejected() {
        let s = series(&[1.0, 2.0]);
        let err = backtest(&s, &panel(&[1.0, 2.0]), "nope", BacktestParams::default())
            .expect_err("unknown");
        assert_eq!(err.reason(), "unknown_factor");
    }

    #[test]
    fn flat_strategy_has_no_valid_data() {
        let s = series(&[10.0; 30]);
        let signal: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let err = backtest(&s, &panel(&signal), "momentum_20d", BacktestParams::default())
            .expect_err("flat");
        assert_eq!(err.reason(), "no_valid_data");
    }

    #[test]
    fn rows_with_missing_factors_are_dropped() {
        let s = series(&[100.0, 110.0, 121.0]);
        let mut p = FactorPanel::new(3);
        p.push_column("momentum_20d", vec![Some(1.0), Some(2.0), Some(3.0)])
            .expect("push");
        p.push_column("roe", vec![None; 3]).expect("push");
        let err = backtest(&s, &p, "momentum_20d", BacktestParams::default()).expect_err("empty");
        assert_eq!(err.reason(), "no_valid_data");
    }

    #[test]
    fn panel_longer_than_series_is_rejected() {
        let s = series(&[100.0, 110.0, 121.0]);
        let err = backtest(&s, &panel(&[1.0, 2.0, 3.0, 4.0]), "momentum_20d", BacktestParams::default())
            .expect_err("misaligned");
        assert_eq!(
            err,
            AnalysisError::MisalignedInput {
                series_rows: 3,
                panel_rows: 4
            }
        );
    }

    #[test]
    fn params_validation() {
        assert!(BacktestParams::default().validate().is_ok());
        let bad = BacktestParams {
            long_threshold: 0.1,
            ..BacktestParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
