use crate::numeric::finite;
use crate::value_objects::price_bar::PriceSeries;

mod rolling;

pub use rolling::{
    ewm_mean, pct_change, rolling_corr, rolling_max, rolling_mean, rolling_min, rolling_rate,
    rolling_std, RollingWindow,
};
use rolling::{lift, zip_with};

const TRADING_DAYS: f64 = 252.0;
const GAP_THRESHOLD: f64 = 0.01;
const NEAR_HIGH_RATIO: f64 = 0.98;
const HIGH_VOLUME_MULTIPLE: f64 = 1.5;
const HIGH_TURNOVER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorGroup {
    Momentum,
    Volatility,
    Technical,
    Fundamental,
    MoneyFlow,
    Chip,
}

/// The fixed factor catalogue, in panel column order.
pub const FACTOR_CATALOGUE: &[(&str, FactorGroup)] = &[
    ("momentum_5d", FactorGroup::Momentum),
    ("momentum_10d", FactorGroup::Momentum),
    ("momentum_20d", FactorGroup::Momentum),
    ("momentum_60d", FactorGroup::Momentum),
    ("up_days_ratio", FactorGroup::Momentum),
    ("volatility_20d", FactorGroup::Volatility),
    ("max_drawdown_60d", FactorGroup::Volatility),
    ("atr_14", FactorGroup::Volatility),
    ("rsi_14", FactorGroup::Technical),
    ("macd_dif", FactorGroup::Technical),
    ("macd_dea", FactorGroup::Technical),
    ("bollinger_width", FactorGroup::Technical),
    ("volume_ma_deviation", FactorGroup::Technical),
    ("price_volume_corr", FactorGroup::Technical),
    ("gap_frequency", FactorGroup::Technical),
    ("pe_percentile", FactorGroup::Fundamental),
    ("pb_percentile", FactorGroup::Fundamental),
    ("roe", FactorGroup::Fundamental),
    ("revenue_growth", FactorGroup::Fundamental),
    ("profit_growth", FactorGroup::Fundamental),
    ("amount_trend", FactorGroup::MoneyFlow),
    ("volume_expansion", FactorGroup::MoneyFlow),
    ("money_flow_continuity", FactorGroup::MoneyFlow),
    ("volume_price_up_prob", FactorGroup::MoneyFlow),
    ("high_volume_pullback_prob", FactorGroup::MoneyFlow),
    ("volume_concentration", FactorGroup::MoneyFlow),
    ("turnover", FactorGroup::Chip),
    ("turnover_volatility", FactorGroup::Chip),
    ("chip_concentration", FactorGroup::Chip),
    ("high_turnover_at_high", FactorGroup::Chip),
    ("holding_stability", FactorGroup::Chip),
    ("vol_turnover_divergence", FactorGroup::Chip),
];

pub fn factor_group(name: &str) -> Option<FactorGroup> {
    FACTOR_CATALOGUE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, g)| *g)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Row-aligned factor table: one row per bar, one column per factor.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorPanel {
    rows: usize,
    columns: Vec<FactorColumn>,
}

impl FactorPanel {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: Vec::new(),
        }
    }

    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), String> {
        let name = name.into();
        if values.len() != self.rows {
            return Err(format!(
                "factor column {name} has {} rows, panel has {}",
                values.len(),
                self.rows
            ));
        }
        if self.column(&name).is_some() {
            return Err(format!("duplicate factor column {name}"));
        }
        self.columns.push(FactorColumn { name, values });
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[FactorColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)?.get(row).copied().flatten()
    }

    pub fn missing_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.values.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// `true` when every factor in `row` has a value.
    pub fn row_complete(&self, row: usize) -> bool {
        self.columns
            .iter()
            .all(|c| c.values.get(row).copied().flatten().is_some())
    }

    /// Factor values of the last row, in column order.
    pub fn latest(&self) -> Vec<(String, Option<f64>)> {
        let Some(last) = self.rows.checked_sub(1) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.values[last]))
            .collect()
    }

    /// Forward-fill, then backward-fill, then zero every remaining gap.
    ///
    /// Keeps the row count stable so the panel stays aligned with its price
    /// series; rows are never dropped here.
    pub fn fill_missing(&mut self) {
        for column in &mut self.columns {
            let mut last = None;
            for v in column.values.iter_mut() {
                match v {
                    Some(x) => last = Some(*x),
                    None => *v = last,
                }
            }
            let mut next = None;
            for v in column.values.iter_mut().rev() {
                match v {
                    Some(x) => next = Some(*x),
                    None => *v = next,
                }
            }
            for v in column.values.iter_mut() {
                if v.is_none() {
                    *v = Some(0.0);
                }
            }
        }
    }
}

/// Computes the fixed factor catalogue from a price series.
#[derive(Debug, Default, Clone, Copy)]
pub struct FactorEngine;

impl FactorEngine {
    pub fn new() -> Self {
        Self
    }

    /// Panel with the missing-value policy applied; contains no gaps.
    pub fn compute(&self, series: &PriceSeries) -> FactorPanel {
        let _span = tracing::debug_span!("compute_factors", symbol = %series.symbol()).entered();
        let mut panel = self.compute_raw(series);
        let missing_before = panel.missing_count();
        panel.fill_missing();
        tracing::debug!(
            rows = panel.rows(),
            columns = panel.columns().len(),
            missing_before,
            "factor panel filled"
        );
        panel
    }

    /// Panel before filling; rows whose windows are not yet full are missing.
    pub fn compute_raw(&self, series: &PriceSeries) -> FactorPanel {
        let px = PriceColumns::from_series(series);
        let n = px.close.len();
        let mut out: Vec<(&'static str, Vec<Option<f64>>)> = Vec::with_capacity(32);

        momentum_factors(&px, &mut out);
        volatility_factors(&px, &mut out);
        technical_factors(&px, &mut out);
        for (name, group) in FACTOR_CATALOGUE {
            if *group == FactorGroup::Fundamental {
                // No financial-statement feed: structurally absent.
                out.push((*name, vec![None; n]));
            }
        }
        money_flow_factors(&px, &mut out);
        chip_factors(&px, &mut out);

        let mut panel = FactorPanel::new(n);
        for (name, _) in FACTOR_CATALOGUE {
            let values = out
                .iter()
                .position(|(n, _)| n == name)
                .map(|idx| std::mem::take(&mut out[idx].1))
                .unwrap_or_else(|| vec![None; n]);
            if let Err(err) = panel.push_column(*name, values) {
                tracing::error!(error = %err, "factor column rejected");
            }
        }
        panel
    }
}

pub fn compute_factors(series: &PriceSeries) -> FactorPanel {
    FactorEngine::new().compute(series)
}

struct PriceColumns {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    amount: Vec<f64>,
    daily_return: Vec<Option<f64>>,
    volume_ma20: Vec<Option<f64>>,
    close_high20: Vec<Option<f64>>,
}

impl PriceColumns {
    fn from_series(series: &PriceSeries) -> Self {
        let bars = series.bars();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volume: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        let daily_return = pct_change(&close, 1);
        let volume_ma20 = rolling_mean(&lift(&volume), 20);
        let close_high20 = rolling_max(&lift(&close), 20);
        Self {
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            amount: bars.iter().map(|b| b.amount).collect(),
            close,
            volume,
            daily_return,
            volume_ma20,
            close_high20,
        }
    }

    fn len(&self) -> usize {
        self.close.len()
    }

    /// Close within 2% of its trailing 20-bar high.
    fn near_high(&self, i: usize) -> bool {
        self.close_high20[i].is_some_and(|high| self.close[i] >= high * NEAR_HIGH_RATIO)
    }

    fn volume_above(&self, i: usize, multiple: f64) -> bool {
        self.volume_ma20[i].is_some_and(|ma| self.volume[i] > ma * multiple)
    }
}

type Columns = Vec<(&'static str, Vec<Option<f64>>)>;

fn momentum_factors(px: &PriceColumns, out: &mut Columns) {
    for (name, period) in [
        ("momentum_5d", 5),
        ("momentum_10d", 10),
        ("momentum_20d", 20),
        ("momentum_60d", 60),
    ] {
        out.push((name, pct_change(&px.close, period)));
    }

    let up_days = rolling::rolling_apply(&px.daily_return, 20, |w| {
        Some(w.iter().filter(|r| **r > 0.0).count() as f64 / w.len() as f64)
    });
    out.push(("up_days_ratio", up_days));
}

fn volatility_factors(px: &PriceColumns, out: &mut Columns) {
    let vol = rolling_std(&px.daily_return, 20)
        .into_iter()
        .map(|v| v.map(|s| s * TRADING_DAYS.sqrt()))
        .collect();
    out.push(("volatility_20d", vol));

    let mut peak = f64::MIN;
    let drawdown: Vec<Option<f64>> = px
        .close
        .iter()
        .map(|c| {
            peak = peak.max(*c);
            finite((c - peak) / peak)
        })
        .collect();
    out.push(("max_drawdown_60d", rolling_min(&drawdown, 60)));

    let true_range: Vec<Option<f64>> = (0..px.len())
        .map(|i| {
            let hl = px.high[i] - px.low[i];
            if i == 0 {
                return finite(hl);
            }
            let pc = px.close[i - 1];
            finite(hl.max((px.high[i] - pc).abs()).max((px.low[i] - pc).abs()))
        })
        .collect();
    out.push(("atr_14", rolling_mean(&true_range, 14)));
}

fn technical_factors(px: &PriceColumns, out: &mut Columns) {
    let n = px.len();
    let (gains, losses): (Vec<Option<f64>>, Vec<Option<f64>>) = (0..n)
        .map(|i| {
            let delta = if i == 0 {
                0.0
            } else {
                px.close[i] - px.close[i - 1]
            };
            (Some(delta.max(0.0)), Some((-delta).max(0.0)))
        })
        .unzip();
    let avg_gain = rolling_mean(&gains, 14);
    let avg_loss = rolling_mean(&losses, 14);
    let rsi = avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) if *l > 0.0 => finite(100.0 - 100.0 / (1.0 + g / l)),
            (Some(g), Some(_)) if *g > 0.0 => Some(100.0),
            _ => None,
        })
        .collect();
    out.push(("rsi_14", rsi));

    let fast = ewm_mean(&px.close, 12);
    let slow = ewm_mean(&px.close, 26);
    let dif: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let dea = ewm_mean(&dif, 9);
    out.push(("macd_dif", lift(&dif)));
    out.push(("macd_dea", lift(&dea)));

    let close = lift(&px.close);
    let ma20 = rolling_mean(&close, 20);
    let std20 = rolling_std(&close, 20);
    // (upper - lower) / mid with bands at mid +/- 2 std
    out.push((
        "bollinger_width",
        zip_with(&std20, &ma20, |s, m| 4.0 * s / m),
    ));

    let volume = lift(&px.volume);
    out.push((
        "volume_ma_deviation",
        zip_with(&volume, &px.volume_ma20, |v, m| v / m - 1.0),
    ));

    out.push((
        "price_volume_corr",
        rolling_corr(&px.close, &px.volume, 20),
    ));

    let gap_flags: Vec<bool> = (0..n)
        .map(|i| {
            i > 0 && {
                let prev = px.close[i - 1];
                ((px.open[i] - prev) / prev).abs() > GAP_THRESHOLD
            }
        })
        .collect();
    out.push(("gap_frequency", rolling_rate(&gap_flags, 60)));
}

fn money_flow_factors(px: &PriceColumns, out: &mut Columns) {
    let n = px.len();
    let amount = lift(&px.amount);
    out.push((
        "amount_trend",
        zip_with(
            &rolling_mean(&amount, 20),
            &rolling_mean(&amount, 60),
            |short, long| short / long - 1.0,
        ),
    ));

    let volume = lift(&px.volume);
    out.push((
        "volume_expansion",
        zip_with(&rolling_mean(&volume, 5), &px.volume_ma20, |a, b| a / b),
    ));

    let up_on_volume: Vec<bool> = (0..n)
        .map(|i| px.daily_return[i].is_some_and(|r| r > 0.0) && px.volume_above(i, 1.0))
        .collect();
    out.push(("money_flow_continuity", rolling_rate(&up_on_volume, 10)));
    out.push(("volume_price_up_prob", rolling_rate(&up_on_volume, 60)));

    // Uses the following bar's return, so the last row never qualifies.
    let pullback: Vec<bool> = (0..n)
        .map(|i| {
            px.near_high(i)
                && px.volume_above(i, HIGH_VOLUME_MULTIPLE)
                && px
                    .daily_return
                    .get(i + 1)
                    .copied()
                    .flatten()
                    .is_some_and(|r| r < 0.0)
        })
        .collect();
    out.push(("high_volume_pullback_prob", rolling_rate(&pullback, 60)));

    out.push((
        "volume_concentration",
        zip_with(
            &rolling_std(&volume, 20),
            &px.volume_ma20,
            |s, m| s / m,
        ),
    ));
}

fn chip_factors(px: &PriceColumns, out: &mut Columns) {
    let n = px.len();
    let volume = lift(&px.volume);
    let turnover = zip_with(&volume, &rolling_mean(&volume, 60), |v, m| v / m);
    let turnover_vol = rolling_std(&turnover, 20);

    let close = lift(&px.close);
    let chip = zip_with(
        &rolling_std(&close, 20),
        &rolling_mean(&close, 20),
        |s, m| s / m,
    );

    let turnover_at_high: Vec<bool> = (0..n)
        .map(|i| px.near_high(i) && turnover[i].is_some_and(|t| t > HIGH_TURNOVER))
        .collect();

    let stability = turnover_vol
        .iter()
        .map(|v| v.and_then(|s| finite(1.0 / (1.0 + s))))
        .collect();
    let divergence = zip_with(&rolling_std(&px.daily_return, 20), &turnover_vol, |p, t| {
        p - t
    });

    out.push(("turnover", turnover));
    out.push(("turnover_volatility", turnover_vol));
    out.push(("chip_concentration", chip));
    out.push(("high_turnover_at_high", rolling_rate(&turnover_at_high, 20)));
    out.push(("holding_stability", stability));
    out.push(("vol_turnover_divergence", divergence));
}
