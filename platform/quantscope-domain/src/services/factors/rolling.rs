use crate::numeric::{finite, mean, pearson, sample_std};
use std::collections::VecDeque;

/// Fixed-size trailing window over possibly-missing values.
///
/// A window yields values only once it is full and holds no missing entry,
/// which matches the `min_periods == window` convention every factor uses.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    window: usize,
    buf: VecDeque<Option<f64>>,
    missing: usize,
    scratch: Vec<f64>,
}

impl RollingWindow {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::with_capacity(window + 1),
            missing: 0,
            scratch: Vec::with_capacity(window),
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<&[f64]> {
        if self.window == 0 {
            return None;
        }

        let value = value.and_then(finite);
        if value.is_none() {
            self.missing += 1;
        }
        self.buf.push_back(value);
        while self.buf.len() > self.window {
            if let Some(None) = self.buf.pop_front() {
                self.missing -= 1;
            }
        }

        if self.buf.len() < self.window || self.missing > 0 {
            return None;
        }

        self.scratch.clear();
        self.scratch.extend(self.buf.iter().flatten());
        Some(&self.scratch)
    }
}

pub fn rolling_apply<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut rolling = RollingWindow::new(window);
    values
        .iter()
        .map(|v| rolling.update(*v).and_then(&f).and_then(finite))
        .collect()
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, mean)
}

pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, sample_std)
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, |w| w.iter().copied().reduce(f64::max))
}

/// Trailing fraction of `true` flags. Flags are never missing.
pub fn rolling_rate(flags: &[bool], window: usize) -> Vec<Option<f64>> {
    let as_values: Vec<Option<f64>> = flags
        .iter()
        .map(|flag| Some(if *flag { 1.0 } else { 0.0 }))
        .collect();
    rolling_mean(&as_values, window)
}

pub fn rolling_corr(xs: &[f64], ys: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = xs.len().min(ys.len());
    (0..n)
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            let start = i + 1 - window;
            pearson(&xs[start..=i], &ys[start..=i])
        })
        .collect()
}

/// `values[i] / values[i - periods] - 1`, missing for the first `periods` rows.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if periods == 0 || i < periods {
                return None;
            }
            finite(values[i] / values[i - periods] - 1.0)
        })
        .collect()
}

/// Bias-adjusted exponential moving average with `alpha = 2 / (span + 1)`.
///
/// Each output is the weighted mean of all observations so far with weights
/// `(1 - alpha)^age`, so the first value equals the first input.
pub fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|v| {
            num = v + decay * num;
            den = 1.0 + decay * den;
            num / den
        })
        .collect()
}

/// Element-wise combination; missing on either side, or a non-finite result,
/// yields missing.
pub fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => finite(f(*x, *y)),
            _ => None,
        })
        .collect()
}

pub fn lift(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|v| finite(*v)).collect()
}
