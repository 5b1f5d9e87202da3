use crate::config::Config;
use quantscope_domain::services::backtest::{BacktestParams, DEFAULT_SIGNAL};
use quantscope_domain::services::factors::factor_group;
use quantscope_domain::services::models::ModelKind;
use quantscope_domain::value_objects::period::{LookbackPeriod, DEFAULT_WARMUP_BARS};
use quantscope_domain::value_objects::price_bar::PriceSeries;
use sha2::{Digest, Sha256};

pub fn resolve_period(config: &Config) -> LookbackPeriod {
    config
        .run
        .period
        .as_deref()
        .map(LookbackPeriod::parse)
        .unwrap_or_default()
}

pub fn resolve_warmup_bars(config: &Config) -> usize {
    config.run.warmup_bars.unwrap_or(DEFAULT_WARMUP_BARS)
}

pub fn resolve_model_kind(config: &Config) -> ModelKind {
    config
        .model
        .as_ref()
        .and_then(|model| model.kind.as_deref())
        .map(ModelKind::parse)
        .unwrap_or_default()
}

pub fn resolve_signal(config: &Config) -> Result<String, String> {
    let signal = config
        .backtest
        .as_ref()
        .and_then(|bt| bt.signal.as_deref())
        .unwrap_or(DEFAULT_SIGNAL)
        .trim()
        .to_string();
    if factor_group(&signal).is_none() {
        return Err(format!("backtest.signal {signal} is not a known factor"));
    }
    Ok(signal)
}

pub fn resolve_backtest_params(config: &Config) -> Result<BacktestParams, String> {
    let defaults = BacktestParams::default();
    let params = match config.backtest.as_ref() {
        Some(bt) => BacktestParams {
            long_threshold: bt.long_threshold.unwrap_or(defaults.long_threshold),
            short_threshold: bt.short_threshold.unwrap_or(defaults.short_threshold),
            risk_free_rate: bt.risk_free_rate.unwrap_or(defaults.risk_free_rate),
        },
        None => defaults,
    };
    params
        .validate()
        .map_err(|err| format!("invalid [backtest] section: {err}"))?;
    Ok(params)
}

pub fn factors_csv_enabled(config: &Config) -> bool {
    config
        .report
        .as_ref()
        .and_then(|report| report.factors_csv)
        .unwrap_or(false)
}

/// SHA-256 over the canonical CSV rendering of the bars, lowercase hex.
pub fn series_fingerprint(series: &PriceSeries) -> String {
    let mut hasher = Sha256::new();
    hasher.update(series.symbol().as_bytes());
    hasher.update(b"\n");
    for bar in series.bars() {
        let line = format!(
            "{},{},{},{},{},{},{}\n",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume, bar.amount
        );
        hasher.update(line.as_bytes());
    }
    to_hex(&hasher.finalize()[..])
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
