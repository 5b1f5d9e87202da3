use quantscope_domain::repositories::market_data::validate_symbol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub paths: PathsConfig,
    pub model: Option<ModelConfig>,
    pub backtest: Option<BacktestConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub symbols: Vec<String>,
    /// `6m`, `1y`, `2y` or `3y`; anything else means `3y`.
    pub period: Option<String>,
    pub warmup_bars: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory holding one `<SYMBOL>.csv` per symbol.
    pub data_dir: String,
    pub out_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub signal: Option<String>,
    pub long_threshold: Option<f64>,
    pub short_threshold: Option<f64>,
    pub risk_free_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub factors_csv: Option<bool>,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    validate_config(&config)
        .map_err(|err| format!("invalid config {}: {}", path.display(), err))?;
    Ok((config, contents))
}

/// `run_id` and every symbol end up as path components under the output
/// and data directories.
pub fn validate_config(config: &Config) -> Result<(), String> {
    validate_symbol(&config.run.run_id).map_err(|err| format!("run.run_id: {err}"))?;
    for symbol in &config.run.symbols {
        validate_symbol(symbol).map_err(|err| format!("run.symbols: {err}"))?;
    }
    Ok(())
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}
