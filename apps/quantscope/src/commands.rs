use quantscope_application::analysis::{analyze_batch, run_analysis, AnalysisSettings};
use quantscope_application::config::{self, Config};
use quantscope_application::portfolio::{optimize_portfolio, OptimizationMethod};
use quantscope_application::reporting::{self, format_batch_table, ReportMeta};
use quantscope_application::research::{backtest_symbol, compute_factor_table, train_symbol};
use quantscope_application::validation::validate;
use quantscope_domain::repositories::market_data::validate_symbol;
use quantscope_domain::services::factors::factor_group;
use quantscope_domain::services::models::ModelKind;
use quantscope_infrastructure::artifacts::FilesystemArtifactWriter;
use quantscope_infrastructure::market_data::csv_prices::CsvPriceRepository;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum Command {
    Analyze {
        symbol: Option<String>,
        out: Option<PathBuf>,
    },
    Batch {
        json: bool,
    },
    Factors {
        symbol: String,
        csv: Option<PathBuf>,
    },
    Train {
        symbol: String,
        model: Option<String>,
    },
    Backtest {
        symbol: String,
        signal: Option<String>,
    },
    Optimize {
        method: String,
    },
    Validate {
        strict: bool,
    },
}

impl Command {
    /// Metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analyze { .. } => "analyze",
            Self::Batch { .. } => "batch",
            Self::Factors { .. } => "factors",
            Self::Train { .. } => "train",
            Self::Backtest { .. } => "backtest",
            Self::Optimize { .. } => "optimize",
            Self::Validate { .. } => "validate",
        }
    }
}

/// What a command leaves on stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Json(serde_json::Value),
    Text(String),
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|err| format!("failed to serialize output: {err}"))
}

fn supplier_for(config: &Config) -> CsvPriceRepository {
    CsvPriceRepository::new(&config.paths.data_dir)
}

fn symbol_arg(config: &Config, symbol: &str) -> Result<String, String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(format!(
            "--symbol must not be empty (configured: {})",
            config.run.symbols.join(", ")
        ));
    }
    validate_symbol(symbol).map_err(|err| format!("--symbol: {err}"))?;
    Ok(symbol.to_string())
}

pub fn run_command(config_path: &Path, command: Command) -> Result<CommandOutput, String> {
    let name = command.name();
    let start = Instant::now();
    let result = dispatch(config_path, command);
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!("quantscope.cli.commands_total", "command" => name, "result" => result_label)
        .increment(1);
    metrics::histogram!("quantscope.cli.command_ms", "command" => name)
        .record(start.elapsed().as_millis() as f64);
    result
}

fn dispatch(config_path: &Path, command: Command) -> Result<CommandOutput, String> {
    let (mut config, config_toml) = config::load_config_with_source(config_path)?;
    let supplier = supplier_for(&config);

    match command {
        Command::Analyze { symbol, out } => {
            if let Some(symbol) = symbol {
                config.run.symbols = vec![symbol_arg(&config, &symbol)?];
            }
            let artifacts = FilesystemArtifactWriter::new();
            let run_dir = run_analysis(&config, &config_toml, out, &supplier, &artifacts)?;
            let report_name = if config.run.symbols.len() == 1 {
                "analysis.json"
            } else {
                "batch.json"
            };
            Ok(CommandOutput::Json(serde_json::json!({
                "run_dir": run_dir.display().to_string(),
                "report_json": run_dir.join(report_name).display().to_string(),
                "config_snapshot_toml": run_dir.join("config_snapshot.toml").display().to_string(),
            })))
        }
        Command::Batch { json } => {
            let settings = AnalysisSettings::from_config(&config)?;
            let batch = analyze_batch(&config.run.symbols, &settings, &supplier);
            if json {
                let meta = ReportMeta::new(&config.run.run_id, &settings);
                Ok(CommandOutput::Json(reporting::batch_json(&batch, &meta)?))
            } else {
                Ok(CommandOutput::Text(format_batch_table(&batch)))
            }
        }
        Command::Factors { symbol, csv } => {
            let symbol = symbol_arg(&config, &symbol)?;
            let settings = AnalysisSettings::from_config(&config)?;
            let artifacts = FilesystemArtifactWriter::new();
            let table =
                compute_factor_table(&symbol, &settings, &supplier, csv.as_deref(), &artifacts)?;
            Ok(CommandOutput::Json(to_json(&table)?))
        }
        Command::Train { symbol, model } => {
            let symbol = symbol_arg(&config, &symbol)?;
            let mut settings = AnalysisSettings::from_config(&config)?;
            if let Some(model) = model {
                settings.model_kind = ModelKind::parse(&model);
            }
            let summary = train_symbol(&symbol, &settings, &supplier)?;
            Ok(CommandOutput::Json(to_json(&summary)?))
        }
        Command::Backtest { symbol, signal } => {
            let symbol = symbol_arg(&config, &symbol)?;
            let mut settings = AnalysisSettings::from_config(&config)?;
            if let Some(signal) = signal {
                let signal = signal.trim().to_string();
                if factor_group(&signal).is_none() {
                    return Err(format!("--signal {signal} is not a known factor"));
                }
                settings.signal = signal;
            }
            let report = backtest_symbol(&symbol, &settings, &supplier)?;
            Ok(CommandOutput::Json(to_json(&report)?))
        }
        Command::Optimize { method } => {
            let settings = AnalysisSettings::from_config(&config)?;
            let allocation = optimize_portfolio(
                &config.run.symbols,
                OptimizationMethod::parse(&method),
                &settings,
                &supplier,
            )?;
            Ok(CommandOutput::Json(to_json(&allocation)?))
        }
        Command::Validate { strict } => {
            let report = validate(&config, strict, &supplier)?;
            Ok(CommandOutput::Json(to_json(&report)?))
        }
    }
}
