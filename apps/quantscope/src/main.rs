use clap::{Parser, Subcommand, ValueEnum};
use quantscope::commands::{run_command, Command, CommandOutput};
use quantscope::obs::{self, LogFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quantscope")]
#[command(about = "Factor analysis, model training and signal backtests for daily OHLCV data.", version)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env QUANTSCOPE_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when QUANTSCOPE_LOG is unset (e.g. `info`, `quantscope=debug`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    /// Serve Prometheus metrics on host:port. Falls back to env QUANTSCOPE_METRICS_ADDR.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Subcmd,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormatArg {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Subcmd {
    /// Full pipeline; writes report artifacts under out_dir/run_id.
    Analyze {
        /// Analyse only this symbol instead of the configured list.
        #[arg(long)]
        symbol: Option<String>,
        /// Override paths.out_dir.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyse every configured symbol (at most 10) and rank by composite score.
    Batch {
        /// Print the batch report as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Compute the factor table for one symbol.
    Factors {
        #[arg(long)]
        symbol: String,
        /// Also write the table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Train the return model for one symbol.
    Train {
        #[arg(long)]
        symbol: String,
        /// linear | rf | xgboost | lightgbm
        #[arg(long)]
        model: Option<String>,
    },
    /// Backtest a single factor as a long/short signal.
    Backtest {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        signal: Option<String>,
    },
    /// Portfolio weights across the configured symbols.
    Optimize {
        /// mean_variance | risk_parity
        #[arg(long, default_value = "mean_variance")]
        method: String,
    },
    /// Check the config and each symbol's price data.
    Validate {
        /// Fail when any symbol has data-quality findings.
        #[arg(long)]
        strict: bool,
    },
}

impl From<Subcmd> for Command {
    fn from(cmd: Subcmd) -> Self {
        match cmd {
            Subcmd::Analyze { symbol, out } => Command::Analyze { symbol, out },
            Subcmd::Batch { json } => Command::Batch { json },
            Subcmd::Factors { symbol, csv } => Command::Factors { symbol, csv },
            Subcmd::Train { symbol, model } => Command::Train { symbol, model },
            Subcmd::Backtest { symbol, signal } => Command::Backtest { symbol, signal },
            Subcmd::Optimize { method } => Command::Optimize { method },
            Subcmd::Validate { strict } => Command::Validate { strict },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogFormatArg::Text => LogFormat::Text,
        LogFormatArg::Json => LogFormat::Json,
    };
    if let Err(err) = obs::init_tracing(cli.log_level.as_deref(), format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let config_path = cli
        .config
        .or_else(|| {
            std::env::var("QUANTSCOPE_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| {
            eprintln!("error: missing --config and env QUANTSCOPE_CONFIG is not set");
            std::process::exit(1);
        });

    match run_command(&config_path, cli.command.into()) {
        Ok(CommandOutput::Json(json)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Ok(CommandOutput::Text(text)) => print!("{text}"),
        Err(err) => {
            let code = if err.contains("strict validation failed") {
                2
            } else {
                1
            };
            eprintln!("error: {err}");
            std::process::exit(code);
        }
    }
}
