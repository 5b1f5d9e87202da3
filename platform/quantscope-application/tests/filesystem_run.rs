use chrono::{Duration, NaiveDate};
use quantscope_application::analysis::run_analysis;
use quantscope_application::config::load_config_with_source;
use quantscope_infrastructure::artifacts::FilesystemArtifactWriter;
use quantscope_infrastructure::market_data::csv_prices::CsvPriceRepository;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_suffix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}_{}", std::process::id(), now)
}

fn write_prices(dir: &Path, symbol: &str, len: usize, drift: f64) {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).expect("date");
    let mut csv_data = String::from("date,open,high,low,close,volume,amount\n");
    for i in 0..len {
        let t = i as f64;
        let close = 30.0 + drift * t + (t * 0.19).sin() * 2.0;
        let date = start + Duration::days(i as i64);
        csv_data.push_str(&format!(
            "{date},{:.4},{:.4},{:.4},{:.4},{},{:.2}\n",
            close * 0.995,
            close * 1.01,
            close * 0.99,
            close,
            10_000 + (i * 31) % 4_000,
            close * 10_000.0
        ));
    }
    fs::write(dir.join(format!("{symbol}.csv")), csv_data).expect("write prices");
}

fn write_config(root: &Path, symbols: &[&str]) -> PathBuf {
    let symbols = symbols
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"[run]
run_id = "fs_run"
symbols = [{symbols}]
period = "6m"

[paths]
data_dir = "{data}"
out_dir = "{out}"

[model]
kind = "xgboost"

[report]
factors_csv = true
"#,
        data = root.join("data").display(),
        out = root.join("runs").display(),
    );
    let path = root.join("config.toml");
    fs::write(&path, toml).expect("write config");
    path
}

#[test]
fn csv_data_to_report_files_single_symbol() {
    let root = std::env::temp_dir().join(format!("quantscope_fs_single_{}", unique_suffix()));
    fs::create_dir_all(root.join("data")).expect("mkdir");
    write_prices(&root.join("data"), "AAPL.US", 260, 0.05);
    let (config, source) =
        load_config_with_source(&write_config(&root, &["AAPL.US"])).expect("config");

    let supplier = CsvPriceRepository::new(&config.paths.data_dir);
    let run_dir = run_analysis(&config, &source, None, &supplier, &FilesystemArtifactWriter::new())
        .expect("run");

    assert_eq!(run_dir, root.join("runs").join("fs_run"));
    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(run_dir.join("analysis.json")).expect("read analysis"),
    )
    .expect("json");
    assert_eq!(report["symbol"], "AAPL.US");
    assert_eq!(report["model"]["model_type"], "xgboost");
    assert_eq!(report["series_sha256"].as_str().map(str::len), Some(64));

    let cumulative = fs::read_to_string(run_dir.join("cumulative_returns.csv")).expect("csv");
    assert!(cumulative.starts_with("date,cumulative_market,cumulative_strategy\n"));
    let factors = fs::read_to_string(run_dir.join("factors.csv")).expect("factors");
    assert_eq!(factors.lines().count(), 126);
    assert_eq!(
        fs::read_to_string(run_dir.join("config_snapshot.toml")).expect("snapshot"),
        source
    );
}

#[test]
fn csv_data_to_report_files_batch() {
    let root = std::env::temp_dir().join(format!("quantscope_fs_batch_{}", unique_suffix()));
    fs::create_dir_all(root.join("data")).expect("mkdir");
    write_prices(&root.join("data"), "A", 220, 0.08);
    write_prices(&root.join("data"), "B", 220, -0.02);
    let (config, source) =
        load_config_with_source(&write_config(&root, &["A", "B", "MISSING"])).expect("config");

    let supplier = CsvPriceRepository::new(&config.paths.data_dir);
    let run_dir = run_analysis(&config, &source, None, &supplier, &FilesystemArtifactWriter::new())
        .expect("run");

    let batch: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(run_dir.join("batch.json")).expect("read batch"),
    )
    .expect("json");
    assert_eq!(batch["total_analyzed"], 2);
    assert_eq!(batch["total_errors"], 1);
    assert_eq!(batch["errors"][0]["reason"], "upstream_data_unavailable");
    assert!(run_dir.join("A").join("factors.csv").exists());
    assert!(run_dir.join("B").join("cumulative_returns.csv").exists());
}
