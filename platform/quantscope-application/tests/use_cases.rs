use chrono::{Duration, NaiveDate};
use quantscope_application::analysis::{
    analyze_batch, run_analysis, AnalysisSettings, ModelOutcome, MAX_BATCH_SYMBOLS,
};
use quantscope_application::config::{
    BacktestConfig, Config, ModelConfig, PathsConfig, ReportConfig, RunConfig,
};
use quantscope_application::portfolio::{optimize_portfolio, OptimizationMethod, PortfolioAllocation};
use quantscope_application::research::{backtest_symbol, compute_factor_table, train_symbol};
use quantscope_application::validation::validate;
use quantscope_domain::repositories::artifacts::ArtifactWriter;
use quantscope_domain::repositories::market_data::{PriceQuery, PriceSupplier};
use quantscope_domain::services::backtest::CumulativePoint;
use quantscope_domain::services::factors::FactorPanel;
use quantscope_domain::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use quantscope_domain::value_objects::price_bar::{PriceBar, PriceSeries};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn bars(len: usize, drift: f64) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2021, 1, 4).expect("date");
    (0..len)
        .map(|i| {
            let t = i as f64;
            let close = 50.0 + drift * t + (t * 0.21).sin() * 3.0 + (t * 0.06).cos() * 1.5;
            PriceBar {
                date: start + Duration::days(i as i64),
                open: close * (1.0 + (t * 0.9).sin() * 0.01),
                high: close * 1.02,
                low: close * 0.98,
                close,
                volume: 30_000 + ((i * 53) % 17) as u64 * 1_000,
                amount: close * 30_000.0,
            }
        })
        .collect()
}

#[derive(Default)]
struct FakeSupplier {
    bars: HashMap<String, Vec<PriceBar>>,
    report_override: Option<DataQualityReport>,
}

impl FakeSupplier {
    fn with(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }
}

impl PriceSupplier for FakeSupplier {
    fn fetch_daily_bars(
        &self,
        query: &PriceQuery,
    ) -> Result<(PriceSeries, DataQualityReport), String> {
        let raw = self
            .bars
            .get(&query.symbol)
            .ok_or_else(|| format!("no data for {}", query.symbol))?;
        let report = self
            .report_override
            .clone()
            .unwrap_or_else(|| data_quality_from_bars(raw));
        let keep = raw.len().saturating_sub(query.bars_requested());
        Ok((PriceSeries::new(&query.symbol, raw[keep..].to_vec()), report))
    }
}

#[derive(Default)]
struct RecordingWriter {
    ensured_dirs: RefCell<Vec<PathBuf>>,
    json_written: RefCell<Vec<(PathBuf, serde_json::Value)>>,
    cumulative_written: RefCell<Vec<(PathBuf, usize)>>,
    factors_written: RefCell<Vec<(PathBuf, usize, usize)>>,
    config_snapshot: RefCell<Option<String>>,
}

impl ArtifactWriter for RecordingWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        self.ensured_dirs.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn write_report_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), String> {
        self.json_written
            .borrow_mut()
            .push((path.to_path_buf(), value.clone()));
        Ok(())
    }

    fn write_cumulative_csv(&self, path: &Path, points: &[CumulativePoint]) -> Result<(), String> {
        self.cumulative_written
            .borrow_mut()
            .push((path.to_path_buf(), points.len()));
        Ok(())
    }

    fn write_factors_csv(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        panel: &FactorPanel,
    ) -> Result<(), String> {
        assert_eq!(dates.len(), panel.rows());
        self.factors_written
            .borrow_mut()
            .push((path.to_path_buf(), panel.rows(), panel.columns().len()));
        Ok(())
    }

    fn write_config_snapshot_toml(&self, _path: &Path, contents: &str) -> Result<(), String> {
        *self.config_snapshot.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}

fn config(symbols: &[&str]) -> Config {
    Config {
        run: RunConfig {
            run_id: "test_run".to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            period: Some("6m".to_string()),
            warmup_bars: None,
        },
        paths: PathsConfig {
            data_dir: "data".to_string(),
            out_dir: "runs".to_string(),
        },
        model: Some(ModelConfig {
            kind: Some("linear".to_string()),
        }),
        backtest: None,
        report: None,
    }
}

fn six_month_settings() -> AnalysisSettings {
    AnalysisSettings {
        period: quantscope_domain::value_objects::period::LookbackPeriod::SixMonths,
        model_kind: quantscope_domain::services::models::ModelKind::Linear,
        ..AnalysisSettings::default()
    }
}

#[test]
fn single_symbol_run_writes_analysis_and_tables() {
    let supplier = FakeSupplier::default().with("AAPL.US", bars(250, 0.1));
    let writer = RecordingWriter::default();
    let mut cfg = config(&["AAPL.US"]);
    cfg.report = Some(ReportConfig {
        factors_csv: Some(true),
    });

    let run_dir = run_analysis(&cfg, "[run]\n", Some(PathBuf::from("out")), &supplier, &writer)
        .expect("run");
    assert_eq!(run_dir, PathBuf::from("out").join("test_run"));

    let json = writer.json_written.borrow();
    assert_eq!(json.len(), 1);
    assert!(json[0].0.ends_with("analysis.json"));
    let report = &json[0].1;
    assert_eq!(report["symbol"], "AAPL.US");
    // 6m window: 125 + 60 warm-up fetched, warm-up dropped.
    assert_eq!(report["data_points"], 125);
    assert_eq!(report["meta"]["engine"], "quantscope");
    assert_eq!(report["meta"]["model_kind"], "linear");
    assert_eq!(report["model"]["model_type"], "linear");
    assert_eq!(report["model"]["train_rows"], 96);
    assert!(report["composite_score"].is_number());
    assert_eq!(report["latest_factors"].as_object().map(|m| m.len()), Some(32));

    let cumulative = writer.cumulative_written.borrow();
    assert_eq!(cumulative.len(), 1);
    assert!(cumulative[0].1 > 0);
    let factors = writer.factors_written.borrow();
    assert_eq!(factors[0].1, 125);
    assert_eq!(factors[0].2, 32);
    assert_eq!(writer.config_snapshot.borrow().as_deref(), Some("[run]\n"));
}

#[test]
fn single_symbol_without_data_fails_with_reason() {
    let supplier = FakeSupplier::default();
    let writer = RecordingWriter::default();
    let err = run_analysis(&config(&["NONE.US"]), "", None, &supplier, &writer)
        .expect_err("missing symbol");
    assert!(err.contains("NONE.US"));
    assert!(err.contains("upstream_data_unavailable"));
    assert!(writer.json_written.borrow().is_empty());
}

#[test]
fn short_history_skips_model_but_still_reports() {
    let supplier = FakeSupplier::default().with("SHORT", bars(140, 0.05));
    let analysis = quantscope_application::analysis::analyze_symbol(
        "SHORT",
        &six_month_settings(),
        &supplier,
    )
    .expect("analysis");
    assert_eq!(analysis.report.data_points, 80);
    match &analysis.report.model {
        ModelOutcome::Skipped(failure) => assert_eq!(failure.reason, "data_insufficient"),
        other => panic!("expected skipped model, got {other:?}"),
    }
}

#[test]
fn batch_caps_symbols_records_errors_and_sorts() {
    let mut supplier = FakeSupplier::default();
    let mut symbols = Vec::new();
    for k in 0..12 {
        let symbol = format!("S{k:02}");
        if k != 3 {
            supplier = supplier.with(&symbol, bars(220, (k as f64 - 5.0) * 0.04));
        }
        symbols.push(symbol);
    }

    let batch = analyze_batch(&symbols, &six_month_settings(), &supplier);
    assert_eq!(batch.skipped_symbols, vec!["S10".to_string(), "S11".to_string()]);
    assert_eq!(batch.total_analyzed + batch.total_errors, MAX_BATCH_SYMBOLS);
    assert_eq!(batch.total_errors, 1);
    assert_eq!(batch.errors[0].symbol, "S03");
    assert_eq!(batch.errors[0].reason, "upstream_data_unavailable");
    for pair in batch.results.windows(2) {
        assert!(pair[0].scores.composite_score >= pair[1].scores.composite_score);
    }
}

#[test]
fn multi_symbol_run_writes_batch_and_per_symbol_dirs() {
    let supplier = FakeSupplier::default()
        .with("A", bars(220, 0.1))
        .with("B", bars(220, -0.05));
    let writer = RecordingWriter::default();
    run_analysis(&config(&["A", "B", "C"]), "", None, &supplier, &writer).expect("run");

    let json = writer.json_written.borrow();
    assert!(json[0].0.ends_with("batch.json"));
    assert_eq!(json[0].1["total_analyzed"], 2);
    assert_eq!(json[0].1["errors"][0]["symbol"], "C");
    let dirs = writer.ensured_dirs.borrow();
    assert!(dirs.iter().any(|d| d.ends_with("test_run/A")));
    assert!(dirs.iter().any(|d| d.ends_with("test_run/B")));
    assert!(writer.factors_written.borrow().is_empty());
}

#[test]
fn invalid_backtest_section_is_rejected_before_fetching() {
    let supplier = FakeSupplier::default();
    let writer = RecordingWriter::default();
    let mut cfg = config(&["A"]);
    cfg.backtest = Some(BacktestConfig {
        signal: Some("not_a_factor".to_string()),
        long_threshold: None,
        short_threshold: None,
        risk_free_rate: None,
    });
    let err = run_analysis(&cfg, "", None, &supplier, &writer).expect_err("bad signal");
    assert!(err.contains("not_a_factor"));
    assert!(writer.ensured_dirs.borrow().is_empty());
}

#[test]
fn research_use_cases_run_single_stages() {
    let supplier = FakeSupplier::default().with("X", bars(250, 0.08));
    let settings = six_month_settings();
    let writer = RecordingWriter::default();

    let table = compute_factor_table("X", &settings, &supplier, Some(Path::new("x.csv")), &writer)
        .expect("factors");
    assert_eq!(table.rows, 125);
    assert_eq!(table.factor_names.len(), 32);
    assert!(table.missing_before_fill > 0);
    assert_eq!(writer.factors_written.borrow().len(), 1);

    let summary = train_symbol("X", &settings, &supplier).expect("train");
    assert_eq!(summary.train_rows + summary.test_rows, 120);

    let report = backtest_symbol("X", &settings, &supplier).expect("backtest");
    assert_eq!(report.signal, "momentum_20d");
    assert_eq!(report.cumulative_returns.len(), report.n_days);

    let err = train_symbol("MISSING", &settings, &supplier).expect_err("missing");
    assert!(err.starts_with("MISSING:"));
}

#[test]
fn portfolio_methods_allocate_equal_weights() {
    let supplier = FakeSupplier::default()
        .with("A", bars(200, 0.1))
        .with("B", bars(200, 0.02));
    let symbols = vec!["A".to_string(), "B".to_string()];
    let settings = six_month_settings();

    match optimize_portfolio(&symbols, OptimizationMethod::MeanVariance, &settings, &supplier)
        .expect("mean-variance")
    {
        PortfolioAllocation::MeanVariance(mv) => {
            assert_eq!(mv.weights["A"], 0.5);
            assert_eq!(mv.weights["B"], 0.5);
            assert!(mv.expected_volatility > 0.0);
        }
        other => panic!("unexpected allocation {other:?}"),
    }
    match optimize_portfolio(&symbols, OptimizationMethod::RiskParity, &settings, &supplier)
        .expect("risk parity")
    {
        PortfolioAllocation::RiskParity(rp) => assert_eq!(rp.method, "risk_parity"),
        other => panic!("unexpected allocation {other:?}"),
    }
    assert!(optimize_portfolio(&[], OptimizationMethod::RiskParity, &settings, &supplier).is_err());
}

#[test]
fn repeated_symbols_get_one_weight_each() {
    let supplier = FakeSupplier::default()
        .with("A", bars(200, 0.1))
        .with("B", bars(200, 0.02));
    let symbols = vec!["A".to_string(), "B".to_string(), "A".to_string()];
    let settings = six_month_settings();

    for method in [OptimizationMethod::MeanVariance, OptimizationMethod::RiskParity] {
        let weights = match optimize_portfolio(&symbols, method, &settings, &supplier)
            .expect("allocation")
        {
            PortfolioAllocation::MeanVariance(mv) => mv.weights,
            PortfolioAllocation::RiskParity(rp) => rp.weights,
        };
        assert_eq!(weights.len(), 2, "{method:?}");
        assert_eq!(weights["A"], 0.5);
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn path_like_symbols_are_rejected_before_any_write() {
    let supplier = FakeSupplier::default().with("A", bars(220, 0.1));
    let writer = RecordingWriter::default();
    let err = run_analysis(&config(&["A", "../escape"]), "", None, &supplier, &writer)
        .expect_err("traversal");
    assert!(err.contains("invalid symbol"));
    assert!(writer.ensured_dirs.borrow().is_empty());
    assert!(writer.json_written.borrow().is_empty());
}

#[test]
fn strict_validation_fails_on_dirty_data() {
    let supplier = FakeSupplier {
        report_override: Some(DataQualityReport {
            rows_read: 10,
            duplicates: 2,
            ..DataQualityReport::default()
        }),
        ..FakeSupplier::default()
    }
    .with("A", bars(220, 0.1));
    let cfg = config(&["A"]);

    let lenient = validate(&cfg, false, &supplier).expect("lenient");
    assert_eq!(lenient.symbols[0].analysed_bars, 125);
    assert!(lenient.symbols[0].trainable);
    assert_eq!(
        lenient.symbols[0].data_quality.as_ref().map(|q| q.duplicates),
        Some(2)
    );

    let err = validate(&cfg, true, &supplier).expect_err("strict");
    assert!(err.contains('A'));
}
