mod common;

use common::{wavy_candles, PeriodicFactory, HOUR_MS};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_application::config::Config;
use strata_application::optimization::OptimizationHooks;
use strata_application::pipeline::{execute, RunMode};
use strata_application::reporting::{
    CONFIG_SNAPSHOT, LEADERBOARD_CSV, OPTIMIZATION_JSON, TRIALS_CSV, VALIDATION_JSON, WINDOWS_CSV,
};
use strata_domain::services::strategy::StrategyRegistry;
use strata_infrastructure::market_data::CsvCandleRepository;

fn unique_tmp_dir(name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("strata_{name}_{}_{}", std::process::id(), now))
}

fn write_candles(path: &PathBuf, n: usize) {
    let mut data = String::from("timestamp,open,high,low,close,volume\n");
    for c in wavy_candles(n, HOUR_MS) {
        data.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp, c.open, c.high, c.low, c.close, c.volume
        ));
    }
    fs::write(path, data).expect("write candles");
}

fn registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register(Box::new(PeriodicFactory::choices()));
    registry
}

fn config_source(candles: &PathBuf, out_dir: &PathBuf) -> String {
    format!(
        r#"
[run]
run_id = "periodic_e2e"

[paths]
candles = "{}"
out_dir = "{}"

[strategy]
id = "periodic"

[optimization]
method = "grid"
min_trades = 5
parallelism = 2

[validation]
train_window_days = 10.0
test_window_days = 5.0
gap_days = 1.0
"#,
        candles.display(),
        out_dir.display()
    )
}

#[test]
fn pipeline_run_writes_every_report() {
    let root = unique_tmp_dir("e2e");
    fs::create_dir_all(&root).expect("temp dir");
    let candles_path = root.join("candles.csv");
    write_candles(&candles_path, 1_000);
    let out_dir = root.join("runs");

    let source = config_source(&candles_path, &out_dir);
    let config: Config = toml::from_str(&source).expect("config");
    let summary = execute(
        &config,
        &source,
        &CsvCandleRepository::new(),
        &registry(),
        RunMode::Pipeline,
        OptimizationHooks::default(),
    )
    .expect("pipeline run");

    assert_eq!(summary.candles, 1_000);
    assert_eq!(summary.run_dir, out_dir.join("periodic_e2e"));
    let optimization = summary.optimization.expect("optimization");
    let validation = summary.validation.expect("validation");
    assert_eq!(validation.parameters, optimization.best_parameters);

    for name in [
        CONFIG_SNAPSHOT,
        OPTIMIZATION_JSON,
        TRIALS_CSV,
        LEADERBOARD_CSV,
        VALIDATION_JSON,
        WINDOWS_CSV,
    ] {
        assert!(summary.run_dir.join(name).exists(), "missing {name}");
    }

    let trials = fs::read_to_string(summary.run_dir.join(TRIALS_CSV)).expect("trials");
    assert_eq!(trials.lines().count(), 1 + 4);
    assert!(trials.starts_with("trial_id,params_hash,parameters"));

    let windows = fs::read_to_string(summary.run_dir.join(WINDOWS_CSV)).expect("windows");
    assert_eq!(windows.lines().count(), 1 + validation.windows.len());

    let json = fs::read_to_string(summary.run_dir.join(OPTIMIZATION_JSON)).expect("json");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(parsed["method"], "grid");
    assert_eq!(parsed["records"].as_array().map(Vec::len), Some(4));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn validate_mode_uses_configured_parameters() {
    let root = unique_tmp_dir("validate");
    fs::create_dir_all(&root).expect("temp dir");
    let candles_path = root.join("candles.csv");
    write_candles(&candles_path, 1_000);
    let out_dir = root.join("runs");

    let source = config_source(&candles_path, &out_dir).replace(
        "id = \"periodic\"",
        "id = \"periodic\"\nparams = { x = 2 }",
    );
    let config: Config = toml::from_str(&source).expect("config");
    let summary = execute(
        &config,
        &source,
        &CsvCandleRepository::new(),
        &registry(),
        RunMode::Validate,
        OptimizationHooks::default(),
    )
    .expect("validate run");

    assert!(summary.optimization.is_none());
    let validation = summary.validation.expect("validation");
    assert_eq!(
        validation.parameters.get("x").and_then(|v| v.as_i64()),
        Some(2)
    );
    assert!(!summary.run_dir.join(TRIALS_CSV).exists());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unknown_strategy_is_reported() {
    let root = unique_tmp_dir("unknown");
    let source = config_source(&root.join("missing.csv"), &root)
        .replace("id = \"periodic\"", "id = \"martingale\"");
    let config: Config = toml::from_str(&source).expect("config");
    let err = execute(
        &config,
        &source,
        &CsvCandleRepository::new(),
        &registry(),
        RunMode::Optimize,
        OptimizationHooks::default(),
    )
    .expect_err("unknown strategy");
    assert!(err.contains("martingale"), "{err}");
}
