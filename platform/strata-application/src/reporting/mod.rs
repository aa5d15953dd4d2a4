use crate::optimization::OptimizationResult;
use crate::shared::{params_hash, ts_rfc3339};
use crate::validation::ValidationResult;
use std::path::Path;
use strata_domain::entities::metrics::Metrics;
use strata_domain::value_objects::params::Params;

pub const OPTIMIZATION_JSON: &str = "optimization.json";
pub const TRIALS_CSV: &str = "trials.csv";
pub const LEADERBOARD_CSV: &str = "leaderboard.csv";
pub const VALIDATION_JSON: &str = "validation.json";
pub const WINDOWS_CSV: &str = "windows.csv";
pub const CONFIG_SNAPSHOT: &str = "config.toml";

/// Writes `optimization.json`, `trials.csv` and `leaderboard.csv` into `dir`.
pub fn write_optimization_report(dir: &Path, result: &OptimizationResult) -> Result<(), String> {
    ensure_dir(dir)?;
    write_json(&dir.join(OPTIMIZATION_JSON), result)?;
    write_trials_csv(dir, result)?;
    write_leaderboard_csv(dir, result)?;
    tracing::info!(dir = %dir.display(), trials = result.records.len(), "optimization report written");
    Ok(())
}

/// Writes `validation.json` and `windows.csv` into `dir`.
pub fn write_validation_report(dir: &Path, result: &ValidationResult) -> Result<(), String> {
    ensure_dir(dir)?;
    write_json(&dir.join(VALIDATION_JSON), result)?;
    write_windows_csv(dir, result)?;
    tracing::info!(dir = %dir.display(), windows = result.windows.len(), "validation report written");
    Ok(())
}

pub fn write_config_snapshot(dir: &Path, source: &str) -> Result<(), String> {
    ensure_dir(dir)?;
    let path = dir.join(CONFIG_SNAPSHOT);
    std::fs::write(&path, source)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))
}

fn ensure_dir(dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("failed to create {}: {err}", dir.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize {}: {err}", path.display()))?;
    std::fs::write(path, json).map_err(|err| format!("failed to write {}: {err}", path.display()))
}

fn params_json(params: &Params) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

fn metric_cell(metrics: Option<&Metrics>, f: impl Fn(&Metrics) -> String) -> String {
    metrics.map(f).unwrap_or_default()
}

fn write_trials_csv(dir: &Path, result: &OptimizationResult) -> Result<(), String> {
    let path = dir.join(TRIALS_CSV);
    let mut wtr = csv::Writer::from_path(&path)
        .map_err(|err| format!("failed to create {}: {err}", path.display()))?;
    wtr.write_record([
        "trial_id",
        "params_hash",
        "parameters",
        "valid",
        "objective_value",
        "best_so_far",
        "total_trades",
        "win_rate",
        "net_profit",
        "sharpe_ratio",
        "max_drawdown_pct",
        "elapsed_ms",
        "reason",
    ])
    .map_err(|err| format!("failed to write trials header: {err}"))?;

    for (record, best) in result.records.iter().zip(&result.convergence) {
        let m = record.metrics.as_ref();
        let row = vec![
            record.trial_id.to_string(),
            params_hash(&record.parameters),
            params_json(&record.parameters),
            record.valid.to_string(),
            format!("{}", record.objective_value),
            best.map(|b| format!("{b}")).unwrap_or_default(),
            metric_cell(m, |m| m.total_trades.to_string()),
            metric_cell(m, |m| format!("{}", m.win_rate)),
            metric_cell(m, |m| format!("{}", m.net_profit)),
            metric_cell(m, |m| format!("{}", m.sharpe_ratio)),
            metric_cell(m, |m| format!("{}", m.max_drawdown_pct)),
            record.elapsed_ms.to_string(),
            record.reason.clone().unwrap_or_default(),
        ];
        wtr.write_record(row)
            .map_err(|err| format!("failed to write trials row: {err}"))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush {}: {err}", path.display()))?;
    Ok(())
}

fn write_leaderboard_csv(dir: &Path, result: &OptimizationResult) -> Result<(), String> {
    let path = dir.join(LEADERBOARD_CSV);
    let mut wtr = csv::Writer::from_path(&path)
        .map_err(|err| format!("failed to create {}: {err}", path.display()))?;
    wtr.write_record([
        "rank",
        "trial_id",
        result.objective.as_str(),
        "parameters",
        "total_trades",
        "win_rate",
        "net_profit",
        "sharpe_ratio",
        "max_drawdown_pct",
    ])
    .map_err(|err| format!("failed to write leaderboard header: {err}"))?;

    for (rank, record) in result.leaderboard().into_iter().enumerate() {
        let m = record.metrics.as_ref();
        let row = vec![
            (rank + 1).to_string(),
            record.trial_id.to_string(),
            format!("{}", record.objective_value),
            params_json(&record.parameters),
            metric_cell(m, |m| m.total_trades.to_string()),
            metric_cell(m, |m| format!("{}", m.win_rate)),
            metric_cell(m, |m| format!("{}", m.net_profit)),
            metric_cell(m, |m| format!("{}", m.sharpe_ratio)),
            metric_cell(m, |m| format!("{}", m.max_drawdown_pct)),
        ];
        wtr.write_record(row)
            .map_err(|err| format!("failed to write leaderboard row: {err}"))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush {}: {err}", path.display()))?;
    Ok(())
}

fn write_windows_csv(dir: &Path, result: &ValidationResult) -> Result<(), String> {
    let path = dir.join(WINDOWS_CSV);
    let mut wtr = csv::Writer::from_path(&path)
        .map_err(|err| format!("failed to create {}: {err}", path.display()))?;
    wtr.write_record([
        "window_id",
        "train_start",
        "train_end",
        "test_start",
        "test_end",
        "train_trades",
        "test_trades",
        "train_sharpe",
        "test_sharpe",
        "train_win_rate",
        "test_win_rate",
        "train_net_profit_pct",
        "test_net_profit_pct",
    ])
    .map_err(|err| format!("failed to write windows header: {err}"))?;

    for w in &result.windows {
        let (train, test) = (&w.train_metrics, &w.test_metrics);
        wtr.write_record([
            w.bounds.window_id.to_string(),
            ts_rfc3339(w.train_start_ts),
            ts_rfc3339(w.train_end_ts),
            ts_rfc3339(w.test_start_ts),
            ts_rfc3339(w.test_end_ts),
            train.total_trades.to_string(),
            test.total_trades.to_string(),
            format!("{}", train.sharpe_ratio),
            format!("{}", test.sharpe_ratio),
            format!("{}", train.win_rate),
            format!("{}", test.win_rate),
            format!("{}", train.net_profit_pct),
            format!("{}", test.net_profit_pct),
        ])
        .map_err(|err| format!("failed to write windows row: {err}"))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush {}: {err}", path.display()))?;
    Ok(())
}
