use std::path::PathBuf;
use std::time::Duration;
use strata_application::config::{load_config_with_source, OptimizationMethod, OptimizationSection};
use strata_application::optimization::{OptimizationHooks, Progress};
use strata_application::pipeline::{execute, RunMode, RunSummary};
use strata_domain::services::strategy::StrategyRegistry;
use strata_infrastructure::market_data::CsvCandleRepository;

const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

pub struct SearchOverrides {
    pub method: Option<OptimizationMethod>,
    pub parallelism: Option<usize>,
}

pub enum Command {
    Optimize { config: PathBuf, overrides: SearchOverrides },
    Validate { config: PathBuf },
    Pipeline { config: PathBuf, overrides: SearchOverrides },
    Strategies,
}

pub fn run(command: Command) -> Result<serde_json::Value, String> {
    match command {
        Command::Optimize { config, overrides } => run_mode(config, RunMode::Optimize, overrides),
        Command::Validate { config } => run_mode(
            config,
            RunMode::Validate,
            SearchOverrides {
                method: None,
                parallelism: None,
            },
        ),
        Command::Pipeline { config, overrides } => run_mode(config, RunMode::Pipeline, overrides),
        Command::Strategies => Ok(list_strategies()),
    }
}

fn run_mode(
    config_path: PathBuf,
    mode: RunMode,
    overrides: SearchOverrides,
) -> Result<serde_json::Value, String> {
    let (mut config, config_toml) = load_config_with_source(&config_path)?;
    if let Some(method) = overrides.method {
        let section = config
            .optimization
            .get_or_insert_with(|| OptimizationSection::new(method));
        section.method = method;
    }
    if let Some(parallelism) = overrides.parallelism {
        if let Some(section) = config.optimization.as_mut() {
            section.parallelism = Some(parallelism);
        }
    }

    let registry = StrategyRegistry::with_builtins();
    let repository = CsvCandleRepository::new();
    let mut on_progress = |p: Progress| {
        tracing::info!(
            completed = p.completed,
            total = p.total,
            latest_objective = p.latest_objective,
            "optimization progress"
        );
    };
    let hooks = OptimizationHooks {
        on_progress: Some(&mut on_progress),
        should_cancel: None,
        min_progress_interval: config
            .optimization
            .as_ref()
            .and_then(|s| s.progress_interval_ms)
            .map(Duration::from_millis)
            .or(Some(DEFAULT_PROGRESS_INTERVAL)),
    };

    let summary = execute(&config, &config_toml, &repository, &registry, mode, hooks)?;
    Ok(summary_json(&config.run.run_id, mode, &summary))
}

fn summary_json(run_id: &str, mode: RunMode, summary: &RunSummary) -> serde_json::Value {
    let optimization = summary.optimization.as_ref().map(|opt| {
        serde_json::json!({
            "method": opt.method,
            "objective": opt.objective.as_str(),
            "best_trial_id": opt.best_trial_id,
            "best_objective": opt.best_objective,
            "best_parameters": opt.best_parameters,
            "trials": opt.stats.total_evaluations,
            "valid_trials": opt.stats.valid_evaluations,
            "elapsed_ms": opt.stats.elapsed_ms,
        })
    });
    let validation = summary.validation.as_ref().map(|val| {
        serde_json::json!({
            "windows": val.windows.len(),
            "stability_score": val.stability_score,
            "overfitting_detected": val.overfitting_detected,
            "overfitting_reasons": val.overfitting_reasons,
            "test_sharpe_mean": val.aggregate_metrics.test.sharpe_mean,
        })
    });
    serde_json::json!({
        "status": "ok",
        "mode": mode.as_str(),
        "run_id": run_id,
        "run_dir": summary.run_dir.display().to_string(),
        "candles": summary.candles,
        "optimization": optimization,
        "validation": validation,
    })
}

fn list_strategies() -> serde_json::Value {
    let registry = StrategyRegistry::with_builtins();
    let strategies: Vec<serde_json::Value> = registry
        .names()
        .filter_map(|name| registry.get(name).ok())
        .map(|factory| {
            serde_json::json!({
                "id": factory.name(),
                "parameter_space": factory.parameter_space(),
                "defaults": factory.default_parameters(),
            })
        })
        .collect();
    serde_json::json!({ "status": "ok", "strategies": strategies })
}
