use crate::config::{
    parse_bound, resolve_engine_config, Config, OptimizationMethod, OptimizationSection,
    ValidationSection,
};
use crate::errors::PipelineError;
use crate::optimization::{
    BayesianOptimizer, GridSearchOptimizer, OptimizationHooks, OptimizationRequest,
    OptimizationResult, Optimizer, RandomSearchOptimizer,
};
use crate::reporting;
use crate::validation::{ValidationResult, WalkForwardValidator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_domain::repositories::candles::{CandleQuery, CandleRepository};
use strata_domain::services::engine::BacktestEngine;
use strata_domain::services::strategy::{StrategyFactory, StrategyRegistry};
use strata_domain::value_objects::candle::Candle;
use strata_domain::value_objects::params::Params;

pub fn build_optimizer(section: &OptimizationSection) -> Box<dyn Optimizer> {
    match section.method {
        OptimizationMethod::Grid => Box::new(GridSearchOptimizer::new(section.grid_config())),
        OptimizationMethod::Random => Box::new(RandomSearchOptimizer::new(section.random_config())),
        OptimizationMethod::Bayesian => Box::new(BayesianOptimizer::new(section.bayesian_config())),
    }
}

/// Search for the best parameters with the method named by `section`.
/// `base_parameters` are merged under every trial.
pub fn run_optimization(
    section: &OptimizationSection,
    engine: &BacktestEngine,
    candles: &[Candle],
    strategy: &dyn StrategyFactory,
    base_parameters: &Params,
    mut hooks: OptimizationHooks<'_>,
) -> Result<OptimizationResult, PipelineError> {
    let mut request = OptimizationRequest::new(engine, candles, strategy)
        .with_base_parameters(base_parameters.clone());
    if let Some(space) = &section.parameter_space {
        request = request.with_parameter_space(space.clone());
    }
    if let Some(objective) = &section.objective {
        request = request.with_objective(objective.clone());
    }
    if let Some(min_trades) = section.min_trades {
        request = request.with_min_trades(min_trades);
    }
    if hooks.min_progress_interval.is_none() {
        hooks.min_progress_interval = section.progress_interval_ms.map(Duration::from_millis);
    }
    build_optimizer(section).optimize(&request, hooks)
}

pub fn run_validation(
    section: &ValidationSection,
    parameters: &Params,
    engine: &BacktestEngine,
    candles: &[Candle],
    strategy: &dyn StrategyFactory,
) -> Result<ValidationResult, PipelineError> {
    WalkForwardValidator::new(section.walk_forward_config())
        .validate(parameters, candles, strategy, engine)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub optimization: OptimizationResult,
    pub validation: ValidationResult,
}

/// Optimizes on the full series, then walk-forward validates the winner.
pub fn run_pipeline(
    optimization: &OptimizationSection,
    validation: &ValidationSection,
    engine: &BacktestEngine,
    candles: &[Candle],
    strategy: &dyn StrategyFactory,
    base_parameters: &Params,
    hooks: OptimizationHooks<'_>,
) -> Result<PipelineResult, PipelineError> {
    let optimization = run_optimization(optimization, engine, candles, strategy, base_parameters, hooks)?;
    let validation = run_validation(
        validation,
        &optimization.best_parameters,
        engine,
        candles,
        strategy,
    )?;
    Ok(PipelineResult {
        optimization,
        validation,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Optimize,
    Validate,
    Pipeline,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Optimize => "optimize",
            RunMode::Validate => "validate",
            RunMode::Pipeline => "pipeline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub candles: usize,
    pub optimization: Option<OptimizationResult>,
    pub validation: Option<ValidationResult>,
}

/// Config-driven run: loads candles, executes `mode` and writes reports under
/// `<out_dir>/<run_id>/`. Reports of a finished optimization are written
/// before validation starts.
pub fn execute(
    config: &Config,
    config_source: &str,
    repository: &dyn CandleRepository,
    registry: &StrategyRegistry,
    mode: RunMode,
    hooks: OptimizationHooks<'_>,
) -> Result<RunSummary, String> {
    let _span = tracing::info_span!("run", run_id = %config.run.run_id, mode = mode.as_str()).entered();

    let strategy = registry.get(&config.strategy.id).map_err(|err| err.to_string())?;
    let engine = BacktestEngine::new(resolve_engine_config(config.engine.as_ref()))
        .map_err(|err| err.to_string())?;

    let mut query = CandleQuery::new(&config.paths.candles);
    query.start = parse_bound(config.run.start.as_deref())?;
    query.end = parse_bound(config.run.end.as_deref())?;
    let candles = repository.load_candles(&query)?;
    tracing::info!(candles = candles.len(), path = %config.paths.candles, "candles loaded");

    let run_dir = Path::new(&config.paths.out_dir).join(&config.run.run_id);
    reporting::write_config_snapshot(&run_dir, config_source)?;

    let validation_section = config.validation.clone().unwrap_or_default();
    let mut summary = RunSummary {
        run_dir: run_dir.clone(),
        candles: candles.len(),
        optimization: None,
        validation: None,
    };

    let parameters = match mode {
        RunMode::Validate => {
            let mut params = strategy.default_parameters();
            params.extend(config.strategy.params.clone());
            params
        }
        RunMode::Optimize | RunMode::Pipeline => {
            let section = config
                .optimization
                .as_ref()
                .ok_or_else(|| "missing [optimization] section".to_string())?;
            let result = run_optimization(
                section,
                &engine,
                &candles,
                strategy,
                &config.strategy.params,
                hooks,
            )
            .map_err(|err| err.to_string())?;
            reporting::write_optimization_report(&run_dir, &result)?;
            let best = result.best_parameters.clone();
            summary.optimization = Some(result);
            if mode == RunMode::Optimize {
                return Ok(summary);
            }
            best
        }
    };

    let validation = run_validation(&validation_section, &parameters, &engine, &candles, strategy)
        .map_err(|err| err.to_string())?;
    reporting::write_validation_report(&run_dir, &validation)?;
    summary.validation = Some(validation);
    Ok(summary)
}
