pub mod bayesian;
mod executor;
pub mod grid;
pub mod objective;
pub mod random;
pub mod space;

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use strata_domain::entities::metrics::Metrics;
use strata_domain::services::engine::BacktestEngine;
use strata_domain::services::strategy::StrategyFactory;
use strata_domain::value_objects::candle::Candle;
use strata_domain::value_objects::params::{ParameterSpace, Params};

pub use bayesian::{AcquisitionKind, BayesianConfig, BayesianOptimizer};
pub use grid::{GridSearchConfig, GridSearchOptimizer};
pub use objective::{ObjectiveKind, INVALID_OBJECTIVE};
pub use random::{RandomSearchConfig, RandomSearchOptimizer};

/// Everything one search needs. The candle slice is shared read-only by all
/// trials.
pub struct OptimizationRequest<'a> {
    pub engine: &'a BacktestEngine,
    pub candles: &'a [Candle],
    pub strategy: &'a dyn StrategyFactory,
    pub parameter_space: ParameterSpace,
    pub objective: String,
    pub min_trades: usize,
    /// Fixed parameters merged under every trial assignment.
    pub base_parameters: Params,
}

impl<'a> OptimizationRequest<'a> {
    pub fn new(
        engine: &'a BacktestEngine,
        candles: &'a [Candle],
        strategy: &'a dyn StrategyFactory,
    ) -> Self {
        Self {
            engine,
            candles,
            strategy,
            parameter_space: strategy.parameter_space(),
            objective: ObjectiveKind::SharpeRatio.as_str().to_string(),
            min_trades: 10,
            base_parameters: Params::new(),
        }
    }

    pub fn with_parameter_space(mut self, space: ParameterSpace) -> Self {
        self.parameter_space = space;
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }

    pub fn with_base_parameters(mut self, params: Params) -> Self {
        self.base_parameters = params;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub latest_objective: f64,
}

#[derive(Default)]
pub struct OptimizationHooks<'a> {
    /// Called on the orchestrating thread in completion order.
    pub on_progress: Option<&'a mut dyn FnMut(Progress)>,
    /// Polled between trials; a running trial is never interrupted.
    pub should_cancel: Option<&'a (dyn Fn() -> bool + Sync)>,
    /// Minimum spacing between progress calls. The last call always goes out.
    pub min_progress_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub trial_id: usize,
    pub parameters: Params,
    pub metrics: Option<Metrics>,
    pub objective_value: f64,
    pub valid: bool,
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

impl EvaluationRecord {
    pub fn invalid(
        trial_id: usize,
        parameters: Params,
        metrics: Option<Metrics>,
        reason: String,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            trial_id,
            parameters,
            metrics,
            objective_value: INVALID_OBJECTIVE,
            valid: false,
            reason: Some(reason),
            elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub max: f64,
}

impl ObjectiveStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
            min: sorted[0],
            p25: percentile(&sorted, 25.0),
            median: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p90: percentile(&sorted, 90.0),
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Linear interpolation between closest ranks over pre-sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_evaluations: usize,
    pub valid_evaluations: usize,
    pub invalid_evaluations: usize,
    pub duplicates_skipped: usize,
    pub elapsed_ms: u64,
    pub objective: ObjectiveStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_initial_points: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub acquisition_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub method: String,
    pub strategy: String,
    pub objective: ObjectiveKind,
    pub best_trial_id: usize,
    pub best_parameters: Params,
    pub best_metrics: Metrics,
    pub best_objective: f64,
    /// Sorted by `trial_id`.
    pub records: Vec<EvaluationRecord>,
    /// Best valid objective seen up to each trial; `None` before the first
    /// valid one.
    pub convergence: Vec<Option<f64>>,
    pub stats: SearchStats,
}

impl OptimizationResult {
    /// Valid records ordered by objective, best first.
    pub fn leaderboard(&self) -> Vec<&EvaluationRecord> {
        let mut rows: Vec<&EvaluationRecord> = self.records.iter().filter(|r| r.valid).collect();
        rows.sort_by(|a, b| {
            b.objective_value
                .total_cmp(&a.objective_value)
                .then(a.trial_id.cmp(&b.trial_id))
        });
        rows
    }
}

pub trait Optimizer {
    fn name(&self) -> &'static str;

    fn optimize(
        &self,
        request: &OptimizationRequest<'_>,
        hooks: OptimizationHooks<'_>,
    ) -> Result<OptimizationResult, PipelineError>;
}

/// Search-specific extras folded into [`SearchStats`].
#[derive(Debug, Default)]
pub(crate) struct SearchDetails {
    pub duplicates_skipped: usize,
    pub grid_size: Option<usize>,
    pub n_initial_points: Option<usize>,
    pub acquisition_counts: BTreeMap<String, usize>,
}

pub(crate) fn summarize(
    method: &'static str,
    request: &OptimizationRequest<'_>,
    objective: ObjectiveKind,
    mut records: Vec<EvaluationRecord>,
    started: Instant,
    details: SearchDetails,
) -> Result<OptimizationResult, PipelineError> {
    records.sort_by_key(|record| record.trial_id);

    let mut convergence = Vec::with_capacity(records.len());
    let mut best: Option<&EvaluationRecord> = None;
    for record in &records {
        if record.valid && best.map_or(true, |b| record.objective_value > b.objective_value) {
            best = Some(record);
        }
        convergence.push(best.map(|b| b.objective_value));
    }

    let valid_values: Vec<f64> = records
        .iter()
        .filter(|r| r.valid)
        .map(|r| r.objective_value)
        .collect();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let stats = SearchStats {
        total_evaluations: records.len(),
        valid_evaluations: valid_values.len(),
        invalid_evaluations: records.len() - valid_values.len(),
        duplicates_skipped: details.duplicates_skipped,
        elapsed_ms,
        objective: ObjectiveStats::from_values(&valid_values),
        grid_size: details.grid_size,
        n_initial_points: details.n_initial_points,
        acquisition_counts: details.acquisition_counts,
    };

    let Some(best) = best.cloned() else {
        tracing::warn!(
            method,
            total = records.len(),
            min_trades = request.min_trades,
            "no valid trial"
        );
        return Err(PipelineError::SearchExhausted {
            min_trades: request.min_trades,
            parameter_space: request.parameter_space.to_string(),
            total_evaluations: records.len(),
        });
    };

    tracing::info!(
        method,
        best_trial = best.trial_id,
        best_objective = best.objective_value,
        valid = stats.valid_evaluations,
        total = stats.total_evaluations,
        elapsed_ms,
        "optimization finished"
    );

    Ok(OptimizationResult {
        method: method.to_string(),
        strategy: request.strategy.name().to_string(),
        objective,
        best_trial_id: best.trial_id,
        best_parameters: best.parameters,
        best_metrics: best.metrics.unwrap_or_default(),
        best_objective: best.objective_value,
        records,
        convergence,
        stats,
    })
}
