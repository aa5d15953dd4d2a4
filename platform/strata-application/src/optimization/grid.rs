use super::executor::{execute_trials, ProgressReporter, TrialPlan};
use super::objective::Objective;
use super::space::{expand_grid, grid_size};
use super::{summarize, OptimizationHooks, OptimizationRequest, OptimizationResult, Optimizer, SearchDetails};
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchConfig {
    /// Values per continuous dimension without an explicit step.
    pub grid_points: usize,
    pub max_combinations: usize,
    pub parallelism: usize,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            grid_points: 5,
            max_combinations: 100_000,
            parallelism: 1,
        }
    }
}

/// Exhaustive search over the Cartesian product of the parameter space.
#[derive(Debug, Clone, Default)]
pub struct GridSearchOptimizer {
    config: GridSearchConfig,
}

impl GridSearchOptimizer {
    pub fn new(config: GridSearchConfig) -> Self {
        Self { config }
    }
}

impl Optimizer for GridSearchOptimizer {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn optimize(
        &self,
        request: &OptimizationRequest<'_>,
        hooks: OptimizationHooks<'_>,
    ) -> Result<OptimizationResult, PipelineError> {
        let started = Instant::now();
        let objective = Objective::new(request)?;
        let space = &request.parameter_space;

        let size = match grid_size(space, self.config.grid_points) {
            Some(size) if size <= self.config.max_combinations => size,
            Some(size) => {
                return Err(PipelineError::Config(format!(
                    "grid has {size} combinations, above max_combinations={} (space {space})",
                    self.config.max_combinations
                )))
            }
            None => {
                return Err(PipelineError::Config(format!(
                    "grid size overflows, above max_combinations={} (space {space})",
                    self.config.max_combinations
                )))
            }
        };

        let _span = tracing::info_span!(
            "optimize",
            method = self.name(),
            strategy = request.strategy.name(),
            objective = objective.kind().as_str(),
            trials = size,
        )
        .entered();

        let plans: Vec<TrialPlan> = expand_grid(space, self.config.grid_points)
            .into_iter()
            .enumerate()
            .map(|(trial_id, params)| TrialPlan { trial_id, params })
            .collect();

        let OptimizationHooks {
            on_progress,
            should_cancel,
            min_progress_interval,
        } = hooks;
        let mut reporter = ProgressReporter::new(on_progress, min_progress_interval, plans.len());
        let records = execute_trials(
            &plans,
            self.config.parallelism,
            &objective,
            should_cancel,
            &mut |record| reporter.record(record),
        )?;
        reporter.finish();

        summarize(
            self.name(),
            request,
            objective.kind(),
            records,
            started,
            SearchDetails {
                grid_size: Some(size),
                ..SearchDetails::default()
            },
        )
    }
}
