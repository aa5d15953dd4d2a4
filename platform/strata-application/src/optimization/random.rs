use super::executor::{execute_trials, ProgressReporter, TrialPlan};
use super::objective::Objective;
use super::space::sample;
use super::{summarize, OptimizationHooks, OptimizationRequest, OptimizationResult, Optimizer, SearchDetails};
use crate::errors::PipelineError;
use crate::shared::params_hash;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use strata_domain::value_objects::params::ParameterSpace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSearchConfig {
    pub n_iter: usize,
    pub seed: u64,
    pub parallelism: usize,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 50,
            seed: 42,
            parallelism: 1,
        }
    }
}

/// Independent uniform draws from a seeded RNG, deduplicated before
/// evaluation.
#[derive(Debug, Clone, Default)]
pub struct RandomSearchOptimizer {
    config: RandomSearchConfig,
}

impl RandomSearchOptimizer {
    pub fn new(config: RandomSearchConfig) -> Self {
        Self { config }
    }
}

/// Draws up to `count` distinct assignments, giving up after `10 * count`
/// draws. Returns the plans and the number of duplicate draws.
pub(crate) fn unique_samples(
    space: &ParameterSpace,
    rng: &mut StdRng,
    count: usize,
    seen: &mut BTreeSet<String>,
    first_trial_id: usize,
) -> (Vec<TrialPlan>, usize) {
    let max_draws = count.saturating_mul(10);
    let mut plans = Vec::with_capacity(count);
    let mut duplicates = 0usize;
    let mut draws = 0usize;
    while plans.len() < count && draws < max_draws {
        draws += 1;
        let params = sample(space, rng);
        if seen.insert(params_hash(&params)) {
            plans.push(TrialPlan {
                trial_id: first_trial_id + plans.len(),
                params,
            });
        } else {
            duplicates += 1;
        }
    }
    if plans.len() < count {
        tracing::warn!(
            requested = count,
            unique = plans.len(),
            draws,
            "parameter space exhausted before reaching the requested number of samples"
        );
    }
    (plans, duplicates)
}

impl Optimizer for RandomSearchOptimizer {
    fn name(&self) -> &'static str {
        "random"
    }

    fn optimize(
        &self,
        request: &OptimizationRequest<'_>,
        hooks: OptimizationHooks<'_>,
    ) -> Result<OptimizationResult, PipelineError> {
        let started = Instant::now();
        let objective = Objective::new(request)?;
        let _span = tracing::info_span!(
            "optimize",
            method = self.name(),
            strategy = request.strategy.name(),
            objective = objective.kind().as_str(),
            trials = self.config.n_iter,
            seed = self.config.seed,
        )
        .entered();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut seen = BTreeSet::new();
        let (plans, duplicates) = unique_samples(
            &request.parameter_space,
            &mut rng,
            self.config.n_iter,
            &mut seen,
            0,
        );

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
                duplicates_skipped: duplicates,
                ..SearchDetails::default()
            },
        )
    }
}
