mod acquisition;
mod gp;

pub use acquisition::AcquisitionKind;

use super::executor::{execute_trials, ProgressReporter};
use super::objective::Objective;
use super::random::unique_samples;
use super::space::{encode, sample};
use super::{
    summarize, EvaluationRecord, OptimizationHooks, OptimizationRequest, OptimizationResult,
    Optimizer, SearchDetails,
};
use crate::errors::PipelineError;
use crate::shared::{params_hash, should_cancel};
use acquisition::{AcquisitionFunction, GpHedge};
use gp::GaussianProcess;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use strata_domain::value_objects::params::{ParameterSpace, Params};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianConfig {
    /// Total evaluations, initial random points included.
    pub n_calls: usize,
    pub n_initial_points: usize,
    pub acquisition: AcquisitionKind,
    pub xi: f64,
    pub kappa: f64,
    pub n_candidates: usize,
    pub seed: u64,
    /// Workers for the initial random phase only.
    pub parallelism: usize,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            n_calls: 50,
            n_initial_points: 10,
            acquisition: AcquisitionKind::Auto,
            xi: 0.01,
            kappa: 1.96,
            n_candidates: 1000,
            seed: 42,
            parallelism: 1,
        }
    }
}

/// Sequential model-based search: a GP surrogate of the negated objective
/// picks each next trial once the random warm-up is done.
#[derive(Debug, Clone, Default)]
pub struct BayesianOptimizer {
    config: BayesianConfig,
}

impl BayesianOptimizer {
    pub fn new(config: BayesianConfig) -> Self {
        Self { config }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let cfg = &self.config;
        if cfg.n_calls == 0 {
            return Err(PipelineError::Config("n_calls must be >= 1".to_string()));
        }
        if cfg.n_candidates == 0 {
            return Err(PipelineError::Config("n_candidates must be >= 1".to_string()));
        }
        if !cfg.xi.is_finite() || cfg.xi < 0.0 || !cfg.kappa.is_finite() || cfg.kappa < 0.0 {
            return Err(PipelineError::Config(format!(
                "xi and kappa must be finite and >= 0 (xi={}, kappa={})",
                cfg.xi, cfg.kappa
            )));
        }
        Ok(())
    }
}

/// Training set for the surrogate. Targets are negated objectives; invalid
/// trials sit one spread below the worst valid score.
fn observations(space: &ParameterSpace, records: &[EvaluationRecord]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let valid: Vec<f64> = records
        .iter()
        .filter(|r| r.valid)
        .map(|r| r.objective_value)
        .collect();
    let penalty = if valid.is_empty() {
        0.0
    } else {
        let worst = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let best = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = if best - worst > 1e-12 { best - worst } else { 1.0 };
        worst - spread
    };

    let xs = records.iter().map(|r| encode(space, &r.parameters)).collect();
    let ys = records
        .iter()
        .map(|r| if r.valid { -r.objective_value } else { -penalty })
        .collect();
    (xs, ys)
}

/// Random unseen assignments, each with its unit-cube encoding.
fn candidates(
    space: &ParameterSpace,
    rng: &mut StdRng,
    count: usize,
    seen: &BTreeSet<String>,
) -> Vec<(Vec<f64>, Params, String)> {
    let mut local = BTreeSet::new();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let params = sample(space, rng);
        let key = params_hash(&params);
        if seen.contains(&key) || !local.insert(key.clone()) {
            continue;
        }
        out.push((encode(space, &params), params, key));
    }
    out
}

impl Optimizer for BayesianOptimizer {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn optimize(
        &self,
        request: &OptimizationRequest<'_>,
        hooks: OptimizationHooks<'_>,
    ) -> Result<OptimizationResult, PipelineError> {
        let started = Instant::now();
        self.validate()?;
        let objective = Objective::new(request)?;
        let cfg = &self.config;
        let n_initial = cfg.n_initial_points.clamp(1, cfg.n_calls);
        let _span = tracing::info_span!(
            "optimize",
            method = self.name(),
            strategy = request.strategy.name(),
            objective = objective.kind().as_str(),
            n_calls = cfg.n_calls,
            n_initial_points = n_initial,
            acquisition = cfg.acquisition.as_str(),
        )
        .entered();

        let search_space = &request.parameter_space;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut seen = BTreeSet::new();
        let (initial, duplicates) =
            unique_samples(search_space, &mut rng, n_initial, &mut seen, 0);

        let OptimizationHooks {
            on_progress,
            should_cancel: cancel,
            min_progress_interval,
        } = hooks;
        let mut reporter = ProgressReporter::new(on_progress, min_progress_interval, cfg.n_calls);

        let mut records = execute_trials(
            &initial,
            cfg.parallelism,
            &objective,
            cancel,
            &mut |record| reporter.record(record),
        )?;

        let mut hedge = GpHedge::new(1.0);
        let mut last_proposals: Option<[Vec<f64>; 3]> = None;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        while records.len() < cfg.n_calls {
            if should_cancel(cancel) {
                return Err(PipelineError::Cancelled);
            }

            // base parameters are not part of the space, so encode() skips them
            let (xs, ys) = observations(search_space, &records);
            let Some(model) = GaussianProcess::fit(&xs, &ys) else {
                tracing::warn!(observations = xs.len(), "surrogate fit failed; stopping early");
                break;
            };

            if let Some(previous) = last_proposals.take() {
                hedge.update(previous.map(|x| model.predict(&x).0));
            }

            let pool = candidates(search_space, &mut rng, cfg.n_candidates, &seen);
            if pool.is_empty() {
                tracing::warn!(evaluated = records.len(), "no unseen candidates left; stopping early");
                break;
            }

            let best = model.best_standardized();
            let predictions: Vec<(f64, f64)> = pool.iter().map(|(x, _, _)| model.predict(x)).collect();
            let proposals = AcquisitionFunction::ALL.map(|acq| {
                let mut best_idx = 0;
                let mut best_utility = f64::NEG_INFINITY;
                for (idx, (mean, std)) in predictions.iter().enumerate() {
                    let utility = acq.utility(*mean, *std, best, cfg.xi, cfg.kappa);
                    if utility > best_utility {
                        best_utility = utility;
                        best_idx = idx;
                    }
                }
                best_idx
            });

            let chosen = match cfg.acquisition {
                AcquisitionKind::Auto => hedge.choose(&mut rng),
                AcquisitionKind::Ei => 0,
                AcquisitionKind::Lcb => 1,
                AcquisitionKind::Pi => 2,
            };
            if cfg.acquisition == AcquisitionKind::Auto {
                last_proposals = Some(proposals.map(|idx| pool[idx].0.clone()));
            }
            *counts
                .entry(AcquisitionFunction::ALL[chosen].as_str().to_string())
                .or_insert(0) += 1;

            let (point, params, key) = &pool[proposals[chosen]];
            seen.insert(key.clone());

            let trial_id = records.len();
            tracing::debug!(
                trial_id,
                acquisition = AcquisitionFunction::ALL[chosen].as_str(),
                length_scale = model.length_scale(),
                predicted = -model.predict_raw(point),
                "guided trial"
            );
            let record = objective.evaluate(trial_id, params);
            reporter.record(&record);
            records.push(record);
        }
        reporter.finish();

        summarize(
            self.name(),
            request,
            objective.kind(),
            records,
            started,
            SearchDetails {
                duplicates_skipped: duplicates,
                n_initial_points: Some(n_initial),
                acquisition_counts: counts,
                ..SearchDetails::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::value_objects::params::{ParamRange, ParamValue};

    fn record(trial_id: usize, x: i64, objective: Option<f64>) -> EvaluationRecord {
        let mut parameters = Params::new();
        parameters.insert("x".to_string(), ParamValue::Int(x));
        match objective {
            Some(value) => EvaluationRecord {
                trial_id,
                parameters,
                metrics: None,
                objective_value: value,
                valid: true,
                reason: None,
                elapsed_ms: 0,
            },
            None => EvaluationRecord::invalid(trial_id, parameters, None, "few trades".to_string(), 0),
        }
    }

    #[test]
    fn invalid_trials_enter_below_the_worst_valid_score() {
        let space = ParameterSpace::new().with("x", ParamRange::int(0, 4));
        let records = vec![record(0, 0, Some(1.0)), record(1, 2, Some(3.0)), record(2, 4, None)];
        let (xs, ys) = observations(&space, &records);
        assert_eq!(xs, vec![vec![0.0], vec![0.5], vec![1.0]]);
        // negated: valid -1, -3; invalid sits at -(1 - 2) = 1
        assert_eq!(ys, vec![-1.0, -3.0, 1.0]);
    }

    #[test]
    fn candidates_skip_seen_assignments() {
        let space = ParameterSpace::new().with("x", ParamRange::int(0, 2));
        let mut seen = BTreeSet::new();
        let mut params = Params::new();
        params.insert("x".to_string(), ParamValue::Int(1));
        seen.insert(params_hash(&params));

        let mut rng = StdRng::seed_from_u64(3);
        let pool = candidates(&space, &mut rng, 100, &seen);
        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|(_, p, _)| p["x"] != ParamValue::Int(1)));
    }
}
