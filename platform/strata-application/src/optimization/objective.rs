use super::{EvaluationRecord, OptimizationRequest};
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use strata_domain::entities::metrics::Metrics;
use strata_domain::errors::InputError;
use strata_domain::services::series::ensure_series;
use strata_domain::value_objects::params::Params;

/// Score recorded for trials that cannot be evaluated.
pub const INVALID_OBJECTIVE: f64 = -1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    SharpeRatio,
    SortinoRatio,
    CalmarRatio,
    ProfitFactor,
    NetProfitPct,
    WinRate,
    Expectancy,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 7] = [
        ObjectiveKind::SharpeRatio,
        ObjectiveKind::SortinoRatio,
        ObjectiveKind::CalmarRatio,
        ObjectiveKind::ProfitFactor,
        ObjectiveKind::NetProfitPct,
        ObjectiveKind::WinRate,
        ObjectiveKind::Expectancy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectiveKind::SharpeRatio => "sharpe_ratio",
            ObjectiveKind::SortinoRatio => "sortino_ratio",
            ObjectiveKind::CalmarRatio => "calmar_ratio",
            ObjectiveKind::ProfitFactor => "profit_factor",
            ObjectiveKind::NetProfitPct => "net_profit_pct",
            ObjectiveKind::WinRate => "win_rate",
            ObjectiveKind::Expectancy => "expectancy",
        }
    }

    pub fn value(self, metrics: &Metrics) -> f64 {
        match self {
            ObjectiveKind::SharpeRatio => metrics.sharpe_ratio,
            ObjectiveKind::SortinoRatio => metrics.sortino_ratio,
            ObjectiveKind::CalmarRatio => metrics.calmar_ratio,
            ObjectiveKind::ProfitFactor => metrics.profit_factor,
            ObjectiveKind::NetProfitPct => metrics.net_profit_pct,
            ObjectiveKind::WinRate => metrics.win_rate,
            ObjectiveKind::Expectancy => metrics.expectancy,
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKind {
    type Err = InputError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = raw.trim().to_lowercase();
        ObjectiveKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| InputError::UnknownObjective {
                name: raw.to_string(),
                expected: ObjectiveKind::ALL
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Maps a parameter assignment to a score. Failures become invalid records
/// instead of errors so one bad trial never aborts a search.
pub(crate) struct Objective<'r> {
    request: &'r OptimizationRequest<'r>,
    kind: ObjectiveKind,
}

impl<'r> Objective<'r> {
    pub(crate) fn new(request: &'r OptimizationRequest<'r>) -> Result<Self, PipelineError> {
        let kind = request.objective.parse::<ObjectiveKind>()?;
        request.parameter_space.validate()?;
        ensure_series(request.candles)?;
        Ok(Self { request, kind })
    }

    pub(crate) fn kind(&self) -> ObjectiveKind {
        self.kind
    }

    pub(crate) fn evaluate(&self, trial_id: usize, trial_params: &Params) -> EvaluationRecord {
        let started = Instant::now();
        let mut parameters = self.request.base_parameters.clone();
        parameters.extend(trial_params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let outcome = self
            .request
            .strategy
            .build(&parameters)
            .and_then(|strategy| self.request.engine.run(self.request.candles, strategy.as_ref()));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        metrics::counter!("strata.optimize.trials").increment(1);
        metrics::histogram!("strata.optimize.trial_ms").record(elapsed_ms as f64);

        let record = match outcome {
            Err(err) => EvaluationRecord::invalid(trial_id, parameters, None, err.to_string(), elapsed_ms),
            Ok(result) => {
                let trades = result.metrics.total_trades;
                let score = self.kind.value(&result.metrics);
                if trades < self.request.min_trades {
                    EvaluationRecord::invalid(
                        trial_id,
                        parameters,
                        Some(result.metrics),
                        format!("{trades} trades < min_trades {}", self.request.min_trades),
                        elapsed_ms,
                    )
                } else if !score.is_finite() {
                    EvaluationRecord::invalid(
                        trial_id,
                        parameters,
                        Some(result.metrics),
                        format!("{} is not finite", self.kind),
                        elapsed_ms,
                    )
                } else {
                    EvaluationRecord {
                        trial_id,
                        parameters,
                        metrics: Some(result.metrics),
                        objective_value: score,
                        valid: true,
                        reason: None,
                        elapsed_ms,
                    }
                }
            }
        };

        if record.valid {
            tracing::debug!(trial_id, objective = record.objective_value, elapsed_ms, "trial evaluated");
        } else {
            metrics::counter!("strata.optimize.invalid_trials").increment(1);
            tracing::warn!(
                trial_id,
                reason = record.reason.as_deref().unwrap_or_default(),
                "trial invalid"
            );
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_objectives() {
        assert_eq!("sharpe_ratio".parse::<ObjectiveKind>(), Ok(ObjectiveKind::SharpeRatio));
        assert_eq!(" Win_Rate ".parse::<ObjectiveKind>(), Ok(ObjectiveKind::WinRate));
        for kind in ObjectiveKind::ALL {
            assert_eq!(kind.as_str().parse::<ObjectiveKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_objective_lists_choices() {
        match "alpha".parse::<ObjectiveKind>() {
            Err(InputError::UnknownObjective { name, expected }) => {
                assert_eq!(name, "alpha");
                assert!(expected.contains("sortino_ratio"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
