use crate::optimization::{
    AcquisitionKind, BayesianConfig, GridSearchConfig, RandomSearchConfig,
};
use crate::validation::WalkForwardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strata_domain::services::engine::EngineConfig;
use strata_domain::value_objects::params::{ParameterSpace, Params};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub paths: PathsConfig,
    pub engine: Option<EngineSection>,
    pub strategy: StrategySection,
    pub optimization: Option<OptimizationSection>,
    pub validation: Option<ValidationSection>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    /// RFC3339 bounds applied to the loaded candles, both inclusive.
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub candles: String,
    pub out_dir: String,
}

/// Overrides on top of the engine defaults. `max_holding_periods = 0`
/// disables the holding limit.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    pub initial_capital: Option<f64>,
    pub risk_per_trade: Option<f64>,
    pub fee_rate: Option<f64>,
    pub slippage_rate: Option<f64>,
    pub max_holding_periods: Option<usize>,
    pub allow_short: Option<bool>,
    pub default_stop_atr: Option<f64>,
    pub default_risk_reward: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StrategySection {
    pub id: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMethod {
    Grid,
    Random,
    Bayesian,
}

impl OptimizationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Random => "random",
            Self::Bayesian => "bayesian",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OptimizationSection {
    pub method: OptimizationMethod,
    pub objective: Option<String>,
    pub min_trades: Option<usize>,
    pub parallelism: Option<usize>,
    pub seed: Option<u64>,
    pub n_iter: Option<usize>,
    pub n_calls: Option<usize>,
    pub n_initial_points: Option<usize>,
    pub acquisition: Option<AcquisitionKind>,
    pub xi: Option<f64>,
    pub kappa: Option<f64>,
    pub n_candidates: Option<usize>,
    pub grid_points: Option<usize>,
    pub max_combinations: Option<usize>,
    pub progress_interval_ms: Option<u64>,
    /// Replaces the strategy's declared space when present.
    pub parameter_space: Option<ParameterSpace>,
}

impl OptimizationSection {
    pub fn new(method: OptimizationMethod) -> Self {
        Self {
            method,
            objective: None,
            min_trades: None,
            parallelism: None,
            seed: None,
            n_iter: None,
            n_calls: None,
            n_initial_points: None,
            acquisition: None,
            xi: None,
            kappa: None,
            n_candidates: None,
            grid_points: None,
            max_combinations: None,
            progress_interval_ms: None,
            parameter_space: None,
        }
    }

    pub fn grid_config(&self) -> GridSearchConfig {
        let defaults = GridSearchConfig::default();
        GridSearchConfig {
            grid_points: self.grid_points.unwrap_or(defaults.grid_points),
            max_combinations: self.max_combinations.unwrap_or(defaults.max_combinations),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism),
        }
    }

    pub fn random_config(&self) -> RandomSearchConfig {
        let defaults = RandomSearchConfig::default();
        RandomSearchConfig {
            n_iter: self.n_iter.unwrap_or(defaults.n_iter),
            seed: self.seed.unwrap_or(defaults.seed),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism),
        }
    }

    pub fn bayesian_config(&self) -> BayesianConfig {
        let defaults = BayesianConfig::default();
        BayesianConfig {
            n_calls: self.n_calls.unwrap_or(defaults.n_calls),
            n_initial_points: self.n_initial_points.unwrap_or(defaults.n_initial_points),
            acquisition: self.acquisition.unwrap_or(defaults.acquisition),
            xi: self.xi.unwrap_or(defaults.xi),
            kappa: self.kappa.unwrap_or(defaults.kappa),
            n_candidates: self.n_candidates.unwrap_or(defaults.n_candidates),
            seed: self.seed.unwrap_or(defaults.seed),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    pub train_window_days: Option<f64>,
    pub test_window_days: Option<f64>,
    pub gap_days: Option<f64>,
    pub min_windows: Option<usize>,
}

impl ValidationSection {
    pub fn walk_forward_config(&self) -> WalkForwardConfig {
        let defaults = WalkForwardConfig::default();
        WalkForwardConfig {
            train_window_days: self.train_window_days.unwrap_or(defaults.train_window_days),
            test_window_days: self.test_window_days.unwrap_or(defaults.test_window_days),
            gap_days: self.gap_days.unwrap_or(defaults.gap_days),
            min_windows: self.min_windows.unwrap_or(defaults.min_windows),
        }
    }
}

pub fn resolve_engine_config(section: Option<&EngineSection>) -> EngineConfig {
    let defaults = EngineConfig::default();
    let Some(section) = section else {
        return defaults;
    };
    EngineConfig {
        initial_capital: section.initial_capital.unwrap_or(defaults.initial_capital),
        risk_per_trade: section.risk_per_trade.unwrap_or(defaults.risk_per_trade),
        fee_rate: section.fee_rate.unwrap_or(defaults.fee_rate),
        slippage_rate: section.slippage_rate.unwrap_or(defaults.slippage_rate),
        max_holding_periods: match section.max_holding_periods {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_holding_periods,
        },
        allow_short: section.allow_short.unwrap_or(defaults.allow_short),
        default_stop_atr: section.default_stop_atr.unwrap_or(defaults.default_stop_atr),
        default_risk_reward: section
            .default_risk_reward
            .unwrap_or(defaults.default_risk_reward),
    }
}

/// Parses an RFC3339 bound into epoch milliseconds.
pub fn parse_bound(value: Option<&str>) -> Result<Option<i64>, String> {
    value
        .map(|raw| {
            chrono::DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|err| format!("invalid RFC3339 timestamp {raw:?}: {err}"))
        })
        .transpose()
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}
