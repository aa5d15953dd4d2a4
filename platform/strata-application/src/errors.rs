use strata_domain::errors::InputError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(
        "search exhausted: none of {total_evaluations} trials produced at least {min_trades} trades \
         (min_trades={min_trades}) over parameter space {parameter_space}"
    )]
    SearchExhausted {
        min_trades: usize,
        parameter_space: String,
        total_evaluations: usize,
    },
    #[error(
        "insufficient data for walk-forward validation: {min_windows} windows need {required_days:.2} days \
         (required), only {available_days:.2} days available ({windows} windows fit)"
    )]
    InsufficientData {
        required_days: f64,
        available_days: f64,
        windows: usize,
        min_windows: usize,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}
