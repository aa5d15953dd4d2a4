use thiserror::Error;

/// Caller-side mistakes detected before or during a run. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("candle series is missing required field `{0}`")]
    MissingField(&'static str),
    #[error(
        "candle timestamps must be strictly increasing (index {index}: {previous} -> {current})"
    )]
    NonMonotonicTimestamps {
        index: usize,
        previous: i64,
        current: i64,
    },
    #[error("signals are misaligned with candles: {0}")]
    SignalMisaligned(String),
    #[error("invalid engine config: {0}")]
    InvalidEngineConfig(String),
    #[error("parameter space is empty")]
    EmptyParameterSpace,
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("unknown objective `{name}` (expected one of: {expected})")]
    UnknownObjective { name: String, expected: String },
    #[error("unknown strategy `{name}` (registered: {registered})")]
    UnknownStrategy { name: String, registered: String },
}

impl InputError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
