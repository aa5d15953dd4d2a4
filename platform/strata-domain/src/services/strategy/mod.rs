pub mod levels;
pub mod liquidity_sweep;
pub mod params;
pub mod registry;

use crate::errors::InputError;
use crate::value_objects::candle::Candle;
use crate::value_objects::params::{ParameterSpace, Params};
use crate::value_objects::signal::SignalRecord;

pub use liquidity_sweep::{LiquiditySweep, LiquiditySweepConfig, LiquiditySweepFactory};
pub use params::ParamReader;
pub use registry::StrategyRegistry;

/// A configured strategy. Parameters are fixed at construction, so signal
/// generation is a pure function of the candles.
pub trait StrategyModel: Send + Sync {
    fn name(&self) -> &str;

    /// One signal per candle, carrying the candle's timestamp.
    fn generate_signals(&self, candles: &[Candle]) -> Result<Vec<SignalRecord>, InputError>;

    fn parameter_space(&self) -> ParameterSpace;

    fn parameters(&self) -> Params;
}

/// Builds strategy instances from flat parameter maps.
pub trait StrategyFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn parameter_space(&self) -> ParameterSpace;

    fn default_parameters(&self) -> Params;

    /// Unknown keys, wrong types and out-of-range values are rejected.
    fn build(&self, params: &Params) -> Result<Box<dyn StrategyModel>, InputError>;
}
