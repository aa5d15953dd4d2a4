#![allow(dead_code)]

use strata_domain::errors::InputError;
use strata_domain::services::indicators::{enrich, IndicatorConfig};
use strata_domain::services::strategy::{ParamReader, StrategyFactory, StrategyModel};
use strata_domain::value_objects::candle::{Candle, RawCandle};
use strata_domain::value_objects::params::{ParamRange, ParamValue, ParameterSpace, Params};
use strata_domain::value_objects::signal::SignalRecord;

pub const HOUR_MS: i64 = 3_600_000;
pub const MINUTE_MS: i64 = 60_000;

/// Uptrend with a slow oscillation so targets of different widths take
/// different amounts of time to fill.
pub fn wavy_candles(n: usize, step_ms: i64) -> Vec<Candle> {
    let raw: Vec<RawCandle> = (0..n)
        .map(|i| {
            let close = 100.0 + 0.05 * i as f64 + (i as f64 / 3.0).sin();
            RawCandle {
                timestamp: 1_700_000_000_000 + i as i64 * step_ms,
                open: close - 0.05,
                high: close + 0.2,
                low: close - 0.2,
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    enrich(&raw, IndicatorConfig::default())
}

/// Buys every fifth bar with a target `0.2 * x + 0.3 * y` above the close.
pub struct Periodic {
    x: usize,
    y: f64,
}

impl StrategyModel for Periodic {
    fn name(&self) -> &str {
        "periodic"
    }

    fn generate_signals(&self, candles: &[Candle]) -> Result<Vec<SignalRecord>, InputError> {
        Ok(candles
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i % 5 == 0 {
                    let target = c.close + 0.2 * self.x as f64 + 0.3 * self.y;
                    SignalRecord::buy(c.timestamp, c.close - 2.0, target)
                } else {
                    SignalRecord::hold(c.timestamp)
                }
            })
            .collect())
    }

    fn parameter_space(&self) -> ParameterSpace {
        ParameterSpace::new()
    }

    fn parameters(&self) -> Params {
        let mut params = Params::new();
        params.insert("x".to_string(), ParamValue::Int(self.x as i64));
        params.insert("y".to_string(), ParamValue::Float(self.y));
        params
    }
}

pub struct PeriodicFactory {
    pub space: ParameterSpace,
}

impl PeriodicFactory {
    /// `{x: [1, 2], y: [0.0, 1.0]}`
    pub fn choices() -> Self {
        Self {
            space: ParameterSpace::new()
                .with("x", ParamRange::choice([1i64, 2]))
                .with("y", ParamRange::choice([0.0f64, 1.0])),
        }
    }

    pub fn continuous() -> Self {
        Self {
            space: ParameterSpace::new()
                .with("x", ParamRange::int(1, 5))
                .with("y", ParamRange::float(0.0, 1.0)),
        }
    }
}

impl StrategyFactory for PeriodicFactory {
    fn name(&self) -> &'static str {
        "periodic"
    }

    fn parameter_space(&self) -> ParameterSpace {
        self.space.clone()
    }

    fn default_parameters(&self) -> Params {
        Periodic { x: 1, y: 0.0 }.parameters()
    }

    fn build(&self, params: &Params) -> Result<Box<dyn StrategyModel>, InputError> {
        let mut reader = ParamReader::new(params);
        let x = reader.usize("x", 1, 1, 10)?;
        let y = reader.float("y", 0.0, 0.0, 1.0)?;
        reader.finish()?;
        Ok(Box::new(Periodic { x, y }))
    }
}
