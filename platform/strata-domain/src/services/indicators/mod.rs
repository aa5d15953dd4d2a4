pub mod rolling;

use crate::value_objects::candle::{Candle, RawCandle};
use rolling::{RollingSma, WilderAtr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorConfig {
    pub atr_period: usize,
    pub fast_sma: usize,
    pub slow_sma: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            fast_sma: 20,
            slow_sma: 50,
        }
    }
}

/// Indicator pass: builds a new enriched series, never touching the input.
/// Leading candles without enough history carry `None`.
pub fn enrich(raw: &[RawCandle], config: IndicatorConfig) -> Vec<Candle> {
    let mut atr = WilderAtr::new(config.atr_period);
    let mut fast = RollingSma::new(config.fast_sma);
    let mut slow = RollingSma::new(config.slow_sma);

    raw.iter()
        .map(|bar| {
            let mut candle = Candle::from_raw(*bar);
            candle.atr = atr.update(bar.high, bar.low, bar.close);
            candle.sma_20 = fast.update(bar.close);
            candle.sma_50 = slow.update(bar.close);
            candle
        })
        .collect()
}
