use serde::{Deserialize, Serialize};

/// Plain OHLCV as loaded from storage, before the indicator pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// OHLCV enriched with the indicators strategies and the engine rely on.
/// `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub atr: Option<f64>,
    #[serde(default)]
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub sma_50: Option<f64>,
}

impl Candle {
    pub fn from_raw(raw: RawCandle) -> Self {
        Self {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            atr: None,
            sma_20: None,
            sma_50: None,
        }
    }

    pub fn raw(&self) -> RawCandle {
        RawCandle {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    /// ATR when it is present, finite and positive.
    pub fn usable_atr(&self) -> Option<f64> {
        self.atr.filter(|atr| atr.is_finite() && *atr > 0.0)
    }
}
