use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// One strategy decision, aligned 1:1 with a candle by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub timestamp: i64,
    pub action: SignalAction,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
}

fn default_size_multiplier() -> f64 {
    1.0
}

impl SignalRecord {
    pub fn hold(timestamp: i64) -> Self {
        Self {
            timestamp,
            action: SignalAction::Hold,
            stop_loss: None,
            take_profit: None,
            size_multiplier: 1.0,
        }
    }

    pub fn buy(timestamp: i64, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            timestamp,
            action: SignalAction::Buy,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            size_multiplier: 1.0,
        }
    }

    pub fn sell(timestamp: i64, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            timestamp,
            action: SignalAction::Sell,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            size_multiplier: 1.0,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.action != SignalAction::Hold
    }
}
