use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MaxHolding,
    Signal,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::MaxHolding => "max_holding",
            ExitReason::Signal => "signal",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

/// A closed round trip. Prices are fills, i.e. after slippage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: i64,
    pub exit_time: i64,
    pub entry_index: usize,
    pub exit_index: usize,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_periods: usize,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
