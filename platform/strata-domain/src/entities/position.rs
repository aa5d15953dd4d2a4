use crate::value_objects::candle::Candle;
use crate::value_objects::side::Side;
use crate::value_objects::signal::SignalAction;
use crate::value_objects::trade::{ExitReason, Trade};

/// The single open trade of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_index: usize,
    pub entry_time: i64,
    /// Candle close at entry, before slippage.
    pub entry_reference: f64,
    pub entry_fill: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    /// First exit that applies on `candle`, with the pre-slippage exit price.
    /// Order: stop, target, max holding, opposing signal.
    pub fn exit_trigger(
        &self,
        candle: &Candle,
        action: SignalAction,
        index: usize,
        max_holding_periods: Option<usize>,
    ) -> Option<(ExitReason, f64)> {
        let (stop_hit, target_hit, opposing) = match self.side {
            Side::Long => (
                candle.low <= self.stop_loss,
                candle.high >= self.take_profit,
                action == SignalAction::Sell,
            ),
            Side::Short => (
                candle.high >= self.stop_loss,
                candle.low <= self.take_profit,
                action == SignalAction::Buy,
            ),
        };

        if stop_hit {
            return Some((ExitReason::StopLoss, self.stop_loss));
        }
        if target_hit {
            return Some((ExitReason::TakeProfit, self.take_profit));
        }
        if let Some(limit) = max_holding_periods {
            if index.saturating_sub(self.entry_index) >= limit {
                return Some((ExitReason::MaxHolding, candle.close));
            }
        }
        if opposing {
            return Some((ExitReason::Signal, candle.close));
        }
        None
    }

    pub fn close(
        &self,
        candle: &Candle,
        index: usize,
        exit_reference: f64,
        reason: ExitReason,
        slippage_rate: f64,
        fee_rate: f64,
    ) -> Trade {
        let direction = self.side.direction();
        let exit_fill = exit_reference * (1.0 - direction * slippage_rate);
        let gross = direction * (exit_fill - self.entry_fill) / self.entry_fill;
        let pnl_pct = gross - 2.0 * fee_rate;

        Trade {
            entry_time: self.entry_time,
            exit_time: candle.timestamp,
            entry_index: self.entry_index,
            exit_index: index,
            side: self.side,
            entry_price: self.entry_fill,
            exit_price: exit_fill,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            size: self.size,
            pnl: self.size * pnl_pct,
            pnl_pct,
            holding_periods: index - self.entry_index,
            exit_reason: reason,
        }
    }
}
