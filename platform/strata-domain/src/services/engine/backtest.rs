use crate::entities::metrics::Metrics;
use crate::entities::position::Position;
use crate::errors::InputError;
use crate::services::series::ensure_series;
use crate::services::strategy::StrategyModel;
use crate::value_objects::candle::Candle;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::side::Side;
use crate::value_objects::signal::{SignalAction, SignalRecord};
use crate::value_objects::trade::{ExitReason, Trade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub risk_per_trade: f64,
    pub fee_rate: f64,
    pub slippage_rate: f64,
    pub max_holding_periods: Option<usize>,
    pub allow_short: bool,
    /// Stop distance in ATRs when a signal carries no stop.
    pub default_stop_atr: f64,
    /// Target distance in stop distances when a signal carries no target.
    pub default_risk_reward: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade: 0.02,
            fee_rate: 0.001,
            slippage_rate: 0.0005,
            max_holding_periods: Some(100),
            allow_short: true,
            default_stop_atr: 2.0,
            default_risk_reward: 2.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        let invalid = |msg: String| Err(InputError::InvalidEngineConfig(msg));
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return invalid(format!(
                "initial_capital must be > 0 (got {})",
                self.initial_capital
            ));
        }
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            return invalid(format!(
                "risk_per_trade must be in (0, 1] (got {})",
                self.risk_per_trade
            ));
        }
        if !self.fee_rate.is_finite() || !(0.0..1.0).contains(&self.fee_rate) {
            return invalid(format!("fee_rate must be in [0, 1) (got {})", self.fee_rate));
        }
        if !self.slippage_rate.is_finite() || !(0.0..1.0).contains(&self.slippage_rate) {
            return invalid(format!(
                "slippage_rate must be in [0, 1) (got {})",
                self.slippage_rate
            ));
        }
        if self.max_holding_periods == Some(0) {
            return invalid("max_holding_periods must be >= 1 when set".to_string());
        }
        if !self.default_stop_atr.is_finite() || self.default_stop_atr <= 0.0 {
            return invalid(format!(
                "default_stop_atr must be > 0 (got {})",
                self.default_stop_atr
            ));
        }
        if !self.default_risk_reward.is_finite() || self.default_risk_reward <= 0.0 {
            return invalid(format!(
                "default_risk_reward must be > 0 (got {})",
                self.default_risk_reward
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
}

/// Replays strategy signals over candles. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
}

impl BacktestEngine {
    pub fn new(config: EngineConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(
        &self,
        candles: &[Candle],
        strategy: &dyn StrategyModel,
    ) -> Result<BacktestResults, InputError> {
        ensure_series(candles)?;
        let signals = strategy.generate_signals(candles)?;
        self.run_signals(candles, &signals)
    }

    /// Simulates a precomputed signal sequence. Flat -> Open -> Flat, one
    /// position at a time, entries at the candle close.
    pub fn run_signals(
        &self,
        candles: &[Candle],
        signals: &[SignalRecord],
    ) -> Result<BacktestResults, InputError> {
        ensure_series(candles)?;
        ensure_aligned(candles, signals)?;

        let cfg = &self.config;
        let Some(first) = candles.first() else {
            return Ok(BacktestResults {
                trades: Vec::new(),
                metrics: Metrics::empty(cfg.initial_capital),
                equity_curve: Vec::new(),
            });
        };

        let mut capital = cfg.initial_capital;
        let mut trades = Vec::new();
        let mut equity_curve = vec![EquityPoint {
            timestamp: first.timestamp,
            equity: capital,
        }];
        let mut position: Option<Position> = None;

        for (index, (candle, signal)) in candles.iter().zip(signals).enumerate() {
            if let Some(open) = position.as_ref() {
                if let Some((reason, price)) =
                    open.exit_trigger(candle, signal.action, index, cfg.max_holding_periods)
                {
                    let trade = open.close(
                        candle,
                        index,
                        price,
                        reason,
                        cfg.slippage_rate,
                        cfg.fee_rate,
                    );
                    capital += trade.pnl;
                    equity_curve.push(EquityPoint {
                        timestamp: candle.timestamp,
                        equity: capital,
                    });
                    trades.push(trade);
                    position = None;
                }
            }

            if position.is_none() {
                position = self.open_position(candle, signal, index, capital);
            }
        }

        if let (Some(open), Some(last)) = (position.take(), candles.last()) {
            let trade = open.close(
                last,
                candles.len() - 1,
                last.close,
                ExitReason::EndOfData,
                cfg.slippage_rate,
                cfg.fee_rate,
            );
            capital += trade.pnl;
            equity_curve.push(EquityPoint {
                timestamp: last.timestamp,
                equity: capital,
            });
            trades.push(trade);
        }

        let metrics = Metrics::compute(&trades, &equity_curve, cfg.initial_capital);
        Ok(BacktestResults {
            trades,
            metrics,
            equity_curve,
        })
    }

    fn open_position(
        &self,
        candle: &Candle,
        signal: &SignalRecord,
        index: usize,
        capital: f64,
    ) -> Option<Position> {
        let cfg = &self.config;
        let side = match signal.action {
            SignalAction::Buy => Side::Long,
            SignalAction::Sell if cfg.allow_short => Side::Short,
            _ => return None,
        };
        let entry = candle.close;
        if !entry.is_finite() || entry <= 0.0 || capital <= 0.0 {
            return None;
        }
        let direction = side.direction();

        let stop_loss = match signal.stop_loss {
            Some(stop) => stop,
            None => entry - direction * candle.usable_atr()? * cfg.default_stop_atr,
        };
        let distance = direction * (entry - stop_loss);
        if !stop_loss.is_finite() || !distance.is_finite() || distance <= 0.0 {
            return None;
        }
        let take_profit = match signal.take_profit {
            Some(target) => target,
            None => entry + direction * distance * cfg.default_risk_reward,
        };
        if !take_profit.is_finite() || direction * (take_profit - entry) <= 0.0 {
            return None;
        }

        let multiplier = signal.size_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return None;
        }
        let risk_amount = capital * cfg.risk_per_trade * multiplier;
        let size = (risk_amount / (distance / entry)).min(capital);
        if !size.is_finite() || size <= 0.0 {
            return None;
        }

        Some(Position {
            side,
            entry_index: index,
            entry_time: candle.timestamp,
            entry_reference: entry,
            entry_fill: entry * (1.0 + direction * cfg.slippage_rate),
            size,
            stop_loss,
            take_profit,
        })
    }
}

fn ensure_aligned(candles: &[Candle], signals: &[SignalRecord]) -> Result<(), InputError> {
    if candles.len() != signals.len() {
        return Err(InputError::SignalMisaligned(format!(
            "{} signals for {} candles",
            signals.len(),
            candles.len()
        )));
    }
    for (index, (candle, signal)) in candles.iter().zip(signals).enumerate() {
        if candle.timestamp != signal.timestamp {
            return Err(InputError::SignalMisaligned(format!(
                "index {index}: candle timestamp {} but signal timestamp {}",
                candle.timestamp, signal.timestamp
            )));
        }
    }
    Ok(())
}
