use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-trade returns are annualized as if one trade happened per trading day.
pub const ANNUALIZATION_PERIODS: f64 = 252.0;

const EPSILON: f64 = 1e-12;

/// Summary statistics of one backtest run. Every degenerate case is 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub net_profit: f64,
    pub net_profit_pct: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_periods: f64,
    pub final_equity: f64,
}

impl Metrics {
    pub const NAMES: [&'static str; 21] = [
        "total_trades",
        "winning_trades",
        "losing_trades",
        "win_rate",
        "net_profit",
        "net_profit_pct",
        "gross_profit",
        "gross_loss",
        "profit_factor",
        "sharpe_ratio",
        "sortino_ratio",
        "calmar_ratio",
        "max_drawdown_pct",
        "avg_drawdown_pct",
        "expectancy",
        "avg_win",
        "avg_loss",
        "largest_win",
        "largest_loss",
        "avg_holding_periods",
        "final_equity",
    ];

    pub fn empty(initial_capital: f64) -> Self {
        Self {
            final_equity: initial_capital,
            ..Self::default()
        }
    }

    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        if trades.is_empty() {
            return Self::empty(initial_capital);
        }

        let total = trades.len();
        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|pnl| *pnl > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|pnl| *pnl < 0.0).collect();

        let net_profit: f64 = trades.iter().map(|t| t.pnl).sum();
        let final_equity = initial_capital + net_profit;
        let net_profit_pct = if initial_capital > 0.0 {
            net_profit / initial_capital * 100.0
        } else {
            0.0
        };

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|loss| loss.abs()).sum();
        let profit_factor = if gross_loss > EPSILON {
            gross_profit / gross_loss
        } else {
            0.0
        };

        let win_rate = wins.len() as f64 / total as f64;
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let loss_rate = losses.len() as f64 / total as f64;
        let expectancy = win_rate * avg_win + loss_rate * avg_loss;

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let (max_drawdown_pct, avg_drawdown_pct) = drawdowns(equity_curve);
        let calmar_ratio = if max_drawdown_pct > EPSILON {
            net_profit_pct / max_drawdown_pct
        } else {
            0.0
        };

        Self {
            total_trades: total,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            net_profit,
            net_profit_pct,
            gross_profit,
            gross_loss,
            profit_factor,
            sharpe_ratio: sharpe(&returns),
            sortino_ratio: sortino(&returns),
            calmar_ratio,
            max_drawdown_pct,
            avg_drawdown_pct,
            expectancy,
            avg_win,
            avg_loss,
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            avg_holding_periods: trades.iter().map(|t| t.holding_periods as f64).sum::<f64>()
                / total as f64,
            final_equity,
        }
    }

    /// Looks a metric up by name; counts are returned as floats.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "total_trades" => self.total_trades as f64,
            "winning_trades" => self.winning_trades as f64,
            "losing_trades" => self.losing_trades as f64,
            "win_rate" => self.win_rate,
            "net_profit" => self.net_profit,
            "net_profit_pct" => self.net_profit_pct,
            "gross_profit" => self.gross_profit,
            "gross_loss" => self.gross_loss,
            "profit_factor" => self.profit_factor,
            "sharpe_ratio" => self.sharpe_ratio,
            "sortino_ratio" => self.sortino_ratio,
            "calmar_ratio" => self.calmar_ratio,
            "max_drawdown_pct" => self.max_drawdown_pct,
            "avg_drawdown_pct" => self.avg_drawdown_pct,
            "expectancy" => self.expectancy,
            "avg_win" => self.avg_win,
            "avg_loss" => self.avg_loss,
            "largest_win" => self.largest_win,
            "largest_loss" => self.largest_loss,
            "avg_holding_periods" => self.avg_holding_periods,
            "final_equity" => self.final_equity,
            _ => return None,
        };
        Some(value)
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|value| (name.to_string(), value)))
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let avg = mean(returns);
    let var = returns
        .iter()
        .map(|ret| {
            let diff = ret - avg;
            diff * diff
        })
        .sum::<f64>()
        / (returns.len() as f64 - 1.0);
    let std = var.sqrt();
    if std > EPSILON {
        avg / std * ANNUALIZATION_PERIODS.sqrt()
    } else {
        0.0
    }
}

fn sortino(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let downside = (returns
        .iter()
        .map(|ret| ret.min(0.0).powi(2))
        .sum::<f64>()
        / returns.len() as f64)
        .sqrt();
    if downside > EPSILON {
        mean(returns) / downside * ANNUALIZATION_PERIODS.sqrt()
    } else {
        0.0
    }
}

/// Max and mean drawdown, in percent of the running peak, as positive numbers.
fn drawdowns(equity_curve: &[EquityPoint]) -> (f64, f64) {
    let mut peak = f64::MIN;
    let mut max_dd: f64 = 0.0;
    let mut sum = 0.0;
    let mut count = 0usize;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak <= 0.0 {
            continue;
        }
        let dd = (peak - point.equity) / peak * 100.0;
        if dd > 0.0 {
            max_dd = max_dd.max(dd);
            sum += dd;
            count += 1;
        }
    }
    let avg = if count == 0 { 0.0 } else { sum / count as f64 };
    (max_dd, avg)
}
