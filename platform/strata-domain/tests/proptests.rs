use proptest::prelude::*;
use strata_domain::services::engine::{BacktestEngine, BacktestResults, EngineConfig};
use strata_domain::value_objects::candle::Candle;
use strata_domain::value_objects::signal::{SignalAction, SignalRecord};
use strata_domain::value_objects::trade::ExitReason;

/// (close, upper wick, lower wick, action code, stop distance)
type BarSpec = (f64, f64, f64, u8, f64);

fn bar_spec() -> impl Strategy<Value = BarSpec> {
    (
        50.0f64..150.0,
        0.0f64..0.03,
        0.0f64..0.03,
        0u8..6,
        0.005f64..0.2,
    )
}

fn build(specs: &[BarSpec]) -> (Vec<Candle>, Vec<SignalRecord>) {
    let mut candles = Vec::with_capacity(specs.len());
    let mut signals = Vec::with_capacity(specs.len());
    for (idx, (close, up, down, code, stop_pct)) in specs.iter().copied().enumerate() {
        let timestamp = idx as i64 * 60_000;
        candles.push(Candle {
            timestamp,
            open: close,
            high: close * (1.0 + up),
            low: close * (1.0 - down),
            close,
            volume: 1.0,
            atr: Some(close * 0.01),
            sma_20: None,
            sma_50: None,
        });
        let distance = close * stop_pct;
        signals.push(match code {
            0 => SignalRecord::buy(timestamp, close - distance, close + 2.0 * distance),
            1 => SignalRecord::sell(timestamp, close + distance, close - 2.0 * distance),
            _ => SignalRecord::hold(timestamp),
        });
    }
    (candles, signals)
}

fn run(config: EngineConfig, candles: &[Candle], signals: &[SignalRecord]) -> BacktestResults {
    BacktestEngine::new(config)
        .expect("valid config")
        .run_signals(candles, signals)
        .expect("aligned input")
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn runs_are_deterministic(specs in prop::collection::vec(bar_spec(), 2..120)) {
        let (candles, signals) = build(&specs);
        let first = run(EngineConfig::default(), &candles, &signals);
        let second = run(EngineConfig::default(), &candles, &signals);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn pnl_sums_to_equity_change(specs in prop::collection::vec(bar_spec(), 2..120)) {
        let (candles, signals) = build(&specs);
        let config = EngineConfig::default();
        let result = run(config.clone(), &candles, &signals);
        let total: f64 = result.trades.iter().map(|t| t.pnl).sum();
        let change = result.metrics.final_equity - config.initial_capital;
        prop_assert!((total - change).abs() < 1e-6);
        if let Some(last) = result.equity_curve.last() {
            prop_assert!((last.equity - result.metrics.final_equity).abs() < 1e-6);
        }
        prop_assert!(result.metrics.sharpe_ratio.is_finite());
        prop_assert!(result.metrics.max_drawdown_pct >= 0.0);
    }

    #[test]
    fn at_most_one_position_at_a_time(specs in prop::collection::vec(bar_spec(), 2..120)) {
        let (candles, signals) = build(&specs);
        let result = run(EngineConfig::default(), &candles, &signals);
        for trade in &result.trades {
            prop_assert!(trade.exit_index >= trade.entry_index);
            if trade.exit_reason != ExitReason::EndOfData {
                prop_assert!(trade.exit_index > trade.entry_index);
            }
            prop_assert!(signals[trade.entry_index].action != SignalAction::Hold);
        }
        for pair in result.trades.windows(2) {
            prop_assert!(pair[1].entry_index >= pair[0].exit_index);
        }
    }

    #[test]
    fn more_friction_never_helps(
        specs in prop::collection::vec(bar_spec(), 2..120),
        fee in 0.0f64..0.003,
        extra_fee in 0.0f64..0.003,
        slippage in 0.0f64..0.002,
        extra_slippage in 0.0f64..0.002,
    ) {
        let (candles, signals) = build(&specs);
        let cheap = EngineConfig {
            fee_rate: fee,
            slippage_rate: slippage,
            ..EngineConfig::default()
        };
        let costly = EngineConfig {
            fee_rate: fee + extra_fee,
            slippage_rate: slippage + extra_slippage,
            ..EngineConfig::default()
        };
        let cheap = run(cheap, &candles, &signals);
        let costly = run(costly, &candles, &signals);
        prop_assert_eq!(cheap.trades.len(), costly.trades.len());
        prop_assert!(costly.metrics.net_profit <= cheap.metrics.net_profit + 1e-6);
    }
}
