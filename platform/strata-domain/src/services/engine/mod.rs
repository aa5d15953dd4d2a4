pub mod backtest;

pub use backtest::{BacktestEngine, BacktestResults, EngineConfig};
