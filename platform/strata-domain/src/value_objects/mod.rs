pub mod candle;
pub mod equity_point;
pub mod params;
pub mod side;
pub mod signal;
pub mod trade;
