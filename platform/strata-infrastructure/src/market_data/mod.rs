pub mod ohlcv;

pub use ohlcv::{load_csv, CsvCandleRepository, LoadReport};
