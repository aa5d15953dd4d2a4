use crate::value_objects::candle::Candle;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleQuery {
    pub path: PathBuf,
    /// Inclusive bounds in epoch milliseconds.
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl CandleQuery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start: None,
            end: None,
        }
    }
}

/// Source of enriched candle series, ordered by timestamp without duplicates.
pub trait CandleRepository {
    fn load_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, String>;
}
