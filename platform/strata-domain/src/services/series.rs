use crate::errors::InputError;
use crate::value_objects::candle::Candle;

pub const MS_PER_DAY: i64 = 86_400_000;

pub fn ensure_increasing(candles: &[Candle]) -> Result<(), InputError> {
    for (index, pair) in candles.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(InputError::NonMonotonicTimestamps {
                index: index + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// Checks the preconditions the engine relies on: strictly increasing timestamps
/// and an ATR column that is populated at least somewhere.
pub fn ensure_series(candles: &[Candle]) -> Result<(), InputError> {
    if candles.is_empty() {
        return Ok(());
    }
    ensure_increasing(candles)?;
    if !candles.iter().any(|candle| candle.atr.is_some()) {
        return Err(InputError::MissingField("atr"));
    }
    Ok(())
}

/// Median spacing between consecutive candles.
pub fn median_step_ms(candles: &[Candle]) -> Option<i64> {
    if candles.len() < 2 {
        return None;
    }
    let mut deltas: Vec<i64> = candles
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .collect();
    deltas.sort_unstable();
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2
    } else {
        deltas[mid]
    };
    (median > 0).then_some(median)
}

/// Candles per calendar day derived from the median spacing. Below 1 for
/// timeframes longer than a day.
pub fn candles_per_day(candles: &[Candle]) -> Option<f64> {
    let step = median_step_ms(candles)?;
    Some(MS_PER_DAY as f64 / step as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::candle::RawCandle;

    fn candle(timestamp: i64, atr: Option<f64>) -> Candle {
        let mut candle = Candle::from_raw(RawCandle {
            timestamp,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        });
        candle.atr = atr;
        candle
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let candles = vec![candle(0, Some(1.0)), candle(0, Some(1.0))];
        assert_eq!(
            ensure_series(&candles),
            Err(InputError::NonMonotonicTimestamps {
                index: 1,
                previous: 0,
                current: 0,
            })
        );
    }

    #[test]
    fn requires_atr_somewhere() {
        let candles = vec![candle(0, None), candle(60_000, None)];
        assert_eq!(ensure_series(&candles), Err(InputError::MissingField("atr")));
        let candles = vec![candle(0, None), candle(60_000, Some(0.5))];
        assert_eq!(ensure_series(&candles), Ok(()));
    }

    #[test]
    fn candles_per_day_uses_median_spacing() {
        let mut candles: Vec<Candle> = (0..10).map(|i| candle(i * 60_000, None)).collect();
        candles.push(candle(10 * 60_000 + 3_600_000, None));
        assert_eq!(median_step_ms(&candles), Some(60_000));
        assert_eq!(candles_per_day(&candles), Some(1440.0));
        assert_eq!(candles_per_day(&candles[..1]), None);
    }

    #[test]
    fn candles_per_day_is_fractional_for_weekly_bars() {
        let week = 7 * MS_PER_DAY;
        let candles: Vec<Candle> = (0..10).map(|i| candle(i * week, None)).collect();
        let cpd = candles_per_day(&candles).expect("cpd");
        assert!((cpd - 1.0 / 7.0).abs() < 1e-12);
    }
}
