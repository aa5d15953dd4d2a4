use crate::value_objects::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLevel {
    pub price: f64,
    pub touches: usize,
    pub kind: LevelKind,
}

/// Strict local extremes over `[i - lookback, i + lookback]`, ordered by index.
/// A swing at `i` is only known once bar `i + lookback` has closed.
pub fn find_swings(candles: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    let n = candles.len();
    if lookback == 0 || n < 2 * lookback + 1 {
        return Vec::new();
    }

    let mut swings = Vec::new();
    for i in lookback..n - lookback {
        let window = (i - lookback..=i + lookback).filter(|k| *k != i);
        let (high, low) = (candles[i].high, candles[i].low);
        let mut is_high = true;
        let mut is_low = true;
        for k in window {
            is_high &= candles[k].high < high;
            is_low &= candles[k].low > low;
            if !is_high && !is_low {
                break;
            }
        }
        if is_high {
            swings.push(SwingPoint {
                index: i,
                price: high,
                kind: SwingKind::High,
            });
        }
        if is_low {
            swings.push(SwingPoint {
                index: i,
                price: low,
                kind: SwingKind::Low,
            });
        }
    }
    swings
}

/// Greedy clustering over sorted prices: a price within `tolerance` (relative)
/// of the running cluster mean joins it. Clusters with fewer than `min_touches`
/// members are dropped.
pub fn cluster_levels<I>(prices: I, tolerance: f64, min_touches: usize, kind: LevelKind) -> Vec<KeyLevel>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = prices.into_iter().filter(|p| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut levels = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;
    let flush = |sum: f64, count: usize, levels: &mut Vec<KeyLevel>| {
        if count > 0 && count >= min_touches {
            levels.push(KeyLevel {
                price: sum / count as f64,
                touches: count,
                kind,
            });
        }
    };

    for price in sorted {
        if count > 0 {
            let mean = sum / count as f64;
            if (price - mean).abs() <= tolerance * mean.abs() {
                sum += price;
                count += 1;
                continue;
            }
            flush(sum, count, &mut levels);
        }
        sum = price;
        count = 1;
    }
    flush(sum, count, &mut levels);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::candle::RawCandle;

    fn series(lows: &[f64]) -> Vec<Candle> {
        lows.iter()
            .enumerate()
            .map(|(i, low)| {
                Candle::from_raw(RawCandle {
                    timestamp: i as i64,
                    open: low + 1.0,
                    high: low + 2.0,
                    low: *low,
                    close: low + 1.0,
                    volume: 1.0,
                })
            })
            .collect()
    }

    #[test]
    fn swings_need_strict_extremes() {
        let candles = series(&[5.0, 4.0, 3.0, 4.0, 5.0, 3.0, 3.0, 5.0]);
        let lows: Vec<usize> = find_swings(&candles, 2)
            .into_iter()
            .filter(|s| s.kind == SwingKind::Low)
            .map(|s| s.index)
            .collect();
        // bars 5 and 6 tie, so neither is a strict low
        assert_eq!(lows, vec![2]);
    }

    #[test]
    fn swing_highs_mirror_lows() {
        let candles = series(&[1.0, 2.0, 5.0, 2.0, 1.0]);
        let swings = find_swings(&candles, 2);
        assert_eq!(
            swings,
            vec![SwingPoint {
                index: 2,
                price: 7.0,
                kind: SwingKind::High,
            }]
        );
    }

    #[test]
    fn clusters_merge_nearby_prices() {
        let levels = cluster_levels(
            vec![100.0, 100.1, 99.95, 105.0],
            0.002,
            2,
            LevelKind::Support,
        );
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].touches, 3);
        assert!((levels[0].price - (100.0 + 100.1 + 99.95) / 3.0).abs() < 1e-9);

        let singles = cluster_levels(vec![100.0, 105.0], 0.002, 1, LevelKind::Resistance);
        assert_eq!(singles.len(), 2);
    }
}
