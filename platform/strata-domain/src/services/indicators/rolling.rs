use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingSma {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl RollingSma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        self.sum += value;
        while self.buf.len() > self.window {
            if let Some(front) = self.buf.pop_front() {
                self.sum -= front;
            }
        }

        if self.buf.len() == self.window {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }
}

/// Average true range with Wilder smoothing. Seeded by the plain mean of the
/// first `period` true ranges.
#[derive(Debug, Clone)]
pub struct WilderAtr {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl WilderAtr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        let range = high - low;
        let true_range = match self.prev_close {
            Some(prev) => range.max((high - prev).abs()).max((low - prev).abs()),
            None => range,
        };
        self.prev_close = Some(close);

        let period = self.period as f64;
        self.value = match self.value {
            Some(atr) => Some((atr * (period - 1.0) + true_range) / period),
            None => {
                self.seen += 1;
                self.seed_sum += true_range;
                (self.seen == self.period).then(|| self.seed_sum / period)
            }
        };
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_waits_for_full_window() {
        let mut sma = RollingSma::new(3);
        assert_eq!(sma.update(1.0), None);
        assert_eq!(sma.update(2.0), None);
        assert_eq!(sma.update(3.0), Some(2.0));
        assert_eq!(sma.update(6.0), Some(11.0 / 3.0));
    }

    #[test]
    fn atr_seeds_with_mean_then_smooths() {
        let mut atr = WilderAtr::new(2);
        assert_eq!(atr.update(11.0, 9.0, 10.0), None);
        // true range = max(1, |12-10|, |11-10|) = 2
        assert_eq!(atr.update(12.0, 11.0, 11.5), Some(2.0));
        // true range = 1, smoothed (2 * 1 + 1) / 2
        assert_eq!(atr.update(12.0, 11.0, 11.5), Some(1.5));
    }
}
