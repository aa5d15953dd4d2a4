use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use strata_domain::entities::metrics::Metrics;
use strata_domain::services::engine::BacktestEngine;
use strata_domain::services::series::{candles_per_day, ensure_increasing, ensure_series};
use strata_domain::services::strategy::StrategyFactory;
use strata_domain::value_objects::candle::Candle;
use strata_domain::value_objects::params::Params;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub train_window_days: f64,
    pub test_window_days: f64,
    pub gap_days: f64,
    pub min_windows: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_window_days: 60.0,
            test_window_days: 30.0,
            gap_days: 7.0,
            min_windows: 2,
        }
    }
}

impl WalkForwardConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PipelineError::Config(format!("{name} must be > 0 (got {value})")))
            }
        };
        positive("train_window_days", self.train_window_days)?;
        positive("test_window_days", self.test_window_days)?;
        if !self.gap_days.is_finite() || self.gap_days < 0.0 {
            return Err(PipelineError::Config(format!(
                "gap_days must be >= 0 (got {})",
                self.gap_days
            )));
        }
        if self.min_windows == 0 {
            return Err(PipelineError::Config("min_windows must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Index layout of one window. Train is `train_start_idx..=train_end_idx`,
/// the gap is `train_end_idx + 1..gap_end_idx` and test is
/// `test_start_idx..test_end_idx`, with `test_start_idx == gap_end_idx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub window_id: usize,
    pub train_start_idx: usize,
    pub train_end_idx: usize,
    pub gap_end_idx: usize,
    pub test_start_idx: usize,
    pub test_end_idx: usize,
}

/// Rolls windows forward by half a train window until the next one would
/// run past `n`.
pub fn plan_windows(n: usize, train: usize, gap: usize, test: usize) -> Vec<WindowBounds> {
    let mut windows = Vec::new();
    if train == 0 || test == 0 {
        return windows;
    }
    let step = (train / 2).max(1);
    let Some(span) = train.checked_add(gap).and_then(|s| s.checked_add(test)) else {
        return windows;
    };
    let mut start = 0usize;
    while start.checked_add(span).is_some_and(|end| end <= n) {
        let gap_end = start + train + gap;
        windows.push(WindowBounds {
            window_id: windows.len(),
            train_start_idx: start,
            train_end_idx: start + train - 1,
            gap_end_idx: gap_end,
            test_start_idx: gap_end,
            test_end_idx: gap_end + test,
        });
        start += step;
    }
    windows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWindow {
    #[serde(flatten)]
    pub bounds: WindowBounds,
    pub train_start_ts: i64,
    pub train_end_ts: i64,
    pub test_start_ts: i64,
    pub test_end_ts: i64,
    pub train_metrics: Metrics,
    pub test_metrics: Metrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideAggregate {
    pub sharpe_mean: f64,
    pub sharpe_std: f64,
    pub win_rate_mean: f64,
    pub win_rate_std: f64,
    pub net_profit_pct_mean: f64,
    pub net_profit_pct_std: f64,
    pub profitable_windows: usize,
    pub total_trades: usize,
}

impl SideAggregate {
    fn from_metrics<'a>(metrics: impl Iterator<Item = &'a Metrics> + Clone) -> Self {
        let (sharpe_mean, sharpe_std) = mean_std(metrics.clone().map(|m| m.sharpe_ratio));
        let (win_rate_mean, win_rate_std) = mean_std(metrics.clone().map(|m| m.win_rate));
        let (net_profit_pct_mean, net_profit_pct_std) =
            mean_std(metrics.clone().map(|m| m.net_profit_pct));
        Self {
            sharpe_mean,
            sharpe_std,
            win_rate_mean,
            win_rate_std,
            net_profit_pct_mean,
            net_profit_pct_std,
            profitable_windows: metrics.clone().filter(|m| m.net_profit > 0.0).count(),
            total_trades: metrics.map(|m| m.total_trades).sum(),
        }
    }
}

/// Population mean and standard deviation; zeros for no data.
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub window_count: usize,
    pub train: SideAggregate,
    pub test: SideAggregate,
}

impl AggregateMetrics {
    pub fn from_windows(windows: &[ValidationWindow]) -> Self {
        Self {
            window_count: windows.len(),
            train: SideAggregate::from_metrics(windows.iter().map(|w| &w.train_metrics)),
            test: SideAggregate::from_metrics(windows.iter().map(|w| &w.test_metrics)),
        }
    }

    /// Every overfitting signal that fires, in a fixed order.
    pub fn overfitting_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        let (train, test) = (&self.train, &self.test);
        if test.sharpe_mean < 0.7 * train.sharpe_mean {
            reasons.push(format!(
                "test Sharpe {:.3} is below 70% of train Sharpe {:.3}",
                test.sharpe_mean, train.sharpe_mean
            ));
        }
        if test.win_rate_mean < 0.8 * train.win_rate_mean {
            reasons.push(format!(
                "test win rate {:.3} is below 80% of train win rate {:.3}",
                test.win_rate_mean, train.win_rate_mean
            ));
        }
        if test.sharpe_mean < 0.0 {
            reasons.push(format!("test Sharpe {:.3} is negative", test.sharpe_mean));
        }
        if test.sharpe_std > 1.5 {
            reasons.push(format!(
                "test Sharpe std {:.3} exceeds 1.5",
                test.sharpe_std
            ));
        }
        if (test.profitable_windows as f64) < self.window_count as f64 / 2.0 {
            reasons.push(format!(
                "only {} of {} test windows are profitable",
                test.profitable_windows, self.window_count
            ));
        }
        reasons
    }

    /// Consistency of out-of-sample results in `[0, 1]`.
    pub fn stability_score(&self) -> f64 {
        if self.window_count == 0 {
            return 0.0;
        }
        let profitable = self.test.profitable_windows as f64 / self.window_count as f64;
        let score = 0.4 / (1.0 + self.test.sharpe_std)
            + 0.3 / (1.0 + 10.0 * self.test.win_rate_std)
            + 0.3 * profitable;
        score.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub strategy: String,
    pub parameters: Params,
    pub config: WalkForwardConfig,
    pub candles_per_day: f64,
    pub train_candles: usize,
    pub gap_candles: usize,
    pub test_candles: usize,
    pub windows: Vec<ValidationWindow>,
    pub aggregate_metrics: AggregateMetrics,
    pub overfitting_detected: bool,
    pub overfitting_reasons: Vec<String>,
    pub stability_score: f64,
}

/// Replays one fixed parameter set over rolling train/gap/test windows.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardValidator {
    config: WalkForwardConfig,
}

impl WalkForwardValidator {
    pub fn new(config: WalkForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    pub fn validate(
        &self,
        parameters: &Params,
        candles: &[Candle],
        strategy: &dyn StrategyFactory,
        engine: &BacktestEngine,
    ) -> Result<ValidationResult, PipelineError> {
        let cfg = self.config;
        cfg.validate()?;
        ensure_increasing(candles)?;

        let _span = tracing::info_span!(
            "validate",
            strategy = strategy.name(),
            candles = candles.len(),
            train_days = cfg.train_window_days,
            test_days = cfg.test_window_days,
            gap_days = cfg.gap_days,
        )
        .entered();

        let cpd = candles_per_day(candles).unwrap_or(1.0);
        let to_candles = |days: f64| (days * cpd).round() as usize;
        let train = to_candles(cfg.train_window_days).max(1);
        let gap = to_candles(cfg.gap_days);
        let test = to_candles(cfg.test_window_days).max(1);

        let bounds = plan_windows(candles.len(), train, gap, test);
        if bounds.len() < cfg.min_windows {
            let step = (train / 2).max(1);
            let required = train
                .saturating_add(gap)
                .saturating_add(test)
                .saturating_add((cfg.min_windows - 1).saturating_mul(step));
            let err = PipelineError::InsufficientData {
                required_days: required as f64 / cpd,
                available_days: candles.len() as f64 / cpd,
                windows: bounds.len(),
                min_windows: cfg.min_windows,
            };
            tracing::warn!(error = %err, "walk-forward validation skipped");
            return Err(err);
        }
        ensure_series(candles)?;

        let mut windows = Vec::with_capacity(bounds.len());
        for window in bounds {
            let _window_span = tracing::debug_span!("window", id = window.window_id).entered();
            let model = strategy.build(parameters)?;
            let train_slice = &candles[window.train_start_idx..=window.train_end_idx];
            let test_slice = &candles[window.test_start_idx..window.test_end_idx];
            let train_result = engine.run(train_slice, model.as_ref())?;
            let test_result = engine.run(test_slice, model.as_ref())?;
            metrics::counter!("strata.validate.windows").increment(1);
            tracing::debug!(
                train_sharpe = train_result.metrics.sharpe_ratio,
                test_sharpe = test_result.metrics.sharpe_ratio,
                train_trades = train_result.metrics.total_trades,
                test_trades = test_result.metrics.total_trades,
                "window evaluated"
            );

            windows.push(ValidationWindow {
                bounds: window,
                train_start_ts: candles[window.train_start_idx].timestamp,
                train_end_ts: candles[window.train_end_idx].timestamp,
                test_start_ts: candles[window.test_start_idx].timestamp,
                test_end_ts: candles[window.test_end_idx - 1].timestamp,
                train_metrics: train_result.metrics,
                test_metrics: test_result.metrics,
            });
        }

        let aggregate_metrics = AggregateMetrics::from_windows(&windows);
        let overfitting_reasons = aggregate_metrics.overfitting_reasons();
        let stability_score = aggregate_metrics.stability_score();
        tracing::info!(
            windows = windows.len(),
            overfitting = !overfitting_reasons.is_empty(),
            stability = stability_score,
            "walk-forward validation finished"
        );

        Ok(ValidationResult {
            strategy: strategy.name().to_string(),
            parameters: parameters.clone(),
            config: cfg,
            candles_per_day: cpd,
            train_candles: train,
            gap_candles: gap,
            test_candles: test,
            windows,
            aggregate_metrics,
            overfitting_detected: !overfitting_reasons.is_empty(),
            overfitting_reasons,
            stability_score,
        })
    }
}

/// Walk-forward validation with the default `min_windows`.
pub fn validate(
    parameters: &Params,
    candles: &[Candle],
    strategy: &dyn StrategyFactory,
    engine: &BacktestEngine,
    train_window_days: f64,
    test_window_days: f64,
    gap_days: f64,
) -> Result<ValidationResult, PipelineError> {
    WalkForwardValidator::new(WalkForwardConfig {
        train_window_days,
        test_window_days,
        gap_days,
        ..WalkForwardConfig::default()
    })
    .validate(parameters, candles, strategy, engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_roll_by_half_train_without_overlap_into_test() {
        let windows = plan_windows(100, 20, 5, 10);
        assert_eq!(windows.len(), 7);
        let first = windows[0];
        assert_eq!(first.train_start_idx, 0);
        assert_eq!(first.train_end_idx, 19);
        assert_eq!(first.gap_end_idx, 25);
        assert_eq!(first.test_start_idx, 25);
        assert_eq!(first.test_end_idx, 35);
        assert_eq!(windows[1].train_start_idx, 10);
        let last = windows[windows.len() - 1];
        assert!(last.test_end_idx <= 100);
        for w in &windows {
            assert!(w.test_start_idx >= w.gap_end_idx && w.gap_end_idx > w.train_end_idx);
        }
    }

    #[test]
    fn too_short_series_plans_nothing() {
        assert!(plan_windows(30, 20, 5, 10).is_empty());
        assert!(plan_windows(100, 0, 5, 10).is_empty());
    }

    #[test]
    fn oversized_windows_plan_nothing_instead_of_overflowing() {
        assert!(plan_windows(1000, usize::MAX, 0, 1).is_empty());
        assert!(plan_windows(1000, 10, usize::MAX, 1).is_empty());
        assert!(plan_windows(usize::MAX, usize::MAX / 2, 0, usize::MAX / 2).is_empty());
    }

    fn metrics(sharpe: f64, win_rate: f64, net_profit: f64) -> Metrics {
        Metrics {
            sharpe_ratio: sharpe,
            win_rate,
            net_profit,
            net_profit_pct: net_profit / 100.0,
            total_trades: 4,
            ..Metrics::default()
        }
    }

    fn window(id: usize, train: Metrics, test: Metrics) -> ValidationWindow {
        ValidationWindow {
            bounds: WindowBounds {
                window_id: id,
                train_start_idx: 0,
                train_end_idx: 9,
                gap_end_idx: 12,
                test_start_idx: 12,
                test_end_idx: 17,
            },
            train_start_ts: 0,
            train_end_ts: 9,
            test_start_ts: 12,
            test_end_ts: 16,
            train_metrics: train,
            test_metrics: test,
        }
    }

    #[test]
    fn consistent_windows_are_not_flagged() {
        let windows = vec![
            window(0, metrics(1.0, 0.6, 10.0), metrics(1.0, 0.6, 5.0)),
            window(1, metrics(1.2, 0.6, 12.0), metrics(1.0, 0.6, 6.0)),
        ];
        let agg = AggregateMetrics::from_windows(&windows);
        assert_eq!(agg.window_count, 2);
        assert!((agg.train.sharpe_mean - 1.1).abs() < 1e-12);
        assert!((agg.train.sharpe_std - 0.1).abs() < 1e-12);
        assert_eq!(agg.test.profitable_windows, 2);
        assert_eq!(agg.test.total_trades, 8);
        assert!(agg.overfitting_reasons().is_empty());
        assert!((agg.stability_score() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degraded_out_of_sample_results_are_flagged() {
        let windows = vec![
            window(0, metrics(2.0, 0.7, 10.0), metrics(-1.0, 0.3, -5.0)),
            window(1, metrics(2.0, 0.7, 10.0), metrics(3.0, 0.5, 2.0)),
            window(2, metrics(2.0, 0.7, 10.0), metrics(-2.5, 0.2, -3.0)),
        ];
        let agg = AggregateMetrics::from_windows(&windows);
        let reasons = agg.overfitting_reasons();
        assert_eq!(reasons.len(), 5, "{reasons:?}");
        assert!(agg.stability_score() < 0.5);
    }
}
