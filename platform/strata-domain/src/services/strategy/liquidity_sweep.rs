use super::levels::{cluster_levels, find_swings, KeyLevel, LevelKind, SwingKind, SwingPoint};
use super::params::ParamReader;
use super::{StrategyFactory, StrategyModel};
use crate::errors::InputError;
use crate::value_objects::candle::Candle;
use crate::value_objects::params::{ParamRange, ParamValue, ParameterSpace, Params};
use crate::value_objects::signal::SignalRecord;

pub const NAME: &str = "liquidity_sweep";

/// Levels further than this many ATRs from the current close are ignored.
const LEVEL_DISTANCE_ATR: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LiquiditySweepConfig {
    pub swing_lookback: usize,
    pub min_level_touches: usize,
    pub min_distance_from_level: f64,
    pub pierce_depth: f64,
    pub volume_spike_threshold: f64,
    pub volume_lookback: usize,
    pub reversal_candles: usize,
    pub level_lookback: usize,
    pub atr_multiplier_sl: f64,
    pub risk_reward_ratio: f64,
}

impl Default for LiquiditySweepConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 5,
            min_level_touches: 2,
            min_distance_from_level: 0.002,
            pierce_depth: 0.001,
            volume_spike_threshold: 1.5,
            volume_lookback: 20,
            reversal_candles: 2,
            level_lookback: 200,
            atr_multiplier_sl: 1.5,
            risk_reward_ratio: 2.0,
        }
    }
}

impl LiquiditySweepConfig {
    pub fn from_params(params: &Params) -> Result<Self, InputError> {
        let d = Self::default();
        let mut reader = ParamReader::new(params);
        let config = Self {
            swing_lookback: reader.usize("swing_lookback", d.swing_lookback, 1, 100)?,
            min_level_touches: reader.usize("min_level_touches", d.min_level_touches, 1, 50)?,
            min_distance_from_level: reader.float(
                "min_distance_from_level",
                d.min_distance_from_level,
                0.0,
                0.5,
            )?,
            pierce_depth: reader.float("pierce_depth", d.pierce_depth, 0.0, 0.5)?,
            volume_spike_threshold: reader.float(
                "volume_spike_threshold",
                d.volume_spike_threshold,
                0.0,
                100.0,
            )?,
            volume_lookback: reader.usize("volume_lookback", d.volume_lookback, 1, 10_000)?,
            reversal_candles: reader.usize("reversal_candles", d.reversal_candles, 0, 100)?,
            level_lookback: reader.usize("level_lookback", d.level_lookback, 1, 100_000)?,
            atr_multiplier_sl: reader.float("atr_multiplier_sl", d.atr_multiplier_sl, 0.01, 100.0)?,
            risk_reward_ratio: reader.float("risk_reward_ratio", d.risk_reward_ratio, 0.01, 100.0)?,
        };
        reader.finish()?;
        Ok(config)
    }

    pub fn to_params(&self) -> Params {
        let mut params = Params::new();
        let mut int = |name: &str, value: usize| {
            params.insert(name.to_string(), ParamValue::Int(value as i64));
        };
        int("swing_lookback", self.swing_lookback);
        int("min_level_touches", self.min_level_touches);
        int("volume_lookback", self.volume_lookback);
        int("reversal_candles", self.reversal_candles);
        int("level_lookback", self.level_lookback);
        for (name, value) in [
            ("min_distance_from_level", self.min_distance_from_level),
            ("pierce_depth", self.pierce_depth),
            ("volume_spike_threshold", self.volume_spike_threshold),
            ("atr_multiplier_sl", self.atr_multiplier_sl),
            ("risk_reward_ratio", self.risk_reward_ratio),
        ] {
            params.insert(name.to_string(), ParamValue::Float(value));
        }
        params
    }
}

pub fn parameter_space() -> ParameterSpace {
    ParameterSpace::new()
        .with("swing_lookback", ParamRange::int(2, 10))
        .with("min_level_touches", ParamRange::int(1, 4))
        .with("min_distance_from_level", ParamRange::float(0.0005, 0.01))
        .with("pierce_depth", ParamRange::float(0.0005, 0.01))
        .with("volume_spike_threshold", ParamRange::float(1.0, 4.0))
        .with("reversal_candles", ParamRange::int(0, 4))
        .with("atr_multiplier_sl", ParamRange::float(0.5, 3.0))
        .with("risk_reward_ratio", ParamRange::float(1.0, 4.0))
}

/// Fades stop runs: a wick through a support/resistance cluster on a volume
/// spike, followed by closes back on the original side of the level.
#[derive(Debug, Clone)]
pub struct LiquiditySweep {
    config: LiquiditySweepConfig,
}

impl LiquiditySweep {
    pub fn new(config: LiquiditySweepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LiquiditySweepConfig {
        &self.config
    }

    fn signal_at(&self, candles: &[Candle], swings: &[SwingPoint], j: usize) -> Option<SignalRecord> {
        let cfg = &self.config;
        let p = j.checked_sub(cfg.reversal_candles)?;
        let current = &candles[j];
        let atr = current.usable_atr()?;

        let avg_volume = trailing_volume(candles, p, cfg.volume_lookback)?;
        if avg_volume <= 0.0 || candles[p].volume < cfg.volume_spike_threshold * avg_volume {
            return None;
        }

        // swings confirmed strictly before the pierce bar, inside the lookback window
        let window_start = p.saturating_sub(cfg.level_lookback);
        let confirmed_before = p.saturating_sub(cfg.swing_lookback);
        let lo = swings.partition_point(|s| s.index < window_start);
        let hi = swings.partition_point(|s| s.index < confirmed_before);
        let usable = swings.get(lo..hi.max(lo)).unwrap_or(&[]);
        if usable.is_empty() {
            return None;
        }

        let near = |level: &KeyLevel| (current.close - level.price).abs() <= LEVEL_DISTANCE_ATR * atr;
        let supports = self.levels(usable, SwingKind::Low, LevelKind::Support);
        if supports
            .iter()
            .filter(|level| near(level))
            .any(|level| self.support_swept(candles, p, j, level.price))
        {
            let stop = current.close - atr * cfg.atr_multiplier_sl;
            let target = current.close + (current.close - stop) * cfg.risk_reward_ratio;
            return Some(SignalRecord::buy(current.timestamp, stop, target));
        }

        let resistances = self.levels(usable, SwingKind::High, LevelKind::Resistance);
        if resistances
            .iter()
            .filter(|level| near(level))
            .any(|level| self.resistance_swept(candles, p, j, level.price))
        {
            let stop = current.close + atr * cfg.atr_multiplier_sl;
            let target = current.close - (stop - current.close) * cfg.risk_reward_ratio;
            return Some(SignalRecord::sell(current.timestamp, stop, target));
        }

        None
    }

    fn levels(&self, swings: &[SwingPoint], swing: SwingKind, kind: LevelKind) -> Vec<KeyLevel> {
        cluster_levels(
            swings.iter().filter(|s| s.kind == swing).map(|s| s.price),
            self.config.min_distance_from_level,
            self.config.min_level_touches,
            kind,
        )
    }

    fn support_swept(&self, candles: &[Candle], p: usize, j: usize, level: f64) -> bool {
        candles[p].low <= level * (1.0 - self.config.pierce_depth)
            && (p + 1..=j).all(|k| candles[k].close > level)
            && candles[j].close > level
    }

    fn resistance_swept(&self, candles: &[Candle], p: usize, j: usize, level: f64) -> bool {
        candles[p].high >= level * (1.0 + self.config.pierce_depth)
            && (p + 1..=j).all(|k| candles[k].close < level)
            && candles[j].close < level
    }
}

/// Mean volume of the `lookback` bars before `p`; `None` without full history.
fn trailing_volume(candles: &[Candle], p: usize, lookback: usize) -> Option<f64> {
    if lookback == 0 || p < lookback {
        return None;
    }
    let window = &candles[p - lookback..p];
    Some(window.iter().map(|c| c.volume).sum::<f64>() / lookback as f64)
}

impl StrategyModel for LiquiditySweep {
    fn name(&self) -> &str {
        NAME
    }

    fn generate_signals(&self, candles: &[Candle]) -> Result<Vec<SignalRecord>, InputError> {
        let swings = find_swings(candles, self.config.swing_lookback);
        Ok((0..candles.len())
            .map(|j| {
                self.signal_at(candles, &swings, j)
                    .unwrap_or_else(|| SignalRecord::hold(candles[j].timestamp))
            })
            .collect())
    }

    fn parameter_space(&self) -> ParameterSpace {
        parameter_space()
    }

    fn parameters(&self) -> Params {
        self.config.to_params()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquiditySweepFactory;

impl StrategyFactory for LiquiditySweepFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parameter_space(&self) -> ParameterSpace {
        parameter_space()
    }

    fn default_parameters(&self) -> Params {
        LiquiditySweepConfig::default().to_params()
    }

    fn build(&self, params: &Params) -> Result<Box<dyn StrategyModel>, InputError> {
        let config = LiquiditySweepConfig::from_params(params)?;
        Ok(Box::new(LiquiditySweep::new(config)))
    }
}
