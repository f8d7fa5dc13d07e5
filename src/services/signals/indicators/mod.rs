//! Incremental technical indicators.
//!
//! Every indicator keeps O(1) running state and is fed one closed candle at a
//! time. Values reported for earlier candles are never revised.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use ema::Ema;
pub use macd::{Macd, MacdValue};
pub use rsi::Rsi;
pub use sma::Sma;

use crate::config::IndicatorConfig;
use crate::types::Candle;
use serde::{Deserialize, Serialize};

/// Trait for incremental indicators.
pub trait Indicator {
    type Output: Copy;

    /// Number of candles needed before the first value is emitted.
    fn min_periods(&self) -> usize;

    /// Feed the next closed candle and return the new value, if warmed up.
    fn update(&mut self, candle: &Candle) -> Option<Self::Output>;

    /// Latest value, if warmed up.
    fn value(&self) -> Option<Self::Output>;
}

/// Run an indicator across a slice and return its final value.
pub fn run<I: Indicator>(mut indicator: I, candles: &[Candle]) -> Option<I::Output> {
    candles.iter().for_each(|c| {
        indicator.update(c);
    });
    indicator.value()
}

/// Run an indicator across a slice and return the value after every candle.
pub fn series<I: Indicator>(mut indicator: I, candles: &[Candle]) -> Vec<Option<I::Output>> {
    candles.iter().map(|c| indicator.update(c)).collect()
}

/// Indicator readings attached to a window after its latest close.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub prev_rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub prev_macd: Option<MacdValue>,
}

/// Indicator state for one timeframe window.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    sma_fast: Sma,
    sma_slow: Sma,
    rsi: Rsi,
    macd: Macd,
    snapshot: IndicatorSnapshot,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            sma_fast: Sma::new(config.sma_fast),
            sma_slow: Sma::new(config.sma_slow),
            rsi: Rsi::new(config.rsi_period),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            snapshot: IndicatorSnapshot::default(),
        }
    }

    /// Advance every indicator by one closed candle.
    pub fn on_close(&mut self, candle: &Candle) {
        let prev_rsi = self.snapshot.rsi;
        let prev_macd = self.snapshot.macd;

        self.snapshot = IndicatorSnapshot {
            close: Some(candle.close),
            sma_fast: self.sma_fast.update(candle),
            sma_slow: self.sma_slow.update(candle),
            rsi: self.rsi.update(candle),
            prev_rsi,
            macd: self.macd.update(candle),
            prev_macd,
        };
    }

    pub fn snapshot(&self) -> &IndicatorSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1.0))
            .collect()
    }

    #[test]
    fn test_engine_tracks_previous_values() {
        let config = IndicatorConfig::default();
        let mut engine = IndicatorEngine::new(&config);
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 7) as f64).collect();
        for c in candles(&closes) {
            engine.on_close(&c);
        }
        let snap = engine.snapshot();
        assert!(snap.sma_fast.is_some());
        assert!(snap.sma_slow.is_none());
        assert!(snap.rsi.is_some() && snap.prev_rsi.is_some());
        assert!(snap.macd.is_some() && snap.prev_macd.is_some());
        assert_eq!(snap.close, Some(*closes.last().unwrap()));
    }

    #[test]
    fn test_engine_matches_batch_helpers() {
        let config = IndicatorConfig::default();
        let mut engine = IndicatorEngine::new(&config);
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let data = candles(&closes);
        for c in &data {
            engine.on_close(c);
        }
        let snap = engine.snapshot();
        assert_eq!(snap.sma_fast, run(Sma::new(50), &data));
        assert_eq!(snap.rsi, run(Rsi::new(14), &data));
        assert_eq!(snap.macd, run(Macd::default(), &data));
    }

    #[test]
    fn test_series_reports_warmup_as_none() {
        let data = candles(&[1.0, 2.0, 3.0, 4.0]);
        let values = series(Sma::new(3), &data);
        assert_eq!(values, vec![None, None, Some(2.0), Some(3.0)]);
    }
}
