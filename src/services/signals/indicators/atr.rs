//! Average True Range (ATR) indicator.

use super::Indicator;
use crate::types::Candle;

/// ATR (Average True Range) indicator.
///
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|), smoothed with
/// Wilder's method. Used as the volatility yardstick by the pattern detectors.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed_count: usize,
    tr_sum: f64,
    atr: Option<f64>,
}

impl Default for Atr {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed_count: 0,
            tr_sum: 0.0,
            atr: None,
        }
    }

    /// True range against the previous close.
    pub fn true_range(current: &Candle, prev_close: f64) -> f64 {
        let hl = current.high - current.low;
        let hc = (current.high - prev_close).abs();
        let lc = (current.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

impl Indicator for Atr {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, candle: &Candle) -> Option<f64> {
        let prev = self.prev_close.replace(candle.close);
        let prev = prev?;

        let tr = Self::true_range(candle, prev);
        let period = self.period as f64;

        self.atr = match self.atr {
            Some(atr) => Some((atr * (period - 1.0) + tr) / period),
            None => {
                self.tr_sum += tr;
                self.seed_count += 1;
                (self.seed_count == self.period).then(|| self.tr_sum / period)
            }
        };
        self.atr
    }

    fn value(&self) -> Option<f64> {
        self.atr
    }
}
