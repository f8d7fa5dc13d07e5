//! MACD (Moving Average Convergence Divergence) indicator.

use super::{Ema, Indicator};
use crate::types::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD indicator.
///
/// Shows the relationship between two EMAs:
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
#[derive(Debug, Clone)]
pub struct Macd {
    slow_period: usize,
    signal_period: usize,
    fast: Ema,
    slow: Ema,
    signal: Ema,
    value: Option<MacdValue>,
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            slow_period,
            signal_period,
            fast: Ema::new(fast_period),
            slow: Ema::new(slow_period),
            signal: Ema::new(signal_period),
            value: None,
        }
    }

    /// Feed a raw close.
    pub fn push(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.push(close);
        let slow = self.slow.push(close);

        if let (Some(fast), Some(slow)) = (fast, slow) {
            let line = fast - slow;
            if let Some(signal) = self.signal.push(line) {
                self.value = Some(MacdValue {
                    line,
                    signal,
                    histogram: line - signal,
                });
            }
        }
        self.value
    }
}

impl Indicator for Macd {
    type Output = MacdValue;

    fn min_periods(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    fn update(&mut self, candle: &Candle) -> Option<MacdValue> {
        self.push(candle.close)
    }

    fn value(&self) -> Option<MacdValue> {
        self.value
    }
}
