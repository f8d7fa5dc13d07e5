//! Exponential Moving Average (EMA) indicator.

use super::{Indicator, Sma};
use crate::types::Candle;

/// EMA (Exponential Moving Average) indicator.
///
/// Seeded with the SMA of the first `period` inputs, then maintained as a
/// single running scalar.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    seed: Sma,
    ema: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            seed: Sma::new(period),
            ema: None,
        }
    }

    /// Feed a raw value.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.ema = match self.ema {
            Some(prev) => Some((value - prev) * self.multiplier + prev),
            None => self.seed.push(value),
        };
        self.ema
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.period
    }

    fn update(&mut self, candle: &Candle) -> Option<f64> {
        self.push(candle.close)
    }

    fn value(&self) -> Option<f64> {
        self.ema
    }
}
