//! Simple Moving Average (SMA) indicator.

use super::Indicator;
use crate::types::Candle;
use std::collections::VecDeque;

/// SMA (Simple Moving Average) indicator.
///
/// Keeps the last `period` closes and a running sum, so each update adds the
/// new close and subtracts the one that fell out of the period.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed a raw value.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.period {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
            }
        }
        self.current()
    }

    fn current(&self) -> Option<f64> {
        if self.period > 0 && self.values.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.period
    }

    fn update(&mut self, candle: &Candle) -> Option<f64> {
        self.push(candle.close)
    }

    fn value(&self) -> Option<f64> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_insufficient_data() {
        let mut sma = Sma::new(3);
        assert_eq!(sma.push(1.0), None);
        assert_eq!(sma.push(2.0), None);
        assert_eq!(sma.value(), None);
    }

    #[test]
    fn test_sma_rolls_forward() {
        let mut sma = Sma::new(3);
        sma.push(1.0);
        sma.push(2.0);
        assert_eq!(sma.push(3.0), Some(2.0));
        assert_eq!(sma.push(6.0), Some(11.0 / 3.0));
        assert_eq!(sma.push(9.0), Some(6.0));
    }

    #[test]
    fn test_sma_min_periods() {
        assert_eq!(Sma::new(50).min_periods(), 50);
        assert_eq!(Sma::new(200).period(), 200);
    }
}
