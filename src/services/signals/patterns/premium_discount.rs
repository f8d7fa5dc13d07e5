//! Premium and discount arrays over the recent dealing range.

use super::PatternDetector;
use crate::config::IctConfig;
use crate::types::{Candle, Direction, IctEvent, PremiumDiscount, PriceZone};

const OTE_CONFIDENCE: u8 = 95;
const ZONE_CONFIDENCE: u8 = 75;
const EQUILIBRIUM_CONFIDENCE: u8 = 50;

/// Splits the last `range_lookback` candles at their midpoint and reports
/// which half the last close trades in.
pub struct PremiumDiscountDetector;

impl PatternDetector for PremiumDiscountDetector {
    fn id(&self) -> &'static str {
        "premium_discount"
    }

    fn min_candles(&self, config: &IctConfig) -> usize {
        config.range_lookback
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        premium_discount(candles, config)
            .map(IctEvent::PremiumDiscount)
            .into_iter()
            .collect()
    }
}

/// `None` for a short window or a range with no height.
pub fn premium_discount(candles: &[Candle], config: &IctConfig) -> Option<PremiumDiscount> {
    if config.range_lookback == 0 || candles.len() < config.range_lookback {
        return None;
    }
    let recent = &candles[candles.len() - config.range_lookback..];
    let high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let range = high - low;
    if !(range > 0.0) {
        return None;
    }

    let close = recent.last()?.close;
    let equilibrium = (high + low) / 2.0;
    let zone = if close > equilibrium {
        PriceZone::Premium
    } else if close < equilibrium {
        PriceZone::Discount
    } else {
        PriceZone::Equilibrium
    };

    // Retracement measured from the far end of the range.
    let (ote_low, ote_high) = match zone {
        PriceZone::Premium => (low + config.ote_start * range, low + config.ote_end * range),
        _ => (high - config.ote_end * range, high - config.ote_start * range),
    };
    let in_ote = zone != PriceZone::Equilibrium && (ote_low..=ote_high).contains(&close);

    let (direction, confidence) = match zone {
        PriceZone::Premium => (Direction::Bearish, ZONE_CONFIDENCE),
        PriceZone::Discount => (Direction::Bullish, ZONE_CONFIDENCE),
        PriceZone::Equilibrium => (Direction::Neutral, EQUILIBRIUM_CONFIDENCE),
    };

    Some(PremiumDiscount {
        range_high: high,
        range_low: low,
        equilibrium,
        zone,
        ote_low,
        ote_high,
        in_ote,
        direction,
        confidence: if in_ote { OTE_CONFIDENCE } else { confidence },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Range 90-110 with the last close at `last`.
    fn range_ending_at(n: usize, last: f64) -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..n)
            .map(|i| Candle::new(i as i64, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        candles[0] = Candle::new(0, 100.0, 110.0, 99.0, 100.0, 1.0);
        candles[1] = Candle::new(1, 100.0, 101.0, 90.0, 100.0, 1.0);
        let t = n as i64 - 1;
        candles[n - 1] = Candle::new(t, 100.0, last.max(101.0), last.min(99.0), last, 1.0);
        candles
    }

    fn config(lookback: usize) -> IctConfig {
        IctConfig {
            range_lookback: lookback,
            ..IctConfig::default()
        }
    }

    #[test]
    fn test_discount_inside_ote() {
        let pd = premium_discount(&range_ending_at(20, 95.0), &config(20)).unwrap();
        assert_eq!((pd.range_low, pd.range_high, pd.equilibrium), (90.0, 110.0, 100.0));
        assert_eq!(pd.zone, PriceZone::Discount);
        assert_eq!(pd.direction, Direction::Bullish);
        assert!((pd.ote_low - 94.2).abs() < 1e-9);
        assert!((pd.ote_high - 97.6).abs() < 1e-9);
        assert!(pd.in_ote);
        assert_eq!(pd.confidence, 95);
    }

    #[test]
    fn test_premium_outside_ote() {
        let pd = premium_discount(&range_ending_at(20, 108.0), &config(20)).unwrap();
        assert_eq!(pd.zone, PriceZone::Premium);
        assert_eq!(pd.direction, Direction::Bearish);
        assert!((pd.ote_low - 102.4).abs() < 1e-9);
        assert!((pd.ote_high - 105.8).abs() < 1e-9);
        assert!(!pd.in_ote);
        assert_eq!(pd.confidence, 75);
    }

    #[test]
    fn test_close_on_midpoint_is_equilibrium() {
        let pd = premium_discount(&range_ending_at(20, 100.0), &config(20)).unwrap();
        assert_eq!(pd.zone, PriceZone::Equilibrium);
        assert_eq!(pd.direction, Direction::Neutral);
        assert!(!pd.in_ote);
    }

    #[test]
    fn test_only_recent_candles_define_the_range() {
        // The 90-110 extremes sit outside a 10-candle lookback.
        let pd = premium_discount(&range_ending_at(20, 100.5), &config(10)).unwrap();
        assert_eq!((pd.range_low, pd.range_high), (99.0, 101.0));
        assert_eq!(pd.zone, PriceZone::Premium);
    }

    #[test]
    fn test_short_or_flat_window() {
        assert!(premium_discount(&range_ending_at(20, 95.0), &config(50)).is_none());
        let flat: Vec<Candle> = (0..60)
            .map(|i| Candle::new(i, 100.0, 100.0, 100.0, 100.0, 1.0))
            .collect();
        assert!(PremiumDiscountDetector
            .detect(&flat, &IctConfig::default())
            .is_empty());
    }
}
