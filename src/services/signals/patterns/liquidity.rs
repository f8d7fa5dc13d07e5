//! Resting liquidity around the current price, and sweeps through it.

use super::structure::pivot_indices;
use super::{confidence, PatternDetector};
use crate::config::IctConfig;
use crate::types::{
    Candle, Direction, IctEvent, LiquidityLevel, LiquidityPools, LiquiditySide, LiquiditySweep,
    OrderBlock, SwingKind, SwingPoint,
};

const SWEEP_CONFIDENCE: f64 = 75.0;
const VOLUME_BONUS: f64 = 20.0;

/// Buy-side liquidity sits above the last close (unbroken bearish block highs
/// and swing highs), sell-side below it (unbroken bullish block lows and swing
/// lows). Each side is ordered nearest first.
pub fn liquidity_pools(
    candles: &[Candle],
    order_blocks: &[OrderBlock],
    swings: &[SwingPoint],
) -> LiquidityPools {
    let Some(last) = candles.last() else {
        return LiquidityPools::default();
    };
    let price = last.close;

    let mut buy_side = Vec::new();
    let mut sell_side = Vec::new();

    for ob in order_blocks.iter().filter(|ob| !ob.broken) {
        match ob.direction {
            Direction::Bearish if ob.high > price => {
                buy_side.push(level(ob.high, ob.origin_timestamp, "order_block"))
            }
            Direction::Bullish if ob.low < price => {
                sell_side.push(level(ob.low, ob.origin_timestamp, "order_block"))
            }
            _ => {}
        }
    }

    for swing in swings {
        match swing.kind {
            SwingKind::High if swing.price > price => {
                buy_side.push(level(swing.price, swing.timestamp, "swing"))
            }
            SwingKind::Low if swing.price < price => {
                sell_side.push(level(swing.price, swing.timestamp, "swing"))
            }
            _ => {}
        }
    }

    buy_side.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.timestamp.cmp(&b.timestamp)));
    sell_side.sort_by(|a, b| b.price.total_cmp(&a.price).then(a.timestamp.cmp(&b.timestamp)));

    LiquidityPools {
        buy_side,
        sell_side,
    }
}

fn level(price: f64, timestamp: i64, source: &str) -> LiquidityLevel {
    LiquidityLevel {
        price,
        timestamp,
        source: source.to_string(),
    }
}

/// Flags recent candles that run the stops beyond the latest confirmed swing
/// and close back as a reversal.
pub struct LiquiditySweepDetector;

impl PatternDetector for LiquiditySweepDetector {
    fn id(&self) -> &'static str {
        "liquidity_sweep"
    }

    fn min_candles(&self, config: &IctConfig) -> usize {
        // One confirmed pivot plus a candle after it.
        2 * config.pivot_lookback + 2
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        liquidity_sweeps(candles, config)
            .into_iter()
            .map(IctEvent::LiquiditySweep)
            .collect()
    }
}

/// Sweeps within the last `sweep_lookback` candles, oldest first.
///
/// A pool is the most recent swing confirmed before the candle. Each pool is
/// reported at most once, by the first candle that sweeps it.
pub fn liquidity_sweeps(candles: &[Candle], config: &IctConfig) -> Vec<LiquiditySweep> {
    let lookback = config.pivot_lookback;
    let pivots = pivot_indices(candles, lookback);
    let start = candles.len().saturating_sub(config.sweep_lookback).max(1);
    if pivots.is_empty() || start >= candles.len() {
        return Vec::new();
    }

    let recent = &candles[start..];
    let avg_volume = recent.iter().map(|c| c.volume).sum::<f64>() / recent.len() as f64;
    let mut swept: Vec<(SwingKind, i64)> = Vec::new();
    let mut sweeps = Vec::new();

    for i in start..candles.len() {
        let (candle, prev) = (&candles[i], &candles[i - 1]);
        let latest = |kind: SwingKind| {
            pivots
                .iter()
                .rev()
                .find(|(p, s)| s.kind == kind && p + lookback < i)
                .map(|(_, s)| s)
        };

        let buy_side = latest(SwingKind::High).filter(|pool| {
            candle.high >= pool.price * (1.0 + config.sweep_threshold)
                && (candle.is_bearish() || candle.close < prev.close)
        });
        let sell_side = latest(SwingKind::Low).filter(|pool| {
            candle.low <= pool.price * (1.0 - config.sweep_threshold)
                && (candle.is_bullish() || candle.close > prev.close)
        });

        for pool in buy_side.into_iter().chain(sell_side) {
            let key = (pool.kind, pool.timestamp);
            if swept.contains(&key) {
                continue;
            }
            swept.push(key);

            let (side, direction, extreme) = match pool.kind {
                SwingKind::High => (LiquiditySide::BuySide, Direction::Bearish, candle.high),
                SwingKind::Low => (LiquiditySide::SellSide, Direction::Bullish, candle.low),
            };
            let bonus = if candle.volume > avg_volume { VOLUME_BONUS } else { 0.0 };
            sweeps.push(LiquiditySweep {
                side,
                direction,
                level: pool.price,
                extreme,
                timestamp: candle.time,
                confidence: confidence(SWEEP_CONFIDENCE + bonus),
            });
        }
    }

    sweeps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ob(direction: Direction, low: f64, high: f64, broken: bool) -> OrderBlock {
        OrderBlock {
            direction,
            high,
            low,
            origin_timestamp: 1,
            impulse_timestamp: 2,
            broken,
            broken_at: broken.then_some(3),
            mitigated: broken,
            confidence: 60,
        }
    }

    fn swing(kind: SwingKind, price: f64, timestamp: i64) -> SwingPoint {
        SwingPoint {
            kind,
            price,
            timestamp,
        }
    }

    #[test]
    fn test_pools_split_around_price() {
        let candles = vec![Candle::new(10, 100.0, 101.0, 99.0, 100.0, 1.0)];
        let blocks = vec![
            ob(Direction::Bearish, 104.0, 105.0, false),
            ob(Direction::Bullish, 95.0, 96.0, false),
            ob(Direction::Bearish, 108.0, 109.0, true),
        ];
        let swings = vec![
            swing(SwingKind::High, 102.0, 4),
            swing(SwingKind::Low, 97.0, 5),
            swing(SwingKind::High, 98.0, 6),
        ];

        let pools = liquidity_pools(&candles, &blocks, &swings);
        let buy: Vec<f64> = pools.buy_side.iter().map(|l| l.price).collect();
        let sell: Vec<f64> = pools.sell_side.iter().map(|l| l.price).collect();
        assert_eq!(buy, vec![102.0, 105.0]);
        assert_eq!(sell, vec![97.0, 95.0]);
        assert_eq!(pools.buy_side[1].source, "order_block");
    }

    /// Swing high at index 2 (110), swing low at index 6 (90), quiet after.
    fn with_pools() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..12)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 10.0))
            .collect();
        candles[2] = Candle::new(2, 100.0, 110.0, 99.5, 100.0, 10.0);
        candles[6] = Candle::new(6, 100.0, 100.5, 90.0, 100.0, 10.0);
        candles
    }

    #[test]
    fn test_buy_side_sweep_with_reversal() {
        let mut candles = with_pools();
        // Wick above 110, bearish close back inside the range, heavy volume.
        candles.push(Candle::new(12, 100.0, 110.5, 98.0, 99.0, 50.0));
        let sweeps = liquidity_sweeps(&candles, &IctConfig::default());
        assert_eq!(sweeps.len(), 1);
        let sweep = &sweeps[0];
        assert_eq!(sweep.side, LiquiditySide::BuySide);
        assert_eq!(sweep.direction, Direction::Bearish);
        assert_eq!((sweep.level, sweep.extreme), (110.0, 110.5));
        assert_eq!(sweep.timestamp, 12);
        assert_eq!(sweep.confidence, 95);
    }

    #[test]
    fn test_sell_side_sweep() {
        let mut candles = with_pools();
        candles.push(Candle::new(12, 100.0, 101.0, 89.5, 100.5, 10.0));
        let sweeps = liquidity_sweeps(&candles, &IctConfig::default());
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].side, LiquiditySide::SellSide);
        assert_eq!(sweeps[0].direction, Direction::Bullish);
        assert_eq!(sweeps[0].confidence, 75);
    }

    #[test]
    fn test_breakout_without_reversal_is_not_a_sweep() {
        let mut candles = with_pools();
        candles.push(Candle::new(12, 100.0, 112.0, 99.5, 111.5, 10.0));
        assert!(liquidity_sweeps(&candles, &IctConfig::default()).is_empty());
    }

    #[test]
    fn test_wick_inside_threshold_is_ignored() {
        let mut candles = with_pools();
        // 110.05 is within 0.1% of the pool.
        candles.push(Candle::new(12, 100.0, 110.05, 98.0, 99.0, 10.0));
        assert!(liquidity_sweeps(&candles, &IctConfig::default()).is_empty());
    }

    #[test]
    fn test_pool_is_swept_once() {
        let mut candles = with_pools();
        candles.push(Candle::new(12, 100.0, 110.5, 98.0, 99.0, 10.0));
        candles.push(Candle::new(13, 99.0, 110.6, 97.0, 98.0, 10.0));
        let sweeps = liquidity_sweeps(&candles, &IctConfig::default());
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].timestamp, 12);
    }

    #[test]
    fn test_old_sweeps_fall_out_of_lookback() {
        let mut candles = with_pools();
        candles.push(Candle::new(12, 100.0, 110.5, 98.0, 99.0, 10.0));
        for t in 13..30 {
            candles.push(Candle::new(t, 100.0, 101.0, 99.0, 100.0, 10.0));
        }
        assert!(LiquiditySweepDetector
            .detect(&candles, &IctConfig::default())
            .is_empty());
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(liquidity_pools(&[], &[], &[]), LiquidityPools::default());
    }
}
