//! Order block detection.

use super::{confidence, PatternDetector};
use crate::config::IctConfig;
use crate::services::signals::indicators::{series, Atr};
use crate::types::{Candle, Direction, IctEvent, OrderBlock};
use std::collections::HashSet;

/// Finds the last opposite-coloured candle before each impulsive move.
///
/// A candle is impulsive when its range exceeds `impulse_atr_multiple` times
/// the ATR of the preceding candle, or when it closes beyond the extreme of
/// the previous `breakout_lookback` candles. Blocks are then tracked through
/// the rest of the window: a touch marks them mitigated, a close beyond the
/// far extreme marks them broken.
pub struct OrderBlockDetector;

impl PatternDetector for OrderBlockDetector {
    fn id(&self) -> &'static str {
        "order_block"
    }

    fn min_candles(&self, _config: &IctConfig) -> usize {
        2
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        find_order_blocks(candles, config)
            .into_iter()
            .map(IctEvent::OrderBlock)
            .collect()
    }
}

/// All order blocks in the window, ordered by origin candle.
pub fn find_order_blocks(candles: &[Candle], config: &IctConfig) -> Vec<OrderBlock> {
    if candles.len() < 2 {
        return Vec::new();
    }

    let atr = series(Atr::new(config.atr_period), candles);
    let mut seen = HashSet::new();
    let mut blocks: Vec<(usize, OrderBlock)> = Vec::new();

    for i in 1..candles.len() {
        let impulse = &candles[i];
        let direction = if impulse.is_bullish() {
            Direction::Bullish
        } else if impulse.is_bearish() {
            Direction::Bearish
        } else {
            continue;
        };

        let threshold = atr[i - 1]
            .map(|a| a * config.impulse_atr_multiple)
            .filter(|t| *t > 0.0);
        let by_range = threshold.is_some_and(|t| impulse.range() > t);
        let by_breakout = breaks_prior_extreme(candles, i, direction, config.breakout_lookback);
        if !by_range && !by_breakout {
            continue;
        }

        let start = i.saturating_sub(config.order_block_lookback);
        let origin = (start..i).rev().find(|&j| match direction {
            Direction::Bullish => candles[j].is_bearish(),
            _ => candles[j].is_bullish(),
        });
        let Some(j) = origin else {
            continue;
        };
        if !seen.insert(j) {
            continue;
        }

        let source = &candles[j];
        let mut block = OrderBlock {
            direction,
            high: source.high,
            low: source.low,
            origin_timestamp: source.time,
            impulse_timestamp: impulse.time,
            broken: false,
            broken_at: None,
            mitigated: false,
            confidence: match threshold {
                Some(t) => confidence(impulse.range() / t * 60.0),
                None => 50,
            },
        };
        track(&mut block, &candles[i + 1..]);
        blocks.push((j, block));
    }

    blocks.sort_by_key(|(j, _)| *j);
    blocks.into_iter().map(|(_, b)| b).collect()
}

fn breaks_prior_extreme(
    candles: &[Candle],
    i: usize,
    direction: Direction,
    lookback: usize,
) -> bool {
    if lookback == 0 || i < lookback {
        return false;
    }
    let prior = &candles[i - lookback..i];
    let close = candles[i].close;
    match direction {
        Direction::Bullish => prior.iter().all(|c| close > c.high),
        _ => prior.iter().all(|c| close < c.low),
    }
}

/// Walk the candles after the impulse and update the block's flags.
fn track(block: &mut OrderBlock, later: &[Candle]) {
    for candle in later {
        let broken = match block.direction {
            Direction::Bullish => candle.close < block.low,
            _ => candle.close > block.high,
        };
        if broken {
            block.broken = true;
            block.broken_at = Some(candle.time);
            block.mitigated = true;
            return;
        }
        if candle.touches(block.low, block.high) {
            block.mitigated = true;
        }
    }
}
