//! Breaker blocks: order blocks whose role has flipped.

use super::order_block::find_order_blocks;
use super::PatternDetector;
use crate::config::IctConfig;
use crate::types::{BreakerBlock, Candle, IctEvent, OrderBlock};

/// Emits one breaker for every order block closed through in the window.
///
/// A broken bullish block becomes resistance (bearish breaker) and a broken
/// bearish block becomes support (bullish breaker).
pub struct BreakerBlockDetector;

impl PatternDetector for BreakerBlockDetector {
    fn id(&self) -> &'static str {
        "breaker_block"
    }

    fn min_candles(&self, _config: &IctConfig) -> usize {
        3
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        breakers_from(&find_order_blocks(candles, config))
            .into_iter()
            .map(IctEvent::BreakerBlock)
            .collect()
    }
}

pub fn breakers_from(blocks: &[OrderBlock]) -> Vec<BreakerBlock> {
    let mut breakers: Vec<BreakerBlock> = blocks
        .iter()
        .filter_map(|ob| {
            let broken_at = ob.broken_at.filter(|_| ob.broken)?;
            Some(BreakerBlock {
                direction: ob.direction.opposite(),
                high: ob.high,
                low: ob.low,
                origin_timestamp: ob.origin_timestamp,
                broken_at,
                confidence: ob.confidence,
            })
        })
        .collect();
    breakers.sort_by_key(|b| (b.broken_at, b.origin_timestamp));
    breakers
}
