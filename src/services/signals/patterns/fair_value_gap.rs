//! Fair value gap detection.

use super::{confidence, PatternDetector};
use crate::config::IctConfig;
use crate::types::{Candle, Direction, FairValueGap, IctEvent};

/// Three-candle imbalance where the outer candles' ranges do not overlap.
pub struct FairValueGapDetector;

impl PatternDetector for FairValueGapDetector {
    fn id(&self) -> &'static str {
        "fair_value_gap"
    }

    fn min_candles(&self, _config: &IctConfig) -> usize {
        3
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        find_fair_value_gaps(candles, config)
            .into_iter()
            .map(IctEvent::FairValueGap)
            .collect()
    }
}

pub fn find_fair_value_gaps(candles: &[Candle], config: &IctConfig) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();

    for (i, triple) in candles.windows(3).enumerate() {
        let (c1, c2, c3) = (&triple[0], &triple[1], &triple[2]);

        let (direction, low, high) = if c1.high < c3.low {
            (Direction::Bullish, c1.high, c3.low)
        } else if c1.low > c3.high {
            (Direction::Bearish, c3.high, c1.low)
        } else {
            continue;
        };

        let size = high - low;
        if size < c2.close * config.min_gap_pct {
            continue;
        }

        // Only candles after the third one can fill the gap; touching an edge counts.
        let filled_at = candles[i + 3..]
            .iter()
            .find(|c| c.touches(low, high))
            .map(|c| c.time);

        let displacement = c2.range();
        gaps.push(FairValueGap {
            direction,
            high,
            low,
            timestamp: c2.time,
            filled: filled_at.is_some(),
            filled_at,
            confidence: if displacement > 0.0 {
                confidence(40.0 + size / displacement * 60.0)
            } else {
                40
            },
        });
    }

    gaps
}
