//! Swing pivots and market structure (BOS/MSS).

use super::PatternDetector;
use crate::config::IctConfig;
use crate::types::{
    Candle, Direction, IctEvent, MarketStructureEvent, StructureKind, SwingKind, SwingPoint,
};
use std::collections::VecDeque;

const BOS_CONFIDENCE: u8 = 70;
const MSS_CONFIDENCE: u8 = 65;

/// Confirms pivots with `pivot_lookback` candles on each side, then classifies
/// every new extreme against the trend implied by the pivots before it.
pub struct StructureDetector;

impl PatternDetector for StructureDetector {
    fn id(&self) -> &'static str {
        "market_structure"
    }

    fn min_candles(&self, config: &IctConfig) -> usize {
        2 * config.pivot_lookback + 1
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        let swings = swing_points(candles, config.pivot_lookback);
        let events = structure_events(&swings);

        swings
            .into_iter()
            .map(IctEvent::SwingPoint)
            .chain(events.into_iter().map(IctEvent::Structure))
            .collect()
    }
}

/// Confirmed pivots, oldest first. A candle that is both a pivot high and a
/// pivot low yields the high first.
pub fn swing_points(candles: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    pivot_indices(candles, lookback)
        .into_iter()
        .map(|(_, swing)| swing)
        .collect()
}

/// Confirmed pivots paired with their index in `candles`.
pub(crate) fn pivot_indices(candles: &[Candle], lookback: usize) -> Vec<(usize, SwingPoint)> {
    if lookback == 0 || candles.len() < 2 * lookback + 1 {
        return Vec::new();
    }
    (lookback..candles.len() - lookback)
        .flat_map(|i| pivots_at(candles, i, lookback).map(move |swing| (i, swing)))
        .collect()
}

/// Pivots at index `i`, which needs `lookback` candles on both sides.
fn pivots_at(candles: &[Candle], i: usize, lookback: usize) -> impl Iterator<Item = SwingPoint> {
    let pivot = candles[i];
    let neighbours = candles[i - lookback..i]
        .iter()
        .chain(&candles[i + 1..=i + lookback]);

    let (mut is_high, mut is_low) = (true, true);
    for other in neighbours {
        is_high &= pivot.high > other.high;
        is_low &= pivot.low < other.low;
    }

    let high = is_high.then(|| SwingPoint {
        kind: SwingKind::High,
        price: pivot.high,
        timestamp: pivot.time,
    });
    let low = is_low.then(|| SwingPoint {
        kind: SwingKind::Low,
        price: pivot.low,
        timestamp: pivot.time,
    });
    high.into_iter().chain(low)
}

/// Trend state carried from one pivot to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureTracker {
    trend: Direction,
    last_high: Option<f64>,
    last_low: Option<f64>,
}

impl StructureTracker {
    /// Feed the next pivot. A new extreme in the running trend is a BOS, a
    /// break against it is an MSS.
    pub fn on_swing(&mut self, swing: &SwingPoint) -> Option<MarketStructureEvent> {
        let (previous, direction) = match swing.kind {
            SwingKind::High => (self.last_high.replace(swing.price), Direction::Bullish),
            SwingKind::Low => (self.last_low.replace(swing.price), Direction::Bearish),
        };
        let level = previous?;

        let extends = match direction {
            Direction::Bullish => swing.price > level,
            _ => swing.price < level,
        };
        if !extends {
            return None;
        }

        let kind = if self.trend == direction.opposite() {
            StructureKind::MarketStructureShift
        } else {
            StructureKind::BreakOfStructure
        };
        self.trend = direction;
        Some(MarketStructureEvent {
            kind,
            direction,
            timestamp: swing.timestamp,
            level,
            pivot: swing.price,
            confidence: match kind {
                StructureKind::BreakOfStructure => BOS_CONFIDENCE,
                StructureKind::MarketStructureShift => MSS_CONFIDENCE,
            },
        })
    }

    pub fn trend(&self) -> Direction {
        self.trend
    }
}

/// Replay a pivot sequence from a neutral start.
pub fn structure_events(swings: &[SwingPoint]) -> Vec<MarketStructureEvent> {
    let mut tracker = StructureTracker::default();
    swings.iter().filter_map(|s| tracker.on_swing(s)).collect()
}

/// Append-only pivot and structure history of one candle stream.
///
/// Fed once per closed candle, it confirms the pivot `lookback` candles back
/// and never revisits it, so entries survive the eviction of the candles they
/// were found in. Only the oldest entries beyond `capacity` are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureLog {
    lookback: usize,
    capacity: usize,
    tracker: StructureTracker,
    swings: VecDeque<SwingPoint>,
    events: VecDeque<MarketStructureEvent>,
}

impl StructureLog {
    pub fn new(lookback: usize, capacity: usize) -> Self {
        Self {
            lookback,
            capacity,
            tracker: StructureTracker::default(),
            swings: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Call after each append; `candles` ends with the candle just closed.
    pub fn on_close(&mut self, candles: &[Candle]) {
        let l = self.lookback;
        if l == 0 || candles.len() < 2 * l + 1 {
            return;
        }
        let i = candles.len() - 1 - l;
        for swing in pivots_at(candles, i, l) {
            if let Some(event) = self.tracker.on_swing(&swing) {
                push_bounded(&mut self.events, event, self.capacity);
            }
            push_bounded(&mut self.swings, swing, self.capacity);
        }
    }

    pub fn swing_points(&self) -> Vec<SwingPoint> {
        self.swings.iter().cloned().collect()
    }

    pub fn events(&self) -> Vec<MarketStructureEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn trend(&self) -> Direction {
        self.tracker.trend()
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T, capacity: usize) {
    log.push_back(item);
    while log.len() > capacity {
        log.pop_front();
    }
}
