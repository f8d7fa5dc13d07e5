//! Market maker model phase classification.

use super::PatternDetector;
use crate::config::IctConfig;
use crate::services::signals::indicators::{series, Atr};
use crate::types::{Candle, Direction, IctEvent, MarketMakerPhase, Phase};

/// Classifies the window into a market-maker phase.
///
/// The phase is rebuilt from the window on every call by locating the latest
/// consolidation box and replaying the candles that followed it.
pub struct MarketMakerDetector;

impl PatternDetector for MarketMakerDetector {
    fn id(&self) -> &'static str {
        "market_maker"
    }

    fn min_candles(&self, config: &IctConfig) -> usize {
        config
            .phase_min_candles
            .max(config.consolidation_len + config.atr_period + 1)
    }

    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent> {
        classify(candles, config)
            .map(IctEvent::Phase)
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Range {
    high: f64,
    low: f64,
}

impl Range {
    fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Replay stages after the consolidation box.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Ranging,
    /// Liquidity on one side was swept; carries the expected reversal direction.
    Grabbed(Direction),
    Reversed(Direction),
    Expanding(Direction),
    Done,
}

pub fn classify(candles: &[Candle], config: &IctConfig) -> Option<MarketMakerPhase> {
    let len = config.consolidation_len;
    if len < 2 || candles.len() < config.phase_min_candles || candles.len() <= len {
        return None;
    }

    let atr = series(Atr::new(config.atr_period), candles);
    let box_ending_at = |end: usize| -> Option<Range> {
        let segment = &candles[end - len..end];
        let high = segment.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = segment.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let atr = atr[end - 1]?;
        (high - low <= config.consolidation_atr_multiple * atr).then_some(Range { high, low })
    };

    if let Some(range) = box_ending_at(candles.len()) {
        return Some(phase(Phase::Consolidation, Direction::Neutral, 40, range));
    }

    (len..candles.len())
        .rev()
        .find_map(|end| box_ending_at(end).map(|range| (end, range)))
        .map(|(end, range)| replay(&candles[end..], range))
}

fn phase(phase: Phase, direction: Direction, confidence: u8, range: Range) -> MarketMakerPhase {
    MarketMakerPhase {
        phase,
        direction,
        confidence,
        range_high: range.high,
        range_low: range.low,
    }
}

fn replay(after: &[Candle], range: Range) -> MarketMakerPhase {
    let mut current = phase(Phase::Consolidation, Direction::Neutral, 35, range);
    let mut stage = Stage::Ranging;

    for c in after {
        let above = c.close > range.high;
        let below = c.close < range.low;

        stage = match stage {
            Stage::Ranging => {
                if above {
                    current = phase(Phase::Markup, Direction::Bullish, 60, range);
                    Stage::Done
                } else if below {
                    current = phase(Phase::Markdown, Direction::Bearish, 60, range);
                    Stage::Done
                } else if c.high > range.high {
                    current = phase(Phase::LiquidityGrab, Direction::Bearish, 55, range);
                    Stage::Grabbed(Direction::Bearish)
                } else if c.low < range.low {
                    current = phase(Phase::LiquidityGrab, Direction::Bullish, 55, range);
                    Stage::Grabbed(Direction::Bullish)
                } else {
                    Stage::Ranging
                }
            }
            Stage::Grabbed(dir) => {
                if above {
                    current = phase(Phase::Markup, Direction::Bullish, 60, range);
                    Stage::Done
                } else if below {
                    current = phase(Phase::Markdown, Direction::Bearish, 60, range);
                    Stage::Done
                } else if moves(c, dir) {
                    current = phase(Phase::SmartMoneyReversal, dir, 65, range);
                    Stage::Reversed(dir)
                } else {
                    Stage::Grabbed(dir)
                }
            }
            Stage::Reversed(dir) | Stage::Expanding(dir) => {
                let beyond_mid = match dir {
                    Direction::Bullish => c.close > range.mid(),
                    _ => c.close < range.mid(),
                };
                let (breakout, failure) = match dir {
                    Direction::Bullish => (above, below),
                    _ => (below, above),
                };
                if breakout {
                    current = expansion(dir, 80, range);
                    Stage::Done
                } else if failure {
                    current = expansion(dir.opposite(), 60, range);
                    Stage::Done
                } else if stage == Stage::Reversed(dir) && beyond_mid {
                    let accumulation = match dir {
                        Direction::Bullish => Phase::Accumulation,
                        _ => Phase::Distribution,
                    };
                    current = phase(accumulation, dir, 70, range);
                    Stage::Expanding(dir)
                } else {
                    stage
                }
            }
            Stage::Done => break,
        };
    }

    current
}

fn moves(c: &Candle, dir: Direction) -> bool {
    match dir {
        Direction::Bullish => c.is_bullish(),
        _ => c.is_bearish(),
    }
}

fn expansion(dir: Direction, confidence: u8, range: Range) -> MarketMakerPhase {
    match dir {
        Direction::Bullish => phase(Phase::Markup, Direction::Bullish, confidence, range),
        _ => phase(Phase::Markdown, Direction::Bearish, confidence, range),
    }
}
