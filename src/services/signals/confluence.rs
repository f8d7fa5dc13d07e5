//! Multi-timeframe confluence vote.

use crate::config::{EngineConfig, WEIGHT_EPSILON};
use crate::types::{Direction, Evidence, MiniSignal, PriceZone, Recommendation};

/// Result of the weighted vote.
#[derive(Debug, Clone, PartialEq)]
pub struct Confluence {
    pub direction: Direction,
    pub recommendation: Recommendation,
    pub strength: u8,
    pub bullish_mass: f64,
    pub bearish_mass: f64,
    pub neutral_mass: f64,
    /// Timeframes whose own direction matches the result.
    pub agreeing: usize,
    pub ict_boost: f64,
    /// Bonus for trading from the favourable half of the range on the ICT timeframe.
    pub zone_boost: f64,
    /// Zone that earned `zone_boost`, and whether price was in the OTE band.
    pub zone: Option<(PriceZone, bool)>,
}

/// Combine per-timeframe signals into the final call.
///
/// A configured timeframe with no MiniSignal votes Neutral. Equal bullish and
/// bearish mass, a Neutral plurality, or a winning mass not above
/// `min_agreement` all resolve to Neutral.
pub fn aggregate(minis: &[MiniSignal], config: &EngineConfig) -> Confluence {
    let votes: Vec<(f64, Option<&MiniSignal>)> = config
        .timeframes
        .iter()
        .map(|w| (w.weight, minis.iter().find(|m| m.timeframe == w.timeframe)))
        .collect();

    let mass = |d: Direction| -> f64 {
        votes
            .iter()
            .filter(|(_, m)| m.map(|m| m.direction).unwrap_or_default() == d)
            .map(|(w, _)| *w)
            .sum()
    };
    let bullish_mass = mass(Direction::Bullish);
    let bearish_mass = mass(Direction::Bearish);
    let neutral_mass = mass(Direction::Neutral);

    let leader = if (bullish_mass - bearish_mass).abs() <= WEIGHT_EPSILON {
        None
    } else if bullish_mass > bearish_mass {
        Some((Direction::Bullish, bullish_mass))
    } else {
        Some((Direction::Bearish, bearish_mass))
    };

    let min_agreement = config.aggregation.min_agreement;
    let winner = leader.filter(|(_, m)| *m > neutral_mass && *m > min_agreement);

    match winner {
        Some((direction, winning_mass)) => {
            let base = side_strength(&votes, direction, winning_mass, config);
            let ict_boost = ict_boost(&votes, direction, config);
            let zone = aligned_zone(minis, direction, config);
            let zone_boost = match zone {
                Some((_, true)) => config.aggregation.ote_points,
                Some((_, false)) => config.aggregation.zone_points,
                None => 0.0,
            };
            Confluence {
                direction,
                recommendation: Recommendation::from_direction(direction),
                strength: clamp_strength(base + ict_boost + zone_boost),
                bullish_mass,
                bearish_mass,
                neutral_mass,
                agreeing: count(&votes, direction),
                ict_boost,
                zone_boost,
                zone,
            }
        }
        None => {
            // Half the stronger side's score, without the ICT boost.
            let bull = side_strength(&votes, Direction::Bullish, bullish_mass, config);
            let bear = side_strength(&votes, Direction::Bearish, bearish_mass, config);
            Confluence {
                direction: Direction::Neutral,
                recommendation: Recommendation::Neutral,
                strength: clamp_strength(bull.max(bear) / 2.0),
                bullish_mass,
                bearish_mass,
                neutral_mass,
                agreeing: count(&votes, Direction::Neutral),
                ict_boost: 0.0,
                zone_boost: 0.0,
                zone: None,
            }
        }
    }
}

fn count(votes: &[(f64, Option<&MiniSignal>)], direction: Direction) -> usize {
    votes
        .iter()
        .filter(|(_, m)| m.map(|m| m.direction).unwrap_or_default() == direction)
        .count()
}

/// Agreement fraction and confidence of the timeframes voting `direction`.
fn side_strength(
    votes: &[(f64, Option<&MiniSignal>)],
    direction: Direction,
    mass: f64,
    config: &EngineConfig,
) -> f64 {
    if mass <= 0.0 {
        return 0.0;
    }
    let weighted_conf: f64 = votes
        .iter()
        .filter_map(|(w, m)| m.filter(|m| m.direction == direction).map(|m| (w, m)))
        .map(|(w, m)| w * m.local_confidence as f64)
        .sum();
    let avg_conf = weighted_conf / mass;

    let agg = &config.aggregation;
    agg.agreement_weight * mass * 100.0 + agg.confidence_weight * avg_conf
}

/// Capped bonus when ICT evidence on two or more timeframes points the same
/// way as the vote.
fn ict_boost(
    votes: &[(f64, Option<&MiniSignal>)],
    direction: Direction,
    config: &EngineConfig,
) -> f64 {
    let aligned: Vec<f64> = votes
        .iter()
        .filter_map(|(w, m)| m.filter(|m| m.ict_bias == direction).map(|_| *w))
        .collect();
    if aligned.len() < 2 {
        return 0.0;
    }
    let aligned_mass: f64 = aligned.iter().sum();
    config.aggregation.ict_boost_cap * aligned_mass.min(1.0)
}

/// Buying from discount or selling from premium on the ICT timeframe.
fn aligned_zone(
    minis: &[MiniSignal],
    direction: Direction,
    config: &EngineConfig,
) -> Option<(PriceZone, bool)> {
    let mini = minis.iter().find(|m| m.timeframe == config.ict_timeframe)?;
    mini.evidence.iter().find_map(|e| match e {
        Evidence::PremiumDiscount {
            direction: d,
            zone,
            in_ote,
            ..
        } if *d == direction => Some((*zone, *in_ote)),
        _ => None,
    })
}

fn clamp_strength(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
