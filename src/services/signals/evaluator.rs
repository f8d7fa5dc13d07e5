//! Per-timeframe evidence scoring.

use super::indicators::{IndicatorSnapshot, MacdValue};
use crate::config::EngineConfig;
use crate::types::{
    Candle, Direction, Evidence, IctKind, IctReport, MiniSignal, RsiZone, Timeframe,
};

/// Fully warmed indicator readings.
struct Readings {
    close: f64,
    sma_fast: f64,
    sma_slow: f64,
    rsi: f64,
    prev_rsi: f64,
    macd: MacdValue,
    prev_macd: MacdValue,
}

impl Readings {
    fn from_snapshot(s: &IndicatorSnapshot) -> Option<Self> {
        Some(Self {
            close: s.close?,
            sma_fast: s.sma_fast?,
            sma_slow: s.sma_slow?,
            rsi: s.rsi?,
            prev_rsi: s.prev_rsi?,
            macd: s.macd?,
            prev_macd: s.prev_macd?,
        })
    }
}

/// Fuse indicator and ICT evidence for one timeframe into a MiniSignal.
///
/// A window shorter than the longest lookback yields a Neutral signal with
/// zero confidence rather than an error.
pub fn evaluate_timeframe(
    timeframe: Timeframe,
    candles: &[Candle],
    indicators: &IndicatorSnapshot,
    ict: &IctReport,
    config: &EngineConfig,
) -> MiniSignal {
    let need = config.required_history();
    if candles.len() < need {
        return MiniSignal::insufficient(timeframe, candles.len(), need);
    }
    let Some(r) = Readings::from_snapshot(indicators) else {
        return MiniSignal::insufficient(timeframe, candles.len(), need);
    };

    let mut evidence = Vec::new();

    let (trend, trend_points) = score_trend(&r, config);
    evidence.push(Evidence::Trend {
        direction: trend,
        close: r.close,
        sma_fast: r.sma_fast,
        sma_slow: r.sma_slow,
        points: trend_points,
    });

    let momentum = score_momentum(&r, trend, config);
    let momentum_points = points_of(&momentum);
    evidence.push(momentum);

    let macd = score_macd(&r, config);
    let macd_points = points_of(&macd);
    evidence.push(macd);

    let as_of = candles.last().map(|c| c.time).unwrap_or_default();
    let ict_evidence = active_ict(ict, as_of);
    let (ict_bias, ict_points) = if ict_evidence.is_empty() {
        (Direction::Neutral, 0)
    } else {
        let (bias, agreeing, conflicting, points) = score_ict(&ict_evidence, config);
        evidence.extend(ict_evidence);
        evidence.push(Evidence::IctConfluence {
            direction: bias,
            agreeing,
            conflicting,
            points,
        });
        (bias, points)
    };

    if let Some(pd) = &ict.premium_discount {
        evidence.push(Evidence::PremiumDiscount {
            direction: pd.direction,
            zone: pd.zone,
            equilibrium: pd.equilibrium,
            ote_low: pd.ote_low,
            ote_high: pd.ote_high,
            in_ote: pd.in_ote,
        });
    }

    let score = trend_points + momentum_points + macd_points + ict_points;
    let threshold = config.scoring.direction_threshold;
    let direction = if score >= threshold {
        Direction::Bullish
    } else if score <= -threshold {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    MiniSignal {
        timeframe,
        direction,
        local_confidence: local_confidence(score, config.scoring.max_score()),
        score,
        ict_bias,
        evidence,
    }
}

/// |score| normalized to 0-100 against the largest attainable score.
pub fn local_confidence(score: i32, max_score: i32) -> u8 {
    if max_score <= 0 {
        return 0;
    }
    let clamped = score.unsigned_abs().min(max_score as u32) as f64;
    (clamped / max_score as f64 * 100.0).round() as u8
}

fn score_trend(r: &Readings, config: &EngineConfig) -> (Direction, i32) {
    let points = config.scoring.trend_points;
    if r.close > r.sma_fast && r.sma_fast > r.sma_slow {
        (Direction::Bullish, points)
    } else if r.close < r.sma_fast && r.sma_fast < r.sma_slow {
        (Direction::Bearish, -points)
    } else if r.sma_fast > r.sma_slow {
        // averages aligned but price pulled back through the fast one
        (Direction::Bullish, points / 2)
    } else if r.sma_fast < r.sma_slow {
        (Direction::Bearish, -(points / 2))
    } else {
        (Direction::Neutral, 0)
    }
}

fn score_momentum(r: &Readings, trend: Direction, config: &EngineConfig) -> Evidence {
    let ind = &config.indicators;
    let rising = r.rsi > r.prev_rsi;
    let falling = r.rsi < r.prev_rsi;

    let zone = if r.rsi >= ind.rsi_overbought {
        RsiZone::Overbought
    } else if r.rsi <= ind.rsi_oversold {
        RsiZone::Oversold
    } else {
        RsiZone::Neutral
    };

    let direction = match zone {
        RsiZone::Overbought => Direction::Bearish,
        RsiZone::Oversold => Direction::Bullish,
        RsiZone::Neutral if r.rsi > 50.0 && rising => Direction::Bullish,
        RsiZone::Neutral if r.rsi < 50.0 && falling => Direction::Bearish,
        RsiZone::Neutral => Direction::Neutral,
    };

    // Momentum only confirms; it never scores against the trend.
    let points = if direction != Direction::Neutral && direction == trend {
        direction.sign() * config.scoring.momentum_points
    } else {
        0
    };

    Evidence::Momentum {
        direction,
        rsi: r.rsi,
        rising,
        zone,
        points,
    }
}

fn score_macd(r: &Readings, config: &EngineConfig) -> Evidence {
    let (now, prev) = (r.macd, r.prev_macd);
    let crossed_up = prev.line <= prev.signal && now.line > now.signal;
    let crossed_down = prev.line >= prev.signal && now.line < now.signal;

    let direction = if now.line > now.signal && (crossed_up || now.histogram > prev.histogram) {
        Direction::Bullish
    } else if now.line < now.signal && (crossed_down || now.histogram < prev.histogram) {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    Evidence::Macd {
        direction,
        line: now.line,
        signal: now.signal,
        histogram: now.histogram,
        crossover: crossed_up || crossed_down,
        points: direction.sign() * config.scoring.macd_points,
    }
}

/// The ICT patterns still in play: latest unbroken order block, latest
/// unfilled gap, latest breaker, latest structure event, latest liquidity
/// sweep and a directional market phase.
fn active_ict(report: &IctReport, as_of: i64) -> Vec<Evidence> {
    let mut active = Vec::new();

    if let Some(ob) = report.order_blocks.iter().rev().find(|b| !b.broken) {
        active.push(ict(
            IctKind::OrderBlock,
            ob.direction,
            format!("{} order block", ob.direction.label()),
            (ob.low, ob.high),
            ob.origin_timestamp,
            ob.confidence,
        ));
    }
    if let Some(gap) = report.fair_value_gaps.iter().rev().find(|g| !g.filled) {
        active.push(ict(
            IctKind::FairValueGap,
            gap.direction,
            format!("{} fair value gap", gap.direction.label()),
            (gap.low, gap.high),
            gap.timestamp,
            gap.confidence,
        ));
    }
    if let Some(bb) = report.breaker_blocks.last() {
        active.push(ict(
            IctKind::BreakerBlock,
            bb.direction,
            format!("{} breaker block", bb.direction.label()),
            (bb.low, bb.high),
            bb.broken_at,
            bb.confidence,
        ));
    }
    if let Some(ev) = report.structure_events.last() {
        active.push(ict(
            IctKind::Structure,
            ev.direction,
            format!("{} {}", ev.direction.label(), ev.kind.short()),
            (ev.level, ev.level),
            ev.timestamp,
            ev.confidence,
        ));
    }
    if let Some(sweep) = report.liquidity_sweeps.last() {
        active.push(ict(
            IctKind::LiquiditySweep,
            sweep.direction,
            format!("{} liquidity sweep", sweep.direction.label()),
            (sweep.level, sweep.level),
            sweep.timestamp,
            sweep.confidence,
        ));
    }
    if let Some(phase) = report
        .market_phase
        .as_ref()
        .filter(|p| p.direction != Direction::Neutral)
    {
        active.push(ict(
            IctKind::MarketPhase,
            phase.direction,
            format!("{} phase", phase.phase.name()),
            (phase.range_low, phase.range_high),
            as_of,
            phase.confidence,
        ));
    }

    active
}

fn ict(
    pattern: IctKind,
    direction: Direction,
    label: String,
    (low, high): (f64, f64),
    timestamp: i64,
    confidence: u8,
) -> Evidence {
    Evidence::Ict {
        pattern,
        direction,
        label,
        low,
        high,
        timestamp,
        confidence,
    }
}

/// Returns (bias, agreeing, conflicting, signed points).
fn score_ict(active: &[Evidence], config: &EngineConfig) -> (Direction, usize, usize, i32) {
    let count = |d: Direction| {
        active
            .iter()
            .filter(|e| matches!(e, Evidence::Ict { direction, .. } if *direction == d))
            .count()
    };
    let bull = count(Direction::Bullish);
    let bear = count(Direction::Bearish);

    let (bias, agreeing, conflicting) = if bull > bear {
        (Direction::Bullish, bull, bear)
    } else if bear > bull {
        (Direction::Bearish, bear, bull)
    } else {
        return (Direction::Neutral, bull, bear, 0);
    };

    let scoring = &config.scoring;
    let base = if agreeing >= 2 {
        scoring.ict_confluence_points
    } else {
        scoring.ict_single_points
    };
    let points = (base - scoring.ict_conflict_penalty * conflicting as i32).max(0);
    (bias, agreeing, conflicting, bias.sign() * points)
}

fn points_of(evidence: &Evidence) -> i32 {
    match evidence {
        Evidence::Trend { points, .. }
        | Evidence::Momentum { points, .. }
        | Evidence::Macd { points, .. }
        | Evidence::IctConfluence { points, .. } => *points,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FairValueGap, LiquiditySide, LiquiditySweep, MarketStructureEvent, OrderBlock,
        PremiumDiscount, PriceZone, StructureKind,
    };

    fn window(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect()
    }

    fn bullish_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: Some(120.0),
            sma_fast: Some(110.0),
            sma_slow: Some(100.0),
            rsi: Some(58.0),
            prev_rsi: Some(55.0),
            macd: Some(MacdValue {
                line: 2.0,
                signal: 1.5,
                histogram: 0.5,
            }),
            prev_macd: Some(MacdValue {
                line: 1.8,
                signal: 1.45,
                histogram: 0.35,
            }),
        }
    }

    fn bullish_gap(t: i64) -> FairValueGap {
        FairValueGap {
            direction: Direction::Bullish,
            high: 105.0,
            low: 104.0,
            timestamp: t,
            filled: false,
            filled_at: None,
            confidence: 60,
        }
    }

    #[test]
    fn test_insufficient_window() {
        let config = EngineConfig::default();
        let mini = evaluate_timeframe(
            Timeframe::D1,
            &window(10),
            &IndicatorSnapshot::default(),
            &IctReport::default(),
            &config,
        );
        assert_eq!(mini.direction, Direction::Neutral);
        assert_eq!(mini.local_confidence, 0);
        assert_eq!(
            mini.evidence,
            vec![Evidence::InsufficientData { have: 10, need: 200 }]
        );
    }

    #[test]
    fn test_full_bullish_alignment() {
        let config = EngineConfig::default();
        let mini = evaluate_timeframe(
            Timeframe::H1,
            &window(200),
            &bullish_snapshot(),
            &IctReport::default(),
            &config,
        );
        assert_eq!(mini.score, 70);
        assert_eq!(mini.direction, Direction::Bullish);
        assert_eq!(mini.local_confidence, 78);
        assert_eq!(mini.ict_bias, Direction::Neutral);
        assert_eq!(mini.evidence.len(), 3);
    }

    #[test]
    fn test_overbought_rsi_does_not_confirm_uptrend() {
        let config = EngineConfig::default();
        let mut snap = bullish_snapshot();
        snap.rsi = Some(75.0);
        let mini = evaluate_timeframe(
            Timeframe::H1,
            &window(200),
            &snap,
            &IctReport::default(),
            &config,
        );
        assert_eq!(mini.score, 50);
        assert!(matches!(
            mini.evidence[1],
            Evidence::Momentum {
                zone: RsiZone::Overbought,
                points: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_ict_confluence_bonus() {
        let config = EngineConfig::default();
        let report = IctReport {
            fair_value_gaps: vec![bullish_gap(150)],
            structure_events: vec![MarketStructureEvent {
                kind: StructureKind::BreakOfStructure,
                direction: Direction::Bullish,
                timestamp: 160,
                level: 110.0,
                pivot: 112.0,
                confidence: 70,
            }],
            ..IctReport::default()
        };
        let mini = evaluate_timeframe(
            Timeframe::H1,
            &window(200),
            &bullish_snapshot(),
            &report,
            &config,
        );
        assert_eq!(mini.ict_bias, Direction::Bullish);
        assert_eq!(mini.score, 90);
        assert_eq!(mini.local_confidence, 100);
    }

    #[test]
    fn test_conflicting_ict_subtracts() {
        let config = EngineConfig::default();
        let report = IctReport {
            fair_value_gaps: vec![bullish_gap(150)],
            order_blocks: vec![
                OrderBlock {
                    direction: Direction::Bullish,
                    high: 103.0,
                    low: 102.0,
                    origin_timestamp: 140,
                    impulse_timestamp: 141,
                    broken: false,
                    broken_at: None,
                    mitigated: false,
                    confidence: 70,
                },
            ],
            structure_events: vec![MarketStructureEvent {
                kind: StructureKind::MarketStructureShift,
                direction: Direction::Bearish,
                timestamp: 170,
                level: 101.0,
                pivot: 99.0,
                confidence: 65,
            }],
            ..IctReport::default()
        };
        let active = active_ict(&report, 199);
        let (bias, agreeing, conflicting, points) = score_ict(&active, &config);
        assert_eq!(bias, Direction::Bullish);
        assert_eq!((agreeing, conflicting), (2, 1));
        assert_eq!(points, 15);
    }

    #[test]
    fn test_sweep_counts_as_ict_evidence() {
        let config = EngineConfig::default();
        let report = IctReport {
            fair_value_gaps: vec![bullish_gap(150)],
            liquidity_sweeps: vec![LiquiditySweep {
                side: LiquiditySide::SellSide,
                direction: Direction::Bullish,
                level: 98.0,
                extreme: 97.5,
                timestamp: 195,
                confidence: 75,
            }],
            ..IctReport::default()
        };
        let mini = evaluate_timeframe(
            Timeframe::H1,
            &window(200),
            &bullish_snapshot(),
            &report,
            &config,
        );
        assert_eq!(mini.ict_bias, Direction::Bullish);
        assert_eq!(mini.score, 90);
        assert!(mini.evidence.iter().any(|e| matches!(
            e,
            Evidence::Ict { pattern: IctKind::LiquiditySweep, label, .. }
                if label == "Bullish liquidity sweep"
        )));
    }

    #[test]
    fn test_premium_discount_is_reported_but_unscored() {
        let config = EngineConfig::default();
        let report = IctReport {
            premium_discount: Some(PremiumDiscount {
                range_high: 130.0,
                range_low: 90.0,
                equilibrium: 110.0,
                zone: PriceZone::Premium,
                ote_low: 114.8,
                ote_high: 121.6,
                in_ote: true,
                direction: Direction::Bearish,
                confidence: 95,
            }),
            ..IctReport::default()
        };
        let mini = evaluate_timeframe(
            Timeframe::H1,
            &window(200),
            &bullish_snapshot(),
            &report,
            &config,
        );
        assert_eq!(mini.score, 70);
        assert_eq!(mini.ict_bias, Direction::Neutral);
        assert!(matches!(
            mini.evidence.last(),
            Some(Evidence::PremiumDiscount {
                zone: PriceZone::Premium,
                in_ote: true,
                ..
            })
        ));
    }

    #[test]
    fn test_balanced_ict_is_neutral() {
        let config = EngineConfig::default();
        let mut bearish = bullish_gap(150);
        bearish.direction = Direction::Bearish;
        let report = IctReport {
            fair_value_gaps: vec![bearish],
            structure_events: vec![MarketStructureEvent {
                kind: StructureKind::BreakOfStructure,
                direction: Direction::Bullish,
                timestamp: 160,
                level: 110.0,
                pivot: 112.0,
                confidence: 70,
            }],
            ..IctReport::default()
        };
        let (bias, _, _, points) = score_ict(&active_ict(&report, 199), &config);
        assert_eq!(bias, Direction::Neutral);
        assert_eq!(points, 0);
    }

    #[test]
    fn test_bearish_mirror() {
        let config = EngineConfig::default();
        let snap = IndicatorSnapshot {
            close: Some(80.0),
            sma_fast: Some(90.0),
            sma_slow: Some(100.0),
            rsi: Some(42.0),
            prev_rsi: Some(45.0),
            macd: Some(MacdValue {
                line: -2.0,
                signal: -1.5,
                histogram: -0.5,
            }),
            prev_macd: Some(MacdValue {
                line: -1.8,
                signal: -1.45,
                histogram: -0.35,
            }),
        };
        let mini = evaluate_timeframe(
            Timeframe::M15,
            &window(200),
            &snap,
            &IctReport::default(),
            &config,
        );
        assert_eq!(mini.score, -70);
        assert_eq!(mini.direction, Direction::Bearish);
    }

    #[test]
    fn test_local_confidence_bounds() {
        assert_eq!(local_confidence(0, 90), 0);
        assert_eq!(local_confidence(-45, 90), 50);
        assert_eq!(local_confidence(500, 90), 100);
        assert_eq!(local_confidence(i32::MIN, 90), 100);
        assert_eq!(local_confidence(10, 0), 0);
    }
}
