//! Human-readable explanation of a signal.

use super::confluence::Confluence;
use crate::types::{Direction, Evidence, MarketMakerPhase, MiniSignal, RsiZone, Timeframe};

/// Render the evidence as ordered lines: one per timeframe (highest first),
/// then one per active ICT pattern, then a summary. Nothing is emitted for
/// evidence that is missing.
pub fn build_rationale(
    minis: &[MiniSignal],
    confluence: &Confluence,
    phase: Option<(Timeframe, &MarketMakerPhase)>,
) -> Vec<String> {
    let mut ordered: Vec<&MiniSignal> = minis.iter().collect();
    ordered.sort_by(|a, b| b.timeframe.cmp(&a.timeframe));

    let mut lines: Vec<String> = ordered.iter().map(|m| timeframe_line(m)).collect();

    for mini in &ordered {
        for evidence in &mini.evidence {
            match evidence {
                Evidence::Ict {
                    label, low, high, ..
                } => lines.push(format!(
                    "{} ICT: {} {}",
                    mini.timeframe.label(),
                    label,
                    price_range(*low, *high)
                )),
                Evidence::PremiumDiscount {
                    zone,
                    equilibrium,
                    ote_low,
                    ote_high,
                    in_ote,
                    ..
                } => {
                    let mut line = format!(
                        "{} ICT: {} zone, equilibrium {}",
                        mini.timeframe.label(),
                        zone.name(),
                        price(*equilibrium)
                    );
                    if *in_ote {
                        line.push_str(&format!(", inside OTE {}", price_range(*ote_low, *ote_high)));
                    }
                    lines.push(line);
                }
                _ => {}
            }
        }
    }

    lines.push(summary_line(minis.len(), confluence, phase));
    lines
}

fn timeframe_line(mini: &MiniSignal) -> String {
    if let Some(Evidence::InsufficientData { have, need }) = mini
        .evidence
        .iter()
        .find(|e| matches!(e, Evidence::InsufficientData { .. }))
    {
        return format!(
            "{}: insufficient data ({} of {} candles)",
            mini.timeframe.label(),
            have,
            need
        );
    }

    let details: Vec<String> = mini.evidence.iter().filter_map(indicator_detail).collect();
    let head = format!(
        "{}: {} (score {:+}, confidence {})",
        mini.timeframe.label(),
        mini.direction.label(),
        mini.score,
        mini.local_confidence
    );
    if details.is_empty() {
        head
    } else {
        format!("{}: {}", head, details.join(", "))
    }
}

fn indicator_detail(evidence: &Evidence) -> Option<String> {
    match evidence {
        Evidence::Trend {
            close,
            sma_fast,
            sma_slow,
            ..
        } => {
            let text = if close > sma_fast && sma_fast > sma_slow {
                format!(
                    "price {} above fast SMA {} above slow SMA {}",
                    price(*close),
                    price(*sma_fast),
                    price(*sma_slow)
                )
            } else if close < sma_fast && sma_fast < sma_slow {
                format!(
                    "price {} below fast SMA {} below slow SMA {}",
                    price(*close),
                    price(*sma_fast),
                    price(*sma_slow)
                )
            } else if sma_fast > sma_slow {
                format!("fast SMA {} above slow SMA {}", price(*sma_fast), price(*sma_slow))
            } else if sma_fast < sma_slow {
                format!("fast SMA {} below slow SMA {}", price(*sma_fast), price(*sma_slow))
            } else {
                return None;
            };
            Some(text)
        }
        Evidence::Momentum {
            rsi, rising, zone, ..
        } => Some(match zone {
            RsiZone::Overbought => format!("RSI {:.1} overbought", rsi),
            RsiZone::Oversold => format!("RSI {:.1} oversold", rsi),
            RsiZone::Neutral => {
                format!("RSI {:.1} {}", rsi, if *rising { "rising" } else { "falling" })
            }
        }),
        Evidence::Macd {
            direction,
            crossover,
            line,
            signal,
            ..
        } => {
            let relation = if line > signal { "above" } else { "below" };
            let mut text = format!("MACD {} signal", relation);
            if *crossover {
                text.push_str(" (fresh crossover)");
            } else if *direction == Direction::Neutral {
                text.push_str(" (fading)");
            }
            Some(text)
        }
        _ => None,
    }
}

fn summary_line(
    total: usize,
    confluence: &Confluence,
    phase: Option<(Timeframe, &MarketMakerPhase)>,
) -> String {
    let mut line = format!(
        "{} with strength {}",
        confluence.recommendation.label(),
        confluence.strength
    );
    if confluence.direction != Direction::Neutral {
        line.push_str(&format!(
            ": {} of {} timeframes agree",
            confluence.agreeing, total
        ));
        if confluence.ict_boost > 0.0 {
            line.push_str(&format!(", ICT boost +{:.0}", confluence.ict_boost));
        }
        if let Some((zone, in_ote)) = confluence.zone {
            line.push_str(&format!(
                ", {} {} +{:.0}",
                zone.name(),
                if in_ote { "OTE" } else { "zone" },
                confluence.zone_boost
            ));
        }
    } else {
        line.push_str(": no directional agreement");
    }
    if let Some((tf, phase)) = phase {
        line.push_str(&format!(
            ", market phase {} ({})",
            phase.phase.name(),
            tf.label()
        ));
    }
    line
}

fn price(value: f64) -> String {
    if value.abs() >= 1.0 {
        format!("{:.2}", value)
    } else {
        format!("{:.6}", value)
    }
}

fn price_range(low: f64, high: f64) -> String {
    if low == high {
        format!("at {}", price(low))
    } else {
        format!("{}-{}", price(low), price(high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IctKind, Phase, PriceZone, Recommendation};

    fn confluence(direction: Direction, strength: u8, agreeing: usize) -> Confluence {
        Confluence {
            direction,
            recommendation: Recommendation::from_direction(direction),
            strength,
            bullish_mass: 1.0,
            bearish_mass: 0.0,
            neutral_mass: 0.0,
            agreeing,
            ict_boost: 0.0,
            zone_boost: 0.0,
            zone: None,
        }
    }

    fn bullish_mini(tf: Timeframe) -> MiniSignal {
        MiniSignal {
            timeframe: tf,
            direction: Direction::Bullish,
            local_confidence: 78,
            score: 70,
            ict_bias: Direction::Bullish,
            evidence: vec![
                Evidence::Trend {
                    direction: Direction::Bullish,
                    close: 120.0,
                    sma_fast: 110.0,
                    sma_slow: 100.0,
                    points: 30,
                },
                Evidence::Momentum {
                    direction: Direction::Bullish,
                    rsi: 58.04,
                    rising: true,
                    zone: RsiZone::Neutral,
                    points: 20,
                },
                Evidence::Ict {
                    pattern: IctKind::FairValueGap,
                    direction: Direction::Bullish,
                    label: "Bullish fair value gap".to_string(),
                    low: 101.2,
                    high: 102.4,
                    timestamp: 5,
                    confidence: 60,
                },
            ],
        }
    }

    #[test]
    fn test_line_order() {
        let minis = vec![
            bullish_mini(Timeframe::M15),
            bullish_mini(Timeframe::D1),
            MiniSignal::insufficient(Timeframe::H1, 10, 200),
        ];
        let lines = build_rationale(&minis, &confluence(Direction::Bullish, 80, 2), None);
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("1d: Bullish (score +70, confidence 78): price 120.00"));
        assert_eq!(lines[1], "1h: insufficient data (10 of 200 candles)");
        assert!(lines[2].starts_with("15m: Bullish"));
        assert_eq!(lines[3], "1d ICT: Bullish fair value gap 101.20-102.40");
        assert_eq!(lines[4], "15m ICT: Bullish fair value gap 101.20-102.40");
        assert_eq!(lines[5], "Buy with strength 80: 2 of 3 timeframes agree");
    }

    #[test]
    fn test_momentum_text() {
        let lines = build_rationale(
            &[bullish_mini(Timeframe::H1)],
            &confluence(Direction::Bullish, 70, 1),
            None,
        );
        assert!(lines[0].contains("RSI 58.0 rising"));
    }

    #[test]
    fn test_summary_includes_phase() {
        let phase = MarketMakerPhase {
            phase: Phase::Markup,
            direction: Direction::Bullish,
            confidence: 80,
            range_high: 100.5,
            range_low: 99.5,
        };
        let lines = build_rationale(
            &[],
            &confluence(Direction::Neutral, 0, 0),
            Some((Timeframe::H1, &phase)),
        );
        assert_eq!(
            lines,
            vec!["Neutral with strength 0: no directional agreement, market phase Markup (1h)"]
        );
    }

    #[test]
    fn test_premium_discount_lines() {
        let mut mini = bullish_mini(Timeframe::H1);
        mini.evidence.push(Evidence::PremiumDiscount {
            direction: Direction::Bullish,
            zone: PriceZone::Discount,
            equilibrium: 105.0,
            ote_low: 96.6,
            ote_high: 100.2,
            in_ote: true,
        });
        let mut result = confluence(Direction::Bullish, 92, 1);
        result.zone = Some((PriceZone::Discount, true));
        result.zone_boost = 15.0;

        let lines = build_rationale(&[mini], &result, None);
        assert_eq!(
            lines[2],
            "1h ICT: discount zone, equilibrium 105.00, inside OTE 96.60-100.20"
        );
        assert_eq!(
            lines[3],
            "Buy with strength 92: 1 of 1 timeframes agree, discount OTE +15"
        );
    }

    #[test]
    fn test_small_prices() {
        assert_eq!(price_range(0.000123, 0.000123), "at 0.000123");
    }
}
