use super::{IctSummary, PriceZone, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directional bias of a timeframe, pattern or phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Direction {
    /// +1 for bullish, -1 for bearish, 0 for neutral.
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Bullish => 1,
            Direction::Bearish => -1,
            Direction::Neutral => 0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Bullish => "Bullish",
            Direction::Bearish => "Bearish",
            Direction::Neutral => "Neutral",
        }
    }
}

/// Final call for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Sell,
    Neutral,
}

impl Recommendation {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Bullish => Recommendation::Buy,
            Direction::Bearish => Recommendation::Sell,
            Direction::Neutral => Recommendation::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Buy => "Buy",
            Recommendation::Sell => "Sell",
            Recommendation::Neutral => "Neutral",
        }
    }
}

/// RSI zone relative to the configured bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IctKind {
    OrderBlock,
    FairValueGap,
    BreakerBlock,
    Structure,
    MarketPhase,
    LiquiditySweep,
}

impl IctKind {
    pub fn name(&self) -> &'static str {
        match self {
            IctKind::OrderBlock => "order block",
            IctKind::FairValueGap => "fair value gap",
            IctKind::BreakerBlock => "breaker block",
            IctKind::Structure => "structure break",
            IctKind::MarketPhase => "market phase",
            IctKind::LiquiditySweep => "liquidity sweep",
        }
    }
}

/// One scored observation behind a MiniSignal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Window shorter than the longest lookback.
    InsufficientData { have: usize, need: usize },
    Trend {
        direction: Direction,
        close: f64,
        sma_fast: f64,
        sma_slow: f64,
        points: i32,
    },
    Momentum {
        direction: Direction,
        rsi: f64,
        rising: bool,
        zone: RsiZone,
        points: i32,
    },
    Macd {
        direction: Direction,
        line: f64,
        signal: f64,
        histogram: f64,
        crossover: bool,
        points: i32,
    },
    Ict {
        pattern: IctKind,
        direction: Direction,
        label: String,
        low: f64,
        high: f64,
        timestamp: i64,
        confidence: u8,
    },
    IctConfluence {
        direction: Direction,
        agreeing: usize,
        conflicting: usize,
        points: i32,
    },
    /// Location in the dealing range. Unscored here; it qualifies the
    /// confluence boost instead.
    PremiumDiscount {
        direction: Direction,
        zone: PriceZone,
        equilibrium: f64,
        ote_low: f64,
        ote_high: f64,
        in_ote: bool,
    },
}

/// Per-timeframe verdict. Recomputed wholesale whenever its window changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniSignal {
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub local_confidence: u8,
    pub score: i32,
    /// Net direction of the ICT evidence alone.
    pub ict_bias: Direction,
    pub evidence: Vec<Evidence>,
}

impl MiniSignal {
    pub fn insufficient(timeframe: Timeframe, have: usize, need: usize) -> Self {
        Self {
            timeframe,
            direction: Direction::Neutral,
            local_confidence: 0,
            score: 0,
            ict_bias: Direction::Neutral,
            evidence: vec![Evidence::InsufficientData { have, need }],
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.evidence
            .iter()
            .any(|e| matches!(e, Evidence::InsufficientData { .. }))
    }
}

/// The externally visible artifact. Replaced atomically on every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub strength: u8,
    pub breakdown: BTreeMap<Timeframe, Direction>,
    pub rationale: Vec<String>,
    pub ict_analysis: IctSummary,
    pub updated_at: DateTime<Utc>,
}

/// Signal lifecycle per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLifecycle {
    #[default]
    Uncomputed,
    Computed,
    Stale,
}

/// Warm-up progress for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeProgress {
    pub timeframe: Timeframe,
    pub candles: usize,
    pub required: usize,
    pub ready: bool,
}

/// Pipeline status for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatus {
    pub symbol: String,
    pub lifecycle: SignalLifecycle,
    pub revision: u64,
    pub computed_revision: u64,
    pub recomputes: u64,
    pub progress: Vec<TimeframeProgress>,
}
