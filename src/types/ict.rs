//! ICT pattern types emitted by the pattern detectors.

use super::{Direction, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last opposite-coloured candle before an impulsive move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub high: f64,
    pub low: f64,
    pub origin_timestamp: i64,
    /// Open time of the impulsive candle that qualified the block.
    pub impulse_timestamp: i64,
    pub broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<i64>,
    pub mitigated: bool,
    pub confidence: u8,
}

/// Three-candle imbalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Direction,
    pub high: f64,
    pub low: f64,
    /// Open time of the middle (displacement) candle.
    pub timestamp: i64,
    pub filled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<i64>,
    pub confidence: u8,
}

/// Order block invalidated by a close beyond its extreme; its role reverses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerBlock {
    /// Direction of the new role: a broken bearish block becomes bullish support.
    pub direction: Direction,
    pub high: f64,
    pub low: f64,
    pub origin_timestamp: i64,
    pub broken_at: i64,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    #[serde(rename = "BOS")]
    BreakOfStructure,
    #[serde(rename = "MSS")]
    MarketStructureShift,
}

impl StructureKind {
    pub fn short(&self) -> &'static str {
        match self {
            StructureKind::BreakOfStructure => "BOS",
            StructureKind::MarketStructureShift => "MSS",
        }
    }
}

/// BOS/MSS event. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStructureEvent {
    pub kind: StructureKind,
    pub direction: Direction,
    /// Open time of the pivot candle that broke structure.
    pub timestamp: i64,
    /// The prior pivot level that was broken.
    pub level: f64,
    /// Price of the new pivot.
    pub pivot: f64,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingKind {
    High,
    Low,
}

/// Confirmed local extreme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub kind: SwingKind,
    pub price: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Consolidation,
    LiquidityGrab,
    SmartMoneyReversal,
    Distribution,
    Accumulation,
    Markup,
    Markdown,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Consolidation => "Consolidation",
            Phase::LiquidityGrab => "Liquidity Grab",
            Phase::SmartMoneyReversal => "Smart Money Reversal",
            Phase::Distribution => "Distribution",
            Phase::Accumulation => "Accumulation",
            Phase::Markup => "Markup",
            Phase::Markdown => "Markdown",
        }
    }
}

/// Market-maker model classification of a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMakerPhase {
    pub phase: Phase,
    /// Bias implied by the phase; Neutral while consolidating.
    pub direction: Direction,
    pub confidence: u8,
    /// Consolidation range the phase was measured against.
    pub range_high: f64,
    pub range_low: f64,
}

/// Where the last close sits within the dealing range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceZone {
    Premium,
    Equilibrium,
    Discount,
}

impl PriceZone {
    pub fn name(&self) -> &'static str {
        match self {
            PriceZone::Premium => "premium",
            PriceZone::Equilibrium => "equilibrium",
            PriceZone::Discount => "discount",
        }
    }
}

/// Premium/discount split of the recent dealing range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumDiscount {
    pub range_high: f64,
    pub range_low: f64,
    pub equilibrium: f64,
    pub zone: PriceZone,
    /// Optimal trade entry band on the side of the range price trades from.
    pub ote_low: f64,
    pub ote_high: f64,
    pub in_ote: bool,
    /// Discount favours longs, premium favours shorts.
    pub direction: Direction,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquiditySide {
    /// Stops resting above swing highs.
    BuySide,
    /// Stops resting below swing lows.
    SellSide,
}

/// A wick through a liquidity pool that closes back as a reversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub side: LiquiditySide,
    /// Move expected after the sweep: down after buy-side, up after sell-side.
    pub direction: Direction,
    /// The swept pool.
    pub level: f64,
    /// Wick extreme of the sweeping candle.
    pub extreme: f64,
    /// Open time of the sweeping candle.
    pub timestamp: i64,
    pub confidence: u8,
}

/// Output unit of a pattern detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IctEvent {
    OrderBlock(OrderBlock),
    FairValueGap(FairValueGap),
    BreakerBlock(BreakerBlock),
    Structure(MarketStructureEvent),
    SwingPoint(SwingPoint),
    Phase(MarketMakerPhase),
    PremiumDiscount(PremiumDiscount),
    LiquiditySweep(LiquiditySweep),
}

/// Trend state derived from the pivot sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub trend: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_swing_high: Option<SwingPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_swing_low: Option<SwingPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<MarketStructureEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub price: f64,
    pub timestamp: i64,
    /// "order_block" or "swing".
    pub source: String,
}

/// Resting liquidity above (buy-side) and below (sell-side) the last close.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPools {
    pub buy_side: Vec<LiquidityLevel>,
    pub sell_side: Vec<LiquidityLevel>,
}

/// All ICT findings for one timeframe window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IctReport {
    pub order_blocks: Vec<OrderBlock>,
    pub fair_value_gaps: Vec<FairValueGap>,
    pub breaker_blocks: Vec<BreakerBlock>,
    pub structure_events: Vec<MarketStructureEvent>,
    pub swing_points: Vec<SwingPoint>,
    pub structure: StructureSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_phase: Option<MarketMakerPhase>,
    pub liquidity_pools: LiquidityPools,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_discount: Option<PremiumDiscount>,
    pub liquidity_sweeps: Vec<LiquiditySweep>,
}

/// The `ict_analysis` block embedded in a Signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IctSummary {
    pub timeframe: Option<Timeframe>,
    pub breaker_blocks: Vec<BreakerBlock>,
    /// Unfilled gaps only.
    pub fair_value_gaps: Vec<FairValueGap>,
    pub market_phase: Option<MarketMakerPhase>,
    pub structure: StructureSummary,
    pub premium_discount: Option<PremiumDiscount>,
    pub liquidity_sweeps: Vec<LiquiditySweep>,
}

impl IctSummary {
    pub fn from_report(timeframe: Timeframe, report: &IctReport) -> Self {
        Self {
            timeframe: Some(timeframe),
            breaker_blocks: report.breaker_blocks.clone(),
            fair_value_gaps: report
                .fair_value_gaps
                .iter()
                .filter(|g| !g.filled)
                .cloned()
                .collect(),
            market_phase: report.market_phase.clone(),
            structure: report.structure.clone(),
            premium_discount: report.premium_discount.clone(),
            liquidity_sweeps: report.liquidity_sweeps.clone(),
        }
    }
}

/// Full ICT event set for a symbol, served independently of the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IctAnalysis {
    pub symbol: String,
    pub timeframes: BTreeMap<Timeframe, IctReport>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
