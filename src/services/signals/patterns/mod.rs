//! ICT pattern detectors.
//!
//! Each detector is a pure function of the candle window: the same window and
//! configuration always yield the same events. A detector that cannot work
//! with the window it is given (too short, no volatility reference) returns
//! no events instead of failing, so one detector never takes the others down.

pub mod breaker_block;
pub mod fair_value_gap;
pub mod liquidity;
pub mod market_maker;
pub mod order_block;
pub mod premium_discount;
pub mod structure;

pub use breaker_block::BreakerBlockDetector;
pub use fair_value_gap::FairValueGapDetector;
pub use liquidity::LiquiditySweepDetector;
pub use market_maker::MarketMakerDetector;
pub use order_block::OrderBlockDetector;
pub use premium_discount::PremiumDiscountDetector;
pub use structure::{StructureDetector, StructureLog};

use crate::config::IctConfig;
use crate::types::{
    Candle, IctEvent, IctReport, MarketStructureEvent, StructureSummary, SwingKind, SwingPoint,
};

/// Common contract for ICT pattern detectors.
pub trait PatternDetector: Send + Sync {
    /// Unique identifier for this detector.
    fn id(&self) -> &'static str;

    /// Minimum window length before the detector can emit anything.
    fn min_candles(&self, config: &IctConfig) -> usize;

    /// Scan the window and return every event found, oldest first.
    fn detect(&self, candles: &[Candle], config: &IctConfig) -> Vec<IctEvent>;
}

/// The default detector set.
pub fn all_detectors() -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(OrderBlockDetector),
        Box::new(FairValueGapDetector),
        Box::new(BreakerBlockDetector),
        Box::new(StructureDetector),
        Box::new(MarketMakerDetector),
        Box::new(PremiumDiscountDetector),
        Box::new(LiquiditySweepDetector),
    ]
}

/// Run every detector over the same window and fold the events into a report.
pub fn run_detectors(
    detectors: &[Box<dyn PatternDetector>],
    candles: &[Candle],
    config: &IctConfig,
) -> IctReport {
    let mut report = IctReport::default();

    for detector in detectors {
        if candles.len() < detector.min_candles(config) {
            continue;
        }
        for event in detector.detect(candles, config) {
            match event {
                IctEvent::OrderBlock(ob) => report.order_blocks.push(ob),
                IctEvent::FairValueGap(fvg) => report.fair_value_gaps.push(fvg),
                IctEvent::BreakerBlock(bb) => report.breaker_blocks.push(bb),
                IctEvent::Structure(ev) => report.structure_events.push(ev),
                IctEvent::SwingPoint(sp) => report.swing_points.push(sp),
                IctEvent::Phase(phase) => report.market_phase = Some(phase),
                IctEvent::PremiumDiscount(pd) => report.premium_discount = Some(pd),
                IctEvent::LiquiditySweep(sweep) => report.liquidity_sweeps.push(sweep),
            }
        }
    }

    report.structure = summarize_structure(&report);
    report.liquidity_pools = liquidity::liquidity_pools(
        candles,
        &report.order_blocks,
        &report.swing_points,
    );
    report
}

/// Replace the structure found in the window with a log that outlives
/// eviction. Pools keep using the window's own pivots.
pub fn apply_structure_log(
    report: &mut IctReport,
    swing_points: &[SwingPoint],
    structure_events: &[MarketStructureEvent],
) {
    report.swing_points = swing_points.to_vec();
    report.structure_events = structure_events.to_vec();
    report.structure = summarize_structure(report);
}

fn summarize_structure(report: &IctReport) -> StructureSummary {
    let last_event = report.structure_events.last().cloned();
    StructureSummary {
        // trend only changes when a structure event fires
        trend: last_event
            .as_ref()
            .map(|e| e.direction)
            .unwrap_or_default(),
        last_swing_high: report
            .swing_points
            .iter()
            .rev()
            .find(|s| s.kind == SwingKind::High)
            .cloned(),
        last_swing_low: report
            .swing_points
            .iter()
            .rev()
            .find(|s| s.kind == SwingKind::Low)
            .cloned(),
        last_event,
    }
}

/// Scale a ratio to a 0-100 confidence.
pub(crate) fn confidence(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
