//! Pure signal pipeline over a symbol snapshot.

use super::confluence::{aggregate, Confluence};
use super::evaluator::evaluate_timeframe;
use super::indicators::IndicatorSnapshot;
use super::patterns::{all_detectors, apply_structure_log, run_detectors, PatternDetector};
use super::rationale::build_rationale;
use crate::config::EngineConfig;
use crate::services::candle_store::SymbolSnapshot;
use crate::types::{
    IctAnalysis, IctReport, IctSummary, MiniSignal, Signal, Timeframe, TimeframeProgress,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// Everything one evaluation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub signal: Signal,
    pub ict: IctAnalysis,
    pub minis: Vec<MiniSignal>,
    pub confluence: Confluence,
}

/// Composes detectors, evaluator, aggregator and rationale builder.
///
/// Holds no per-symbol state: the output is a function of the snapshot and
/// the configuration only.
pub struct SignalEngine {
    config: EngineConfig,
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_detectors(config, all_detectors())
    }

    pub fn with_detectors(config: EngineConfig, detectors: Vec<Box<dyn PatternDetector>>) -> Self {
        Self { config, detectors }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Warm-up state of every configured timeframe.
    pub fn progress(&self, lengths: &BTreeMap<Timeframe, usize>) -> Vec<TimeframeProgress> {
        let required = self.config.required_history();
        self.config
            .timeframes
            .iter()
            .map(|w| {
                let candles = lengths.get(&w.timeframe).copied().unwrap_or(0);
                TimeframeProgress {
                    timeframe: w.timeframe,
                    candles,
                    required,
                    ready: candles >= required,
                }
            })
            .collect()
    }

    /// True once every configured timeframe holds enough history.
    pub fn is_ready(&self, snapshot: &SymbolSnapshot) -> bool {
        let required = self.config.required_history();
        self.config
            .timeframes
            .iter()
            .all(|w| snapshot.len(w.timeframe) >= required)
    }

    pub fn evaluate(&self, snapshot: &SymbolSnapshot) -> EngineOutput {
        let empty = IndicatorSnapshot::default();
        let mut reports: BTreeMap<_, IctReport> = BTreeMap::new();
        let mut minis = Vec::with_capacity(self.config.timeframes.len());

        for w in &self.config.timeframes {
            let frame = snapshot.frame(w.timeframe);
            let (candles, indicators) = match frame {
                Some(frame) => (frame.candles.as_slice(), &frame.indicators),
                None => (&[][..], &empty),
            };
            let mut report = run_detectors(&self.detectors, candles, &self.config.ict);
            if let Some(frame) = frame {
                apply_structure_log(&mut report, &frame.swing_points, &frame.structure_events);
            }
            minis.push(evaluate_timeframe(
                w.timeframe,
                candles,
                indicators,
                &report,
                &self.config,
            ));
            reports.insert(w.timeframe, report);
        }

        let confluence = aggregate(&minis, &self.config);

        let ict_tf = self.config.ict_timeframe;
        let ict_report = reports.get(&ict_tf);
        let phase = ict_report
            .and_then(|r| r.market_phase.as_ref())
            .map(|p| (ict_tf, p));
        let rationale = build_rationale(&minis, &confluence, phase);

        let updated_at = to_datetime(snapshot.latest_time().unwrap_or(0));

        let signal = Signal {
            symbol: snapshot.symbol.clone(),
            recommendation: confluence.recommendation,
            strength: confluence.strength,
            breakdown: minis.iter().map(|m| (m.timeframe, m.direction)).collect(),
            rationale,
            ict_analysis: ict_report
                .map(|r| IctSummary::from_report(ict_tf, r))
                .unwrap_or_default(),
            updated_at,
        };

        EngineOutput {
            signal,
            ict: IctAnalysis {
                symbol: snapshot.symbol.clone(),
                timeframes: reports,
                updated_at,
            },
            minis,
            confluence,
        }
    }
}

fn to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
