//! Signal generation.
//!
//! Incremental indicators and ICT pattern detectors feed a per-timeframe
//! evaluator; a weighted multi-timeframe vote turns the results into one
//! Signal with a rationale.

pub mod confluence;
pub mod engine;
pub mod evaluator;
pub mod indicators;
pub mod patterns;
pub mod rationale;
pub mod service;

pub use confluence::{aggregate, Confluence};
pub use engine::{EngineOutput, SignalEngine};
pub use evaluator::evaluate_timeframe;
pub use patterns::{all_detectors, run_detectors, PatternDetector};
pub use rationale::build_rationale;
pub use service::{BatchRejection, BatchResult, SignalService};
