//! Signal service: ingest, coalesced recompute and publication.

use super::engine::SignalEngine;
use crate::config::{ConfigError, EngineConfig};
use crate::services::candle_store::CandleStore;
use crate::types::{
    CandleEvent, IctAnalysis, Signal, SignalLifecycle, SignalStatus, Timeframe, ValidationError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SlotState {
    lifecycle: SignalLifecycle,
    signal: Option<Arc<Signal>>,
    ict: Option<Arc<IctAnalysis>>,
    /// Store revision of the last snapshot looked at by a worker.
    computed_revision: u64,
    recomputes: u64,
}

/// Published state of one symbol.
#[derive(Debug, Default)]
struct SignalSlot {
    state: Mutex<SlotState>,
    /// Set while a worker owns the symbol's recompute loop.
    scheduled: AtomicBool,
}

/// Rejected entry of a batch ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRejection {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub accepted: usize,
    pub rejected: Vec<BatchRejection>,
}

/// Owns the candle store and the engine and publishes one Signal per symbol.
pub struct SignalService {
    store: Arc<CandleStore>,
    engine: SignalEngine,
    slots: DashMap<String, Arc<SignalSlot>>,
}

impl SignalService {
    /// Create the service. Fails if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            store: CandleStore::new(config.clone()),
            engine: SignalEngine::new(config),
            slots: DashMap::new(),
        }))
    }

    pub fn store(&self) -> &Arc<CandleStore> {
        &self.store
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }

    /// Ingest a closed-candle event, judging "closed" against the wall clock.
    pub fn ingest(self: &Arc<Self>, event: CandleEvent) -> Result<u64, ValidationError> {
        self.ingest_at(event, chrono::Utc::now().timestamp_millis())
    }

    /// Ingest a closed-candle event as of `now_ms`.
    ///
    /// Forming candles are refused outright. On success the symbol is marked
    /// stale and a recompute is scheduled; returns the new store revision.
    pub fn ingest_at(self: &Arc<Self>, event: CandleEvent, now_ms: i64) -> Result<u64, ValidationError> {
        let result = self.append_event(&event, now_ms);
        match result {
            Ok((symbol, revision)) => {
                debug!(
                    "Accepted {} {} candle at {} (revision {})",
                    symbol, event.interval, event.candle.time, revision
                );
                self.schedule(symbol);
                Ok(revision)
            }
            Err(e) => {
                warn!("Rejected {} {} candle: {}", event.symbol, event.interval, e);
                Err(e)
            }
        }
    }

    /// Ingest many events; each is accepted or rejected on its own.
    pub fn ingest_batch(self: &Arc<Self>, events: Vec<CandleEvent>, now_ms: i64) -> BatchResult {
        let mut result = BatchResult::default();
        for (index, event) in events.into_iter().enumerate() {
            match self.ingest_at(event, now_ms) {
                Ok(_) => result.accepted += 1,
                Err(e) => result.rejected.push(BatchRejection {
                    index,
                    error: e.to_string(),
                }),
            }
        }
        result
    }

    fn append_event(&self, event: &CandleEvent, now_ms: i64) -> Result<(String, u64), ValidationError> {
        let timeframe: Timeframe = event.interval.parse()?;
        let candle = event.candle;
        if !event.closed || candle.time.saturating_add(timeframe.duration_ms()) > now_ms {
            return Err(ValidationError::FormingCandle { time: candle.time });
        }
        let symbol = CandleStore::normalize_symbol(&event.symbol)?;

        // Hold the slot while appending so the stale mark and the new
        // revision are seen together by a publishing worker.
        let slot = self.slot(&symbol);
        let mut state = slot.state.lock();
        let revision = self.store.append(&symbol, timeframe, candle)?;
        if state.lifecycle == SignalLifecycle::Computed {
            state.lifecycle = SignalLifecycle::Stale;
        }
        Ok((symbol, revision))
    }

    /// Recompute a symbol on the current thread until it is up to date.
    pub fn recompute(&self, symbol: &str) {
        let Ok(symbol) = CandleStore::normalize_symbol(symbol) else {
            return;
        };
        if !self.store.contains(&symbol) {
            return;
        }
        let slot = self.slot(&symbol);
        if !slot.scheduled.swap(true, Ordering::AcqRel) {
            self.drain(&symbol, &slot);
        }
    }

    fn schedule(self: &Arc<Self>, symbol: String) {
        let slot = self.slot(&symbol);
        if slot.scheduled.swap(true, Ordering::AcqRel) {
            // The running worker re-checks the revision before it exits.
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let service = Arc::clone(self);
                handle.spawn_blocking(move || service.drain(&symbol, &slot));
            }
            Err(_) => self.drain(&symbol, &slot),
        }
    }

    /// Worker loop. Runs with `scheduled` set and clears it on exit.
    fn drain(&self, symbol: &str, slot: &SignalSlot) {
        loop {
            self.recompute_once(symbol, slot);
            slot.scheduled.store(false, Ordering::Release);

            let latest = self.store.revision(symbol).unwrap_or(0);
            let computed = slot.state.lock().computed_revision;
            if latest <= computed {
                break;
            }
            // A candle landed after our snapshot. Take the loop back unless
            // a newer worker already has it.
            if slot.scheduled.swap(true, Ordering::AcqRel) {
                break;
            }
        }
    }

    fn recompute_once(&self, symbol: &str, slot: &SignalSlot) {
        let Some(snapshot) = self.store.snapshot(symbol) else {
            return;
        };
        if snapshot.revision <= slot.state.lock().computed_revision {
            return;
        }

        if !self.engine.is_ready(&snapshot) {
            let mut state = slot.state.lock();
            state.computed_revision = state.computed_revision.max(snapshot.revision);
            debug!(
                "{} still warming up at revision {}",
                symbol, snapshot.revision
            );
            return;
        }

        let started = Instant::now();
        let output = self.engine.evaluate(&snapshot);

        let mut state = slot.state.lock();
        if snapshot.revision <= state.computed_revision {
            // A newer result was published while we computed.
            return;
        }
        let latest = self.store.revision(symbol).unwrap_or(snapshot.revision);
        let previous = state.lifecycle;

        state.signal = Some(Arc::new(output.signal));
        state.ict = Some(Arc::new(output.ict));
        state.computed_revision = snapshot.revision;
        state.recomputes += 1;
        state.lifecycle = if latest == snapshot.revision {
            SignalLifecycle::Computed
        } else {
            SignalLifecycle::Stale
        };

        debug!(
            "Recomputed {} at revision {} in {:?}",
            symbol,
            snapshot.revision,
            started.elapsed()
        );
        if previous == SignalLifecycle::Uncomputed {
            info!("First signal computed for {}", symbol);
        }
    }

    /// Latest published signal.
    pub fn signal(&self, symbol: &str) -> Option<Arc<Signal>> {
        self.existing_slot(symbol)?.state.lock().signal.clone()
    }

    /// Latest published ICT event set.
    pub fn ict_analysis(&self, symbol: &str) -> Option<Arc<IctAnalysis>> {
        self.existing_slot(symbol)?.state.lock().ict.clone()
    }

    /// Lifecycle and warm-up progress, or None for an unknown symbol.
    pub fn status(&self, symbol: &str) -> Option<SignalStatus> {
        let symbol = CandleStore::normalize_symbol(symbol).ok()?;
        let revision = self.store.revision(&symbol)?;
        let progress = self.engine.progress(&self.store.lengths(&symbol));

        let (lifecycle, computed_revision, recomputes) = match self.slots.get(&symbol) {
            Some(slot) => {
                let state = slot.state.lock();
                (state.lifecycle, state.computed_revision, state.recomputes)
            }
            None => (SignalLifecycle::Uncomputed, 0, 0),
        };

        Some(SignalStatus {
            symbol,
            lifecycle,
            revision,
            computed_revision,
            recomputes,
            progress,
        })
    }

    pub fn symbols(&self) -> Vec<String> {
        self.store.symbols()
    }

    fn slot(&self, symbol: &str) -> Arc<SignalSlot> {
        self.slots.entry(symbol.to_string()).or_default().clone()
    }

    fn existing_slot(&self, symbol: &str) -> Option<Arc<SignalSlot>> {
        let symbol = CandleStore::normalize_symbol(symbol).ok()?;
        self.slots.get(&symbol).map(|s| Arc::clone(s.value()))
    }
}
