//! Per-symbol closed-candle windows.

use crate::config::EngineConfig;
use crate::services::signals::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::services::signals::patterns::structure::StructureLog;
use crate::types::{Candle, MarketStructureEvent, SwingPoint, Timeframe, ValidationError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Fixed-capacity ring of closed candles for one (symbol, timeframe).
#[derive(Debug)]
struct TimeframeWindow {
    candles: VecDeque<Candle>,
    capacity: usize,
    indicators: IndicatorEngine,
    structure: StructureLog,
}

impl TimeframeWindow {
    fn new(config: &EngineConfig) -> Self {
        let capacity = config.window_capacity;
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
            indicators: IndicatorEngine::new(&config.indicators),
            structure: StructureLog::new(config.ict.pivot_lookback, capacity),
        }
    }

    /// Ordering checks against the last stored candle.
    fn check(&self, candle: &Candle) -> Result<(), ValidationError> {
        if let Some(last) = self.candles.back() {
            if candle.time == last.time {
                return Err(ValidationError::DuplicateTimestamp { time: candle.time });
            }
            if candle.time < last.time {
                return Err(ValidationError::NonMonotonicTimestamp {
                    time: candle.time,
                    last: last.time,
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, candle: Candle) {
        self.indicators.on_close(&candle);
        self.candles.push_back(candle);

        // Trim old candles
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }

        self.structure.on_close(self.candles.make_contiguous());
    }

    fn tail(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).copied().collect()
    }
}

/// Every timeframe of one symbol. Guarded by a single lock so a snapshot
/// never observes a half-applied append.
#[derive(Debug, Default)]
struct SymbolWindows {
    frames: BTreeMap<Timeframe, TimeframeWindow>,
    revision: u64,
}

/// Copy of one timeframe window, its indicator readings and its structure log.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub candles: Vec<Candle>,
    pub indicators: IndicatorSnapshot,
    /// Logged pivots, which may predate the oldest candle still held.
    pub swing_points: Vec<SwingPoint>,
    pub structure_events: Vec<MarketStructureEvent>,
}

/// Consistent copy of all of a symbol's windows, taken under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    pub symbol: String,
    /// Number of candles accepted for the symbol when the copy was taken.
    pub revision: u64,
    pub frames: BTreeMap<Timeframe, FrameSnapshot>,
}

impl SymbolSnapshot {
    pub fn frame(&self, timeframe: Timeframe) -> Option<&FrameSnapshot> {
        self.frames.get(&timeframe)
    }

    pub fn len(&self, timeframe: Timeframe) -> usize {
        self.frame(timeframe).map(|f| f.candles.len()).unwrap_or(0)
    }

    /// Open time of the newest candle across all timeframes.
    pub fn latest_time(&self) -> Option<i64> {
        self.frames
            .values()
            .filter_map(|f| f.candles.last())
            .map(|c| c.time)
            .max()
    }
}

/// Closed-candle store keyed by symbol.
pub struct CandleStore {
    config: EngineConfig,
    symbols: DashMap<String, Arc<Mutex<SymbolWindows>>>,
}

impl CandleStore {
    /// Create a new candle store.
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            symbols: DashMap::new(),
        })
    }

    /// Symbols are stored trimmed and upper-cased.
    pub fn normalize_symbol(symbol: &str) -> Result<String, ValidationError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        Ok(symbol.to_uppercase())
    }

    /// Append a closed candle and return the symbol's new revision.
    ///
    /// Every check runs before anything is mutated, so a rejected candle
    /// leaves the store exactly as it was.
    pub fn append(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candle: Candle,
    ) -> Result<u64, ValidationError> {
        if !self.config.has_timeframe(timeframe) {
            return Err(ValidationError::UnknownTimeframe(timeframe.label().to_string()));
        }
        candle.validate()?;
        let symbol = Self::normalize_symbol(symbol)?;

        let slot = self.slot(&symbol);
        let mut windows = slot.lock();

        if let Some(window) = windows.frames.get(&timeframe) {
            window.check(&candle)?;
        }

        let config = &self.config;
        windows
            .frames
            .entry(timeframe)
            .or_insert_with(|| TimeframeWindow::new(config))
            .push(candle);
        windows.revision += 1;
        Ok(windows.revision)
    }

    /// The last `n` candles of a window, oldest first.
    pub fn window(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        self.with_symbol(symbol, |w| {
            w.frames
                .get(&timeframe)
                .map(|f| f.tail(n))
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Copy every window of a symbol under one lock.
    pub fn snapshot(&self, symbol: &str) -> Option<SymbolSnapshot> {
        let normalized = Self::normalize_symbol(symbol).ok()?;
        self.with_symbol(&normalized, |w| SymbolSnapshot {
            symbol: normalized.clone(),
            revision: w.revision,
            frames: w
                .frames
                .iter()
                .map(|(tf, f)| {
                    (
                        *tf,
                        FrameSnapshot {
                            candles: f.candles.iter().copied().collect(),
                            indicators: f.indicators.snapshot().clone(),
                            swing_points: f.structure.swing_points(),
                            structure_events: f.structure.events(),
                        },
                    )
                })
                .collect(),
        })
    }

    pub fn revision(&self, symbol: &str) -> Option<u64> {
        self.with_symbol(symbol, |w| w.revision)
    }

    /// Candle count per stored timeframe.
    pub fn lengths(&self, symbol: &str) -> BTreeMap<Timeframe, usize> {
        self.with_symbol(symbol, |w| {
            w.frames
                .iter()
                .map(|(tf, f)| (*tf, f.candles.len()))
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        Self::normalize_symbol(symbol)
            .map(|s| self.symbols.contains_key(&s))
            .unwrap_or(false)
    }

    /// All known symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, symbol: &str) -> Arc<Mutex<SymbolWindows>> {
        // Clone the Arc so the map shard is released before the symbol lock is taken.
        self.symbols
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    fn with_symbol<R>(&self, symbol: &str, f: impl FnOnce(&SymbolWindows) -> R) -> Option<R> {
        let symbol = Self::normalize_symbol(symbol).ok()?;
        let slot = self.symbols.get(&symbol)?.clone();
        let windows = slot.lock();
        Some(f(&windows))
    }
}
