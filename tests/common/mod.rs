//! Shared synthetic candle generators for integration tests.

#![allow(dead_code)]

use glorypicks::services::{CandleStore, SignalService};
use glorypicks::types::{Candle, CandleEvent, SignalLifecycle, SignalStatus, Timeframe};
use std::time::Duration;

/// 2020-09-13T12:26:40Z, far enough in the past for every generated bar to be closed.
pub const START_MS: i64 = 1_600_000_000_000;

/// Steady uptrend (0.3% per bar) with alternating up/down bars of about
/// 1.2% around the trend line. The last bar is always an up bar.
pub fn ascending(n: usize, timeframe: Timeframe) -> Vec<Candle> {
    zigzag(n, timeframe, 1.003)
}

/// Mirror of [`ascending`]: downtrend whose last bar is a down bar.
pub fn descending(n: usize, timeframe: Timeframe) -> Vec<Candle> {
    zigzag(n, timeframe, 0.997)
}

fn zigzag(n: usize, timeframe: Timeframe, drift: f64) -> Vec<Candle> {
    let with_trend = if drift >= 1.0 { 1.012 } else { 0.988 };
    let against = if drift >= 1.0 { 0.988 } else { 1.012 };

    let mut candles = Vec::with_capacity(n);
    let mut prev_close = 100.0;
    for i in 0..n {
        let trend = 100.0 * drift.powi(i as i32);
        let close = if (n - 1 - i) % 2 == 0 {
            trend * with_trend
        } else {
            trend * against
        };
        let open = prev_close;
        candles.push(Candle::new(
            START_MS + i as i64 * timeframe.duration_ms(),
            open,
            open.max(close) * 1.002,
            open.min(close) * 0.998,
            close,
            1_000.0 + i as f64,
        ));
        prev_close = close;
    }
    candles
}

/// Slowly rising sine wave, about 25 candles per cycle, so pivots keep
/// confirming in both directions. Each bar is 1.0 tall.
pub fn wave(n: usize, timeframe: Timeframe) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let high = 100.0 + 5.0 * (i as f64 / 4.0).sin() + 0.02 * i as f64;
            let low = high - 1.0;
            Candle::new(
                START_MS + i as i64 * timeframe.duration_ms(),
                low + 0.25,
                high,
                low,
                high - 0.25,
                10.0,
            )
        })
        .collect()
}

/// Flat closes; too quiet to trip any directional rule.
pub fn flat(n: usize, timeframe: Timeframe) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            Candle::new(
                START_MS + i as i64 * timeframe.duration_ms(),
                100.0,
                100.5,
                99.5,
                100.0,
                1.0,
            )
        })
        .collect()
}

pub fn event(symbol: &str, timeframe: Timeframe, candle: Candle) -> CandleEvent {
    CandleEvent {
        symbol: symbol.to_string(),
        interval: timeframe.label().to_string(),
        candle,
        closed: true,
    }
}

pub fn load(store: &CandleStore, symbol: &str, timeframe: Timeframe, candles: &[Candle]) {
    for c in candles {
        store.append(symbol, timeframe, *c).unwrap();
    }
}

/// Every configured timeframe of the default config, fed the same shape.
pub fn load_all(store: &CandleStore, symbol: &str, n: usize, shape: fn(usize, Timeframe) -> Vec<Candle>) {
    for tf in [Timeframe::D1, Timeframe::H1, Timeframe::M15] {
        load(store, symbol, tf, &shape(n, tf));
    }
}

pub fn events_all(symbol: &str, n: usize, shape: fn(usize, Timeframe) -> Vec<Candle>) -> Vec<CandleEvent> {
    [Timeframe::D1, Timeframe::H1, Timeframe::M15]
        .into_iter()
        .flat_map(|tf| shape(n, tf).into_iter().map(move |c| event(symbol, tf, c)))
        .collect()
}

/// Poll until the background worker has caught up with the store.
pub async fn wait_computed(service: &SignalService, symbol: &str) -> SignalStatus {
    for _ in 0..500 {
        if let Some(status) = service.status(symbol) {
            if status.lifecycle == SignalLifecycle::Computed
                && status.computed_revision == status.revision
            {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("signal for {} was never computed", symbol);
}
