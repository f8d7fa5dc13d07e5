//! Signal service tests running the background recompute on a tokio runtime.

mod common;

use common::{ascending, descending, event, events_all, wait_computed};
use glorypicks::config::EngineConfig;
use glorypicks::services::SignalService;
use glorypicks::types::{Recommendation, SignalLifecycle, Timeframe};
use std::sync::Arc;

// ============================================================================
// Coalesced recompute
// ============================================================================

#[tokio::test]
async fn test_background_recompute_reaches_latest_revision() {
    let service = SignalService::new(EngineConfig::default()).unwrap();

    let events = events_all("BTCUSDT", 220, ascending);
    let total = events.len() as u64;
    for e in events {
        service.ingest(e).unwrap();
    }

    let status = wait_computed(&service, "BTCUSDT").await;
    assert_eq!(status.revision, total);
    assert_eq!(status.computed_revision, total);
    assert!(status.recomputes >= 1);
    assert!(status.progress.iter().all(|p| p.ready));

    let signal = service.signal("btcusdt").unwrap();
    assert_eq!(signal.symbol, "BTCUSDT");
    assert_eq!(signal.recommendation, Recommendation::Buy);

    // updated_at is the open time of the newest candle, the last daily bar.
    let newest = ascending(220, Timeframe::D1).last().unwrap().time;
    assert_eq!(signal.updated_at.timestamp_millis(), newest);
}

#[tokio::test]
async fn test_new_candle_publishes_a_new_signal() {
    let service = SignalService::new(EngineConfig::default()).unwrap();
    for e in events_all("ETHUSDT", 220, ascending) {
        service.ingest(e).unwrap();
    }
    let first = wait_computed(&service, "ETHUSDT").await;
    let held = service.signal("ETHUSDT").unwrap();
    let copy = held.as_ref().clone();

    let next = *ascending(221, Timeframe::M15).last().unwrap();
    service
        .ingest(event("ETHUSDT", Timeframe::M15, next))
        .unwrap();

    let second = wait_computed(&service, "ETHUSDT").await;
    assert_eq!(second.revision, first.revision + 1);
    assert!(second.recomputes > first.recomputes);

    let latest = service.signal("ETHUSDT").unwrap();
    assert!(!Arc::ptr_eq(&held, &latest));
    // Readers holding the earlier signal never see it change.
    assert_eq!(*held, copy);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_symbols_recompute_independently() {
    let service = SignalService::new(EngineConfig::default()).unwrap();

    let tasks: Vec<_> = [("AAA", true), ("BBB", false), ("CCC", true)]
        .into_iter()
        .map(|(symbol, up)| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let shape = if up { ascending } else { descending };
                for e in events_all(symbol, 220, shape) {
                    service.ingest(e).unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for (symbol, expected) in [
        ("AAA", Recommendation::Buy),
        ("BBB", Recommendation::Sell),
        ("CCC", Recommendation::Buy),
    ] {
        let status = wait_computed(&service, symbol).await;
        assert_eq!(status.lifecycle, SignalLifecycle::Computed);
        assert_eq!(service.signal(symbol).unwrap().recommendation, expected);
    }
    assert_eq!(service.symbols(), vec!["AAA", "BBB", "CCC"]);
}

// ============================================================================
// Warm-up
// ============================================================================

#[tokio::test]
async fn test_warming_symbol_has_status_but_no_signal() {
    let service = SignalService::new(EngineConfig::default()).unwrap();
    for c in ascending(50, Timeframe::H1) {
        service.ingest(event("SOLUSDT", Timeframe::H1, c)).unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let status = service.status("SOLUSDT").unwrap();
    assert_eq!(status.lifecycle, SignalLifecycle::Uncomputed);
    assert_eq!(status.revision, 50);
    let hourly = status
        .progress
        .iter()
        .find(|p| p.timeframe == Timeframe::H1)
        .unwrap();
    assert_eq!((hourly.candles, hourly.required, hourly.ready), (50, 200, false));

    assert!(service.signal("SOLUSDT").is_none());
    assert!(service.ict_analysis("SOLUSDT").is_none());
    assert!(service.status("UNKNOWN").is_none());
}
