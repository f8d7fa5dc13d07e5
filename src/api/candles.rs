//! Candle ingestion endpoints for the data feed.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::services::signals::BatchResult;
use crate::services::CandleStore;
use crate::types::CandleEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub symbol: String,
    pub revision: u64,
}

/// Create the candles router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/candles", post(post_candle))
        .route("/candles/batch", post(post_batch))
}

/// Ingest one closed candle.
async fn post_candle(
    State(state): State<AppState>,
    Json(event): Json<CandleEvent>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let symbol = CandleStore::normalize_symbol(&event.symbol)?;
    let revision = state.signals.ingest(event)?;
    Ok((StatusCode::ACCEPTED, Json(IngestResponse { symbol, revision })))
}

/// Ingest many closed candles; each one is accepted or rejected on its own.
async fn post_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<CandleEvent>>,
) -> (StatusCode, Json<BatchResult>) {
    let now = chrono::Utc::now().timestamp_millis();
    let result = state.signals.ingest_batch(events, now);
    (StatusCode::ACCEPTED, Json(result))
}
