//! Signal API endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::types::{IctAnalysis, Signal, SignalStatus};
use crate::AppState;

/// Query parameters for the signal endpoint.
#[derive(Debug, Deserialize)]
pub struct SignalQuery {
    pub symbol: Option<String>,
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signal", get(get_signal))
        .route("/signal/:symbol/ict", get(get_ict))
        .route("/signal/:symbol/status", get(get_status))
}

/// Latest aggregated signal for a symbol.
async fn get_signal(
    State(state): State<AppState>,
    Query(query): Query<SignalQuery>,
) -> Result<Json<Signal>> {
    let symbol = query
        .symbol
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing symbol query parameter".to_string()))?;

    match state.signals.signal(&symbol) {
        Some(signal) => Ok(Json(signal.as_ref().clone())),
        None => Err(not_ready(&state, &symbol)),
    }
}

/// Full ICT event set for a symbol.
async fn get_ict(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<IctAnalysis>> {
    match state.signals.ict_analysis(&symbol) {
        Some(ict) => Ok(Json(ict.as_ref().clone())),
        None => Err(not_ready(&state, &symbol)),
    }
}

/// Lifecycle and warm-up progress.
async fn get_status(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<SignalStatus>> {
    state
        .signals
        .status(&symbol)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No candles for {}", symbol)))
}

/// Distinguish "still warming up" from "never seen".
fn not_ready(state: &AppState, symbol: &str) -> AppError {
    match state.signals.status(symbol) {
        Some(status) => AppError::InsufficientData {
            symbol: status.symbol,
            progress: status.progress,
        },
        None => AppError::NotFound(format!("No signal available for {}", symbol)),
    }
}
