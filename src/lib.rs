//! GloryPicks - multi-timeframe ICT signal engine and server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use config::{Config, ConfigError};
use services::SignalService;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub signals: Arc<SignalService>,
}

impl AppState {
    /// Build the state, validating the engine configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let signals = SignalService::new(config.engine.clone())?;
        Ok(Self {
            config: Arc::new(config),
            signals,
        })
    }
}

// Re-export commonly used types
pub use types::*;
