use glorypicks::{api, config::Config, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glorypicks=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load and validate configuration; an invalid setup never starts.
    let config = Config::from_env()?;
    config.engine.validate()?;

    let weights: Vec<String> = config
        .engine
        .timeframes
        .iter()
        .map(|w| format!("{}:{}", w.timeframe, w.weight))
        .collect();
    info!(
        "Starting GloryPicks on {}:{} (timeframes {}, window {}, ICT timeframe {})",
        config.host,
        config.port,
        weights.join(","),
        config.engine.window_capacity,
        config.engine.ict_timeframe
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;
    let app = api::app(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("GloryPicks server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
