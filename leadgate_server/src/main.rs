//! Leadgate Server - Request admission and fraud gate
//!
//! This server handles:
//! - Sliding-window rate limiting with lockouts for every request
//! - Affiliate click-fraud detection and the suspicion registry
//! - Attack reports from peer systems
//! - Operator inspection and overrides over the admin API

mod abuse;
mod config;
mod gate;
mod notify;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadgate_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    let limits = &config.gate.rate_limit;
    tracing::info!("Starting Leadgate server on {}:{}", config.host, config.port);
    tracing::info!(
        "Rate limit: {} requests per {}s, lockout {}s",
        limits.max_requests,
        limits.window.as_secs(),
        limits.lockout.as_secs()
    );
    tracing::info!(
        "Click fraud: {} clicks per {}s, score threshold {}",
        config.gate.clicks.threshold,
        config.gate.clicks.window.as_secs(),
        config.gate.clicks.score_threshold
    );
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin API disabled");
    }
    if config.trust_forwarded_for {
        tracing::warn!("Trusting X-Forwarded-For, only run behind a trusted proxy");
    }

    // Create app state
    let notifier = notify::from_config(config.alert_webhook_url.as_deref());
    let state = routes::AppState::new(config.clone(), notifier);

    // Sweep expired gate state in the background
    tokio::spawn(gate::run_sweeper(
        Arc::clone(&state.gate),
        config.cleanup_interval,
    ));

    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
