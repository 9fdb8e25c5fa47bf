//! Coding Coach server.
//!
//! # API Endpoints
//!
//! - `POST /analyze` - Fetch and aggregate practice history for a set of handles
//! - `POST /normalize` - Aggregate a supplied activity payload
//! - `GET /metrics` - Request counters
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use coding_coach::api::{AppState, analyze, get_metrics, health_check, normalize_payload};
use coding_coach::config::Config;
use coding_coach::metrics::RequestMetrics;
use coding_coach::orchestrator::FetchOrchestrator;
use coding_coach::storage::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("coding_coach=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        db_url = %config.database_url,
        model = %config.gemini_model,
        "Starting Coding Coach server"
    );

    let sessions = SessionStore::new(&config.database_url).await?;
    info!("Database initialized");

    let metrics = Arc::new(RequestMetrics::new());
    let orchestrator = FetchOrchestrator::from_config(&config, metrics.clone())?;

    let state = AppState {
        orchestrator,
        sessions,
        metrics,
    };

    let app = Router::new()
        .route("/analyze", post(analyze))
        .route("/normalize", post(normalize_payload))
        .route("/metrics", get(get_metrics))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Coding Coach is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
