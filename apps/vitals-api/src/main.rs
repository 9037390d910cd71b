//! Vitals API Server
//!
//! Receives the Web Vitals payloads posted by the portfolio site and serves
//! them back to operators:
//!
//! - Ingestion (`POST /api/analytics/web-vitals`)
//! - Raw metric queries, per-metric aggregates and the overall score
//! - JSON and CSV exports
//!
//! Metrics live in a bounded store, optionally mirrored to a data directory so
//! a restart keeps the most recent history.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vitals_core::MonitorConfig;

mod api;
mod error;
mod state;
#[cfg(test)]
mod tests;

use api::{
    handle_clear, handle_export, handle_health, handle_ingest, handle_list_metrics, handle_summary,
};
use state::AppState;

/// Command-line arguments for the vitals server
#[derive(Parser, Debug)]
#[command(name = "vitals-api")]
#[command(about = "Web Vitals analytics endpoint")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Monitor configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of metrics kept, overrides the config file
    #[arg(long)]
    capacity: Option<usize>,

    /// Directory the metric store is persisted to; in-memory when omitted
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the router with all routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/analytics/web-vitals", post(handle_ingest))
        .route("/api/metrics", get(handle_list_metrics).delete(handle_clear))
        .route("/api/metrics/summary", get(handle_summary))
        .route("/api/metrics/export", get(handle_export))
        .with_state(state)
}

fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vitals API on {}:{}", args.host, args.port);

    let config = load_config(&args)?;
    let state = AppState::new(&config, args.data_dir.as_deref())?;

    // Configure CORS; the reporter posts cross-origin from the site
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Store capacity: {} metrics", config.capacity);

    axum::serve(listener, app).await?;

    Ok(())
}
