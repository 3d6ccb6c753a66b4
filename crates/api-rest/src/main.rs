//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development when only the HTTP surface is needed. The workspace's main
//! `clinq-run` binary serves the same router.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinq_core::{CoreConfig, QueryExecutor};

/// Starts the REST API on `CLINQ_REST_ADDR` (default: 0.0.0.0:8000).
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the core configuration is invalid or the vocabulary/mock dataset cannot be loaded,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinq_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINQ_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());

    let cfg = CoreConfig::from_env()?;
    let executor = Arc::new(QueryExecutor::from_config(&cfg)?);

    tracing::info!("-- Starting clinq REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::router(executor)).await?;

    Ok(())
}
