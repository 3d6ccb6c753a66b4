use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinq_core::{CoreConfig, QueryExecutor};

/// Main entry point for the clinq server
///
/// Resolves configuration once, builds the query executor and serves the REST API.
///
/// # Environment Variables
/// - `CLINQ_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `FHIR_SERVER_TYPE`: initial data source, `mock` or `hapi` (default: "mock")
/// - `FHIR_BASE_URL`: external FHIR server base URL
/// - `FHIR_TIMEOUT_MS`: external request timeout in milliseconds
///
/// The remaining `CLINQ_*` variables are documented on [`CoreConfig`].
///
/// # Errors
/// Returns an error if configuration is invalid, the vocabulary or mock dataset cannot be
/// loaded, or the server cannot bind or fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinq=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINQ_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());

    let cfg = CoreConfig::from_env()?;
    let executor = Arc::new(QueryExecutor::from_config(&cfg)?);

    tracing::info!("++ Starting clinq REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, api_rest::router(executor)).await?;

    Ok(())
}
