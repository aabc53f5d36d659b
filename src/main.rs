//! response-service: an HTTP front-end for a local llama.cpp model.
//!
//! Loads a quantized model once at startup, then answers
//! `POST /api/zapytanie` by forwarding the raw request body to the model
//! and returning the generated text. Exchanges are appended to a shared
//! request log.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use response_service::config::{Cli, Config};
use response_service::inference::engine::InferenceEngine;
use response_service::request_log::RequestLog;
use response_service::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "response_service=debug,tower_http=debug"
    } else {
        "response_service=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("response-service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;
    let config = Arc::new(config);

    info!(
        model = %config.model.model_path.display(),
        context_size = config.model.context_size,
        request_log = %config.request_log.path.display(),
        "Configuration loaded"
    );

    // Load the model up front. A missing or unreadable model file is a
    // startup failure, not a silent per-request one.
    let engine = InferenceEngine::start(config.clone()).await?;

    // Open the request log and start its writer task.
    let request_log = RequestLog::open(&config.request_log.path).await?;

    // Build application state.
    let state = Arc::new(AppState {
        generator: Arc::new(engine),
        request_log,
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli
        .listen
        .unwrap_or_else(|| config.server.listen.clone());
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
