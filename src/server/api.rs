//! Query endpoint.
//!
//! Implements the single route the service exposes:
//! - POST /api/zapytanie
//!
//! The request body is the prompt, raw bytes, no envelope. The response is
//! the generated text as plain text. Every completed exchange is appended
//! to the request log before the response is sent.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::inference::Generator;
use crate::request_log::RequestLog;

/// Application state shared across handlers.
pub struct AppState {
    pub generator: Arc<dyn Generator>,
    pub request_log: RequestLog,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/zapytanie", post(zapytanie))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Route Handler ─────────────────────────────────────────────────────────

async fn zapytanie(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<String, StatusCode> {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    // The body is taken as-is. Non-UTF-8 bytes are replaced rather than
    // rejected; the endpoint has no notion of a malformed prompt.
    let prompt = String::from_utf8_lossy(&body).into_owned();

    info!(
        request_id = request_id,
        prompt_bytes = body.len(),
        "Query received"
    );

    let generation = state.generator.generate(&prompt).await.map_err(|e| {
        error!(request_id = request_id, error = %e, "Generation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // A log write failure does not fail the request.
    if let Err(e) = state.request_log.append(&prompt, &generation.text).await {
        warn!(request_id = request_id, error = %e, "Failed to append to request log");
    }

    info!(
        request_id = request_id,
        prompt_tokens = generation.prompt_tokens,
        completion_tokens = generation.completion_tokens,
        duration_ms = started.elapsed().as_millis() as u64,
        "Query answered"
    );

    Ok(generation.text)
}
