//! Inference engine front-end.
//!
//! llama.cpp handles (`LlamaBackend`, `LlamaModel`, `LlamaContext`) contain
//! raw pointers that are not `Send`, so the model is owned by a dedicated
//! worker thread for the life of the process. This module is the async side
//! of that split: requests are queued to the worker over a bounded channel
//! and answered over oneshot replies, serializing all inference through the
//! single resident model handle.

use std::sync::Arc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::Config;
use crate::inference::gguf::{self, GgufError};
use crate::inference::llama;

/// Number of tokens sampled per request. Generation always runs the full
/// count; there is no end-of-sequence stop.
pub const GENERATED_TOKENS: usize = 50;

/// Requests that may queue on the worker before senders are made to wait.
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Errors that can occur while starting the engine or generating text.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    #[error("Model validation failed: {0}")]
    ModelValidation(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to create context: {0}")]
    ContextCreate(String),

    #[error("Tokenization failed: {0}")]
    Tokenize(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Model worker is gone")]
    WorkerGone,
}

impl From<GgufError> for EngineError {
    fn from(e: GgufError) -> Self {
        EngineError::ModelValidation(e.to_string())
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Concatenated decoded token pieces.
    pub text: String,

    /// Tokens in the evaluated prompt, including the BOS marker.
    pub prompt_tokens: usize,

    /// Tokens sampled; always [`GENERATED_TOKENS`].
    pub completion_tokens: usize,
}

/// Anything that can turn a prompt into generated text.
///
/// The HTTP layer depends on this trait rather than on the llama worker
/// directly so handlers can be exercised with a scripted implementation.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<Generation, EngineError>;
}

/// Commands sent to the worker thread.
pub(crate) enum WorkerCommand {
    Generate {
        prompt: String,
        reply: oneshot::Sender<Result<Generation, EngineError>>,
    },
}

/// Async handle to the model worker thread.
pub struct InferenceEngine {
    command_tx: Option<mpsc::Sender<WorkerCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl InferenceEngine {
    /// Spawn the worker thread, load the model, and wait until it is ready.
    ///
    /// The model file's GGUF header is validated first so a missing or
    /// corrupt file fails with a useful diagnostic. Nothing is retried: any
    /// failure here is a startup failure.
    pub async fn start(config: Arc<Config>) -> Result<Self, EngineError> {
        let metadata = gguf::validate_gguf(&config.model.model_path)?;
        debug!(
            version = metadata.version,
            tensors = metadata.tensor_count,
            "GGUF header validated"
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = std::thread::Builder::new()
            .name("llama-worker".into())
            .spawn(move || llama::worker_main(config, ready_tx, command_rx))
            .map_err(|e| EngineError::BackendInit(e.to_string()))?;

        ready_rx.await.map_err(|_| EngineError::WorkerGone)??;

        info!("Inference worker ready");
        Ok(Self {
            command_tx: Some(command_tx),
            worker: Some(worker),
        })
    }
}

#[async_trait]
impl Generator for InferenceEngine {
    async fn generate(&self, prompt: &str) -> Result<Generation, EngineError> {
        let command_tx = self.command_tx.as_ref().ok_or(EngineError::WorkerGone)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        command_tx
            .send(WorkerCommand::Generate {
                prompt: prompt.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::WorkerGone)?;

        reply_rx.await.map_err(|_| EngineError::WorkerGone)?
    }
}

impl Drop for InferenceEngine {
    fn drop(&mut self) {
        // Closing the command channel ends the worker loop.
        self.command_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Collect exactly `count` token pieces from `next_piece`, concatenating
/// their bytes. The loop always runs the full count; a model-defined end
/// marker does not stop it. An error aborts the generation.
pub(crate) fn collect_pieces(
    count: usize,
    mut next_piece: impl FnMut() -> Result<Vec<u8>, EngineError>,
) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    for _ in 0..count {
        buf.extend_from_slice(&next_piece()?);
    }
    Ok(buf)
}
