//! Model worker thread.
//!
//! Owns the llama.cpp backend and model for the life of the process; both
//! wrap raw pointers that are not `Send`, so they never leave this thread.
//! The model is loaded exactly once. Each generate command gets a fresh
//! context (fresh KV cache), one evaluation pass over the prompt, and a
//! fixed-length sampling loop, so requests stay independent and stateless.

use std::num::NonZeroU32;
use std::sync::Arc;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::Config;
use crate::inference::engine::{
    collect_pieces, EngineError, Generation, WorkerCommand, GENERATED_TOKENS,
};

// Fixed sampling chain. Callers cannot tune these.
const TOP_K: i32 = 40;
const TOP_P: f32 = 0.95;
const TEMPERATURE: f32 = 0.7;

/// Worker thread entry point: initialize the backend, load the model,
/// report readiness, then serve generate commands until the channel closes.
pub(crate) fn worker_main(
    config: Arc<Config>,
    ready_tx: oneshot::Sender<Result<(), EngineError>>,
    mut command_rx: mpsc::Receiver<WorkerCommand>,
) {
    let (backend, model) = match load_model(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    while let Some(command) = command_rx.blocking_recv() {
        match command {
            WorkerCommand::Generate { prompt, reply } => {
                let result = run_generation(&backend, &model, &config, &prompt);
                let _ = reply.send(result);
            }
        }
    }

    debug!("Command channel closed, model worker exiting");
}

/// Initialize the llama.cpp backend and load the model from the configured
/// path.
fn load_model(config: &Config) -> Result<(LlamaBackend, LlamaModel), EngineError> {
    let backend = LlamaBackend::init().map_err(|e| EngineError::BackendInit(e.to_string()))?;

    let model_params =
        LlamaModelParams::default().with_n_gpu_layers(config.model.n_gpu_layers);

    let model = LlamaModel::load_from_file(&backend, &config.model.model_path, &model_params)
        .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

    info!(
        model = %config.model.model_path.display(),
        vocab_size = model.n_vocab(),
        embedding_dim = model.n_embd(),
        context_length = model.n_ctx_train(),
        params = model.n_params() as u64,
        "Model loaded"
    );

    Ok((backend, model))
}

/// Run one generation: fresh context, one evaluation pass over the prompt,
/// then exactly [`GENERATED_TOKENS`] sampled tokens.
fn run_generation(
    backend: &LlamaBackend,
    model: &LlamaModel,
    config: &Config,
    prompt: &str,
) -> Result<Generation, EngineError> {
    // The prompt is used verbatim (no chat template), with an implicit
    // beginning-of-sequence marker.
    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| EngineError::Tokenize(e.to_string()))?;
    let prompt_tokens = tokens.len();

    // The whole prompt is evaluated in a single batch, so the batch budget
    // has to cover it.
    let n_batch = (prompt_tokens as u32).max(config.model.batch_size);
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(config.model.context_size))
        .with_n_batch(n_batch);

    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| EngineError::ContextCreate(e.to_string()))?;

    let mut batch = LlamaBatch::new(prompt_tokens.max(1), 1);
    for (i, token) in tokens.iter().enumerate() {
        let is_last = i == prompt_tokens - 1;
        batch
            .add(*token, i as i32, &[0], is_last)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
    }

    ctx.decode(&mut batch)
        .map_err(|e| EngineError::Decode(e.to_string()))?;

    debug!(prompt_tokens, n_batch, "Prompt evaluated");

    let mut sampler = LlamaSampler::chain_simple([
        LlamaSampler::top_k(TOP_K),
        LlamaSampler::top_p(TOP_P, 1),
        LlamaSampler::temp(TEMPERATURE),
        LlamaSampler::dist(entropy_seed()),
    ]);

    let mut pos = prompt_tokens as i32;

    let bytes = collect_pieces(GENERATED_TOKENS, || {
        let token = sampler.sample(&ctx, batch.n_tokens() - 1);
        sampler.accept(token);

        let piece = model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        batch.clear();
        batch
            .add(token, pos, &[0], true)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        ctx.decode(&mut batch)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        pos += 1;

        Ok(piece)
    })?;

    // Pieces may split multi-byte characters; convert the buffer once.
    Ok(Generation {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        prompt_tokens,
        completion_tokens: GENERATED_TOKENS,
    })
}

/// Per-request sampler seed drawn from system entropy. Two requests with
/// the same prompt are deliberately not guaranteed the same response.
fn entropy_seed() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
