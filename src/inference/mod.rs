//! LLM inference engine.
//!
//! - [`engine`]: Generator trait and the async front-end to the model worker
//! - [`llama`]: the worker thread that owns the llama.cpp backend and model
//! - [`gguf`]: GGUF header validation

pub mod engine;
pub mod gguf;
pub mod llama;

pub use engine::{EngineError, Generation, Generator, InferenceEngine, GENERATED_TOKENS};
pub use gguf::{validate_gguf, GgufError, GgufMetadata};
