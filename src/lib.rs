//! response-service: an HTTP front-end for a local llama.cpp model.
//!
//! A single POST endpoint takes the raw request body as a prompt, forwards
//! it to a model loaded once at startup, and returns the generated text as
//! plain text. Every exchange is recorded in an append-only request log.

pub mod config;
pub mod inference;
pub mod request_log;
pub mod server;
