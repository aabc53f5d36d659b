//! Runtime configuration for response-service.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. Every field has a default, and the defaults match the
//! values the service has always shipped with, so running with no arguments
//! and no config file needs no setup.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "response-service",
    about = "HTTP text-generation service backed by a local llama.cpp model"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Model settings.
    pub model: ModelConfig,

    /// Request log settings.
    pub request_log: RequestLogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            request_log: RequestLogConfig::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Model-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the quantized GGUF model file.
    pub model_path: PathBuf,

    /// Context size in tokens (0 = model default).
    pub context_size: u32,

    /// Batch size for prompt processing. Prompts longer than this are
    /// evaluated with a batch widened to fit them.
    pub batch_size: u32,

    /// Number of layers to offload to the GPU (0 = CPU only).
    pub n_gpu_layers: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/llama-3.1-1b-q4.bin"),
            context_size: 4096,
            batch_size: 512,
            n_gpu_layers: 0,
        }
    }
}

/// Request log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Path of the append-only exchange log.
    pub path: PathBuf,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("requests.log"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields fall back to
    /// their defaults; a missing file falls back to the full defaults.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
