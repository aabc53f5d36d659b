//! GGUF header validation.
//!
//! The model file is checked before the backend touches it, so a missing or
//! corrupt file fails startup with a readable diagnostic instead of an
//! opaque loader error deep inside llama.cpp.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

/// GGUF magic bytes (little-endian: "GGUF").
pub const GGUF_MAGIC: u32 = 0x46554747;

/// Errors from model file validation.
#[derive(Debug, Error)]
pub enum GgufError {
    #[error("Failed to open model file: {0}")]
    FileOpen(#[from] std::io::Error),

    #[error("Not a GGUF file: magic bytes mismatch (expected 0x{:08X}, got 0x{:08X})", GGUF_MAGIC, .0)]
    InvalidMagic(u32),

    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),

    #[error("File too small to be valid GGUF")]
    FileTooSmall,
}

/// Counts extracted from a GGUF file header.
#[derive(Debug, Clone)]
pub struct GgufMetadata {
    /// GGUF format version.
    pub version: u32,

    /// Number of tensors in the model.
    pub tensor_count: u64,

    /// Number of metadata key-value pairs.
    pub metadata_kv_count: u64,
}

/// Validate that a file starts with a GGUF header and extract its counts.
pub fn validate_gguf<P: AsRef<Path>>(path: P) -> Result<GgufMetadata, GgufError> {
    let mut file = File::open(path)?;

    // Minimum header: magic(4) + version(4) + tensor_count(8) + kv_count(8).
    let file_size = file.seek(SeekFrom::End(0))?;
    if file_size < 24 {
        return Err(GgufError::FileTooSmall);
    }
    file.seek(SeekFrom::Start(0))?;

    let mut magic_bytes = [0u8; 4];
    file.read_exact(&mut magic_bytes)?;
    let magic = u32::from_le_bytes(magic_bytes);
    if magic != GGUF_MAGIC {
        return Err(GgufError::InvalidMagic(magic));
    }

    let mut version_bytes = [0u8; 4];
    file.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if !(2..=3).contains(&version) {
        return Err(GgufError::UnsupportedVersion(version));
    }

    let mut tensor_count_bytes = [0u8; 8];
    file.read_exact(&mut tensor_count_bytes)?;
    let tensor_count = u64::from_le_bytes(tensor_count_bytes);

    let mut metadata_kv_count_bytes = [0u8; 8];
    file.read_exact(&mut metadata_kv_count_bytes)?;
    let metadata_kv_count = u64::from_le_bytes(metadata_kv_count_bytes);

    Ok(GgufMetadata {
        version,
        tensor_count,
        metadata_kv_count,
    })
}
