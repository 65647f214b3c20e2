//! Reader configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Limits and tolerances applied while walking a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum number of simultaneously open LISTs
    pub max_list_depth: usize,
    /// LIST/JUNK headers crossed while looking for one data chunk
    pub max_chunk_hops: usize,
    /// Upper bound on the frame buffer allocation (bytes)
    pub max_frame_buffer: usize,
    /// Also accept "NNdc" chunks for the uncompressed video stream
    pub accept_compressed_chunk_tag: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_list_depth: 4,                 // hdrl > strl or movi > rec, with headroom
            max_chunk_hops: 4096,
            max_frame_buffer: 64 * 1024 * 1024, // 64 MiB, ~7K 24-bit frame
            accept_compressed_chunk_tag: true,
        }
    }
}

impl InputConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
