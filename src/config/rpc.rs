//! RPC endpoint configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Path of the NDJSON endpoint
    #[serde(default = "default_path")]
    pub path: String,

    /// Longest accepted request line in bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Response lines buffered per connection
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,

    /// Reply chunks buffered per `sendUserMessage` call
    #[serde(default = "default_chunk_buffer")]
    pub chunk_buffer: usize,
}

impl RpcConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidRpcPath);
        }
        if self.max_line_bytes == 0 {
            return Err(ValidationError::ZeroLimit("rpc.max_line_bytes"));
        }
        if self.output_buffer == 0 {
            return Err(ValidationError::ZeroLimit("rpc.output_buffer"));
        }
        if self.chunk_buffer == 0 {
            return Err(ValidationError::ZeroLimit("rpc.chunk_buffer"));
        }
        Ok(())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_line_bytes: default_max_line_bytes(),
            output_buffer: default_output_buffer(),
            chunk_buffer: default_chunk_buffer(),
        }
    }
}

fn default_path() -> String {
    "/rpc".to_string()
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

fn default_output_buffer() -> usize {
    64
}

fn default_chunk_buffer() -> usize {
    32
}
