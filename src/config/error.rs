//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid AI request timeout")]
    InvalidTimeout,

    #[error("Invalid AI base URL")]
    InvalidBaseUrl,

    #[error("RPC path must start with '/'")]
    InvalidRpcPath,

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("Demo jitter minimum exceeds maximum")]
    InvalidJitterRange,
}
