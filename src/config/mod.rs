//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `COOL_BEANS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use cool_beans::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}:{}", config.server.host, config.server.port);
//! ```

mod ai;
mod demo;
mod error;
mod rpc;
mod server;

pub use ai::{AiConfig, AiProvider};
pub use demo::DemoConfig;
pub use error::{ConfigError, ValidationError};
pub use rpc::RpcConfig;
pub use server::{Environment, ServerConfig};

use secrecy::Secret;
use serde::Deserialize;

/// Variable read when `COOL_BEANS__AI__OPENAI_API_KEY` is not set.
const OPENAI_API_KEY_FALLBACK: &str = "OPENAI_API_KEY";

/// Root application configuration
///
/// Every section has defaults, so an empty environment loads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// RPC endpoint limits
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Demo stream pacing
    #[serde(default)]
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `COOL_BEANS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Falls back to `OPENAI_API_KEY` for the OpenAI key
    ///
    /// # Environment Variable Format
    ///
    /// - `COOL_BEANS__SERVER__PORT=8000` -> `server.port = 8000`
    /// - `COOL_BEANS__AI__PROVIDER=echo` -> `ai.provider = echo`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut config: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("COOL_BEANS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        if config.ai.openai_api_key.is_none() {
            config.ai.openai_api_key = std::env::var(OPENAI_API_KEY_FALLBACK)
                .ok()
                .filter(|key| !key.is_empty())
                .map(Secret::new);
        }

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid,
    /// including a missing API key for the OpenAI provider.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.ai.validate()?;
        self.rpc.validate()?;
        self.demo.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
