//! Composition root: configuration → providers → services → router.

use std::sync::Arc;

use axum::Router;
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::adapters::ai::{EchoAIProvider, OpenAIConfig, OpenAIProvider};
use crate::adapters::http::{cors_layer, router, RpcAppState, RpcLimits};
use crate::adapters::rpc::{procedures, Services};
use crate::application::{
    ConversationService, ConversationSettings, FooService, FooSettings, InventoryService,
};
use crate::config::{AiProvider, AppConfig, ConfigError, ValidationError};
use crate::ports::{AIError, AIProvider};

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("AI provider setup failed: {0}")]
    Provider(#[from] AIError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A fully wired application.
pub struct App {
    pub router: Router,
    pub services: Services,
}

/// Wires the application, creating the configured completion provider.
pub fn build_app(config: &AppConfig) -> Result<App, StartupError> {
    let provider = completion_provider(config)?;
    Ok(build_app_with_provider(config, provider))
}

/// Wires the application around an existing completion provider.
pub fn build_app_with_provider(config: &AppConfig, provider: Arc<dyn AIProvider>) -> App {
    let conversation_settings = ConversationSettings {
        suggestions_enabled: config.ai.suggestions_enabled,
        temperature: Some(config.ai.temperature),
        max_tokens: Some(config.ai.max_tokens),
        chunk_buffer: config.rpc.chunk_buffer,
        ..ConversationSettings::default()
    };
    let foo_settings = FooSettings {
        min_jitter: config.demo.min_jitter(),
        max_jitter: config.demo.max_jitter(),
        word_delay: config.demo.word_delay(),
    };

    let services = Services {
        inventory: Arc::new(InventoryService::seeded()),
        conversations: Arc::new(ConversationService::new(provider, conversation_settings)),
        foo: Arc::new(FooService::new(foo_settings)),
    };

    let state = RpcAppState::new(procedures(&services)).with_limits(RpcLimits {
        max_line_bytes: config.rpc.max_line_bytes,
        output_buffer: config.rpc.output_buffer,
    });
    let router = router(
        state,
        &config.rpc.path,
        cors_layer(&config.server.cors_origins_list()),
    );

    App { router, services }
}

fn completion_provider(config: &AppConfig) -> Result<Arc<dyn AIProvider>, StartupError> {
    match config.ai.provider {
        AiProvider::OpenAI => {
            let key = config
                .ai
                .openai_api_key
                .as_ref()
                .ok_or(ConfigError::ValidationFailed(
                    ValidationError::MissingRequired("OPENAI_API_KEY"),
                ))?;
            let openai = OpenAIConfig::new(key.expose_secret().as_str())
                .with_model(&config.ai.model)
                .with_base_url(&config.ai.base_url)
                .with_timeout(config.ai.timeout())
                .with_max_retries(config.ai.max_retries);

            tracing::info!(model = %config.ai.model, "using OpenAI completion provider");
            Ok(Arc::new(OpenAIProvider::new(openai)?))
        }
        AiProvider::Echo => {
            tracing::info!("using echo completion provider");
            Ok(Arc::new(
                EchoAIProvider::new().with_word_delay(config.demo.word_delay()),
            ))
        }
    }
}

/// Validates the configuration, binds and serves until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<(), StartupError> {
    config.validate().map_err(ConfigError::from)?;
    let app = build_app(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        addr = %addr,
        rpc_path = %config.rpc.path,
        environment = ?config.server.environment,
        "cool-beans listening"
    );

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}

/// Serves `router` on an already-bound listener until the task is dropped.
pub async fn serve_on(listener: TcpListener, router: Router) -> Result<(), StartupError> {
    axum::serve(listener, router).await.map_err(StartupError::Serve)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
