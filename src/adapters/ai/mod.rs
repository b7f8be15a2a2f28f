//! AI Provider Adapters.
//!
//! Implementations of the AIProvider port.
//!
//! ## Available Adapters
//!
//! - `OpenAIProvider` - OpenAI chat completions (streaming + structured output)
//! - `EchoAIProvider` - Offline provider that repeats the user's message
//! - `MockAIProvider` - Configurable mock for testing

mod echo_provider;
mod mock_provider;
mod openai_provider;

pub use echo_provider::EchoAIProvider;
pub use mock_provider::{MockAIProvider, MockError, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};
