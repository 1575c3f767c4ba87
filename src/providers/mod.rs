/*!
 * Provider implementations for different LLM services.
 *
 * This module contains client implementations for the supported providers:
 * - OpenAI-compatible chat completions (OpenAI, LM Studio, Ollama)
 * - Anthropic messages API
 * - A mock provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Config, ProviderKind};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod openai;

/// Text produced by one completion call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// The generated text
    pub text: String,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: Option<u64>,
    /// Completion tokens reported by the provider
    pub completion_tokens: Option<u64>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the question generator.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Display name of the provider
    fn name(&self) -> &str;

    /// Complete a prompt using this provider
    ///
    /// # Arguments
    /// * `system` - The system prompt
    /// * `prompt` - The user prompt
    ///
    /// # Returns
    /// * `Result<Completion, ProviderError>` - The generated text or an error
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion, ProviderError>;

    /// Test the connection to the provider
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Build the provider selected in the configuration
pub fn from_config(config: &Config) -> Arc<dyn Provider> {
    let settings = &config.provider;
    let timeout = Duration::from_secs(settings.get_timeout_secs());
    match settings.provider {
        ProviderKind::OpenAI | ProviderKind::LMStudio | ProviderKind::Ollama => Arc::new(
            openai::OpenAI::new(settings.get_api_key(), settings.get_endpoint(), settings.get_model())
                .with_timeout(timeout)
                .with_temperature(settings.temperature),
        ),
        ProviderKind::Anthropic => Arc::new(
            anthropic::Anthropic::new(settings.get_api_key(), settings.get_endpoint(), settings.get_model())
                .with_timeout(timeout)
                .with_temperature(settings.temperature),
        ),
        ProviderKind::Mock => Arc::new(mock::MockProvider::working()),
    }
}

/// Map a reqwest failure onto the provider error taxonomy
pub(crate) fn map_request_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", provider, error))
    } else if error.is_timeout() {
        ProviderError::RequestFailed(format!("{} request timed out: {}", provider, error))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", provider, error))
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy
pub(crate) fn map_status_error(status: u16, message: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}
