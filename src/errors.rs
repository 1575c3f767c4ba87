/*!
 * Error types for the qagen application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Per-item failures inside a generation batch.
///
/// Every variant ends up as a failed outcome record and is retried the same
/// way; the variants only exist so logs and summaries can tell them apart.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The upstream provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The call succeeded but produced nothing usable
    #[error("No questions were generated for this segment")]
    EmptyResult,

    /// The call did not finish within the per-item bound
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The output could not be saved
    #[error("Failed to save generated output: {0}")]
    Persistence(String),

    /// The batch was cancelled before the item was attempted
    #[error("Batch was cancelled before this segment was attempted")]
    Cancelled,

    /// Any other failure reported by a generator
    #[error("Generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::EmptyResult => "empty_result",
            Self::Timeout(_) => "timeout",
            Self::Persistence(_) => "persistence",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Errors that stop a batch before any item is attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The batch configuration or input failed validation
    #[error("Invalid batch configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// The generation backend could not be reached
    #[error("Generation backend unreachable: {0}")]
    Unreachable(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a single generation unit
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Error starting a batch
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
