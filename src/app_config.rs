use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::generation::GenerationConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Provider selection and per-provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Batch execution settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Input splitting settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// SQLite database file, defaults to the user's data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Generation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
    /// LM Studio (OpenAI-compatible local server)
    LMStudio,
    /// Canned answers, no network
    Mock,
}

impl ProviderKind {
    /// Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
            Self::Mock => "Mock",
        }
    }

    /// Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::LMStudio => "lmstudio",
            Self::Mock => "mock",
        }
        .to_string()
    }

    /// Hosted providers refuse requests without a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Settings of one provider entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    /// Service URL
    #[serde(default)]
    pub endpoint: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Provider config with defaults for the given kind
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            provider_type: kind.to_lowercase_string(),
            model: default_model(kind),
            api_key: String::new(),
            endpoint: default_endpoint(kind),
            timeout_secs: match kind {
                ProviderKind::Anthropic => default_anthropic_timeout_secs(),
                _ => default_timeout_secs(),
            },
        }
    }
}

/// Provider selection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderSettings {
    /// Provider to use
    #[serde(default, rename = "type")]
    pub provider: ProviderKind,

    /// Configured providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Sampling temperature (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: [
                ProviderKind::Ollama,
                ProviderKind::OpenAI,
                ProviderKind::Anthropic,
                ProviderKind::LMStudio,
            ]
            .into_iter()
            .map(ProviderConfig::new)
            .collect(),
            temperature: default_temperature(),
        }
    }
}

impl ProviderSettings {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        let provider_str = kind.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable entry for `kind`, created with defaults if missing
    pub fn provider_config_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        let provider_str = kind.to_lowercase_string();
        match self
            .available_providers
            .iter()
            .position(|p| p.provider_type == provider_str)
        {
            Some(position) => &mut self.available_providers[position],
            None => {
                self.available_providers.push(ProviderConfig::new(kind));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(self.provider))
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

/// Prompt templates
///
/// `question_template` placeholders: `{text}` is the segment content,
/// `{number}` the number of questions to ask for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_question_template")]
    pub question_template: String,

    /// One question per this many characters of content
    #[serde(default = "default_questions_per_chars")]
    pub questions_per_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            question_template: default_question_template(),
            questions_per_chars: default_questions_per_chars(),
        }
    }
}

impl PromptConfig {
    /// Number of questions to request for a segment
    pub fn question_count(&self, content: &str) -> usize {
        let chars = content.chars().count();
        (chars / self.questions_per_chars.max(1)).max(1)
    }

    /// Fill the question template for one segment
    pub fn render(&self, content: &str) -> String {
        self.question_template
            .replace("{number}", &self.question_count(content).to_string())
            .replace("{text}", content)
    }
}

/// Input splitting settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Upper bound for a packed text segment
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: default_max_segment_chars(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_anthropic_timeout_secs() -> u64 {
    90
}

fn default_temperature() -> f32 {
    0.7
}

fn default_questions_per_chars() -> usize {
    240
}

fn default_max_segment_chars() -> usize {
    1500
}

fn default_endpoint(kind: ProviderKind) -> String {
    match kind {
        // Ollama's OpenAI-compatible API
        ProviderKind::Ollama => "http://localhost:11434/v1",
        ProviderKind::OpenAI => "https://api.openai.com/v1",
        ProviderKind::Anthropic => "https://api.anthropic.com",
        ProviderKind::LMStudio => "http://localhost:1234/v1",
        ProviderKind::Mock => "",
    }
    .to_string()
}

fn default_model(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::Ollama => "llama3",
        ProviderKind::OpenAI => "gpt-4o-mini",
        ProviderKind::Anthropic => "claude-3-haiku-20240307",
        // Placeholder; users should set the model loaded in LM Studio
        ProviderKind::LMStudio => "local-model",
        ProviderKind::Mock => "mock",
    }
    .to_string()
}

fn default_system_prompt() -> String {
    "You are an experienced teacher who writes clear, self-contained study questions. \
     Answer only with the questions, one per line."
        .to_string()
}

fn default_question_template() -> String {
    "Write {number} question(s) that test understanding of the following text. \
     Return them as a JSON array of strings.\n\nText:\n{text}"
        .to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let kind = self.provider.provider;
        if kind.requires_api_key() && self.provider.get_api_key().is_empty() {
            return Err(anyhow!("API key is required for {} provider", kind.display_name()));
        }

        if self.generation.concurrency_limit == 0 {
            return Err(anyhow!("Concurrency limit must be at least 1"));
        }

        if !self.prompt.question_template.contains("{text}") {
            return Err(anyhow!("Question template must contain the {{text}} placeholder"));
        }

        if self.segmentation.max_segment_chars == 0 {
            return Err(anyhow!("Maximum segment size must be greater than zero"));
        }

        Ok(())
    }
}
