/*!
 * Tests for application configuration functionality
 */

use qagen::app_config::{Config, LogLevel, PromptConfig, ProviderConfig, ProviderKind};

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.provider.provider, ProviderKind::Ollama);
    assert_eq!(config.generation.concurrency_limit, 5);
    assert_eq!(config.generation.max_retries, 2);
    assert_eq!(config.generation.retry_delay_ms, 2000);
    assert!(config.generation.enable_retry);
    assert_eq!(config.prompt.questions_per_chars, 240);
    assert_eq!(config.segmentation.max_segment_chars, 1500);
    assert!(config.database_path.is_none());
    assert_eq!(config.log_level, LogLevel::Info);

    let ollama = config
        .provider
        .get_provider_config(ProviderKind::Ollama)
        .expect("Ollama provider config should exist");
    assert_eq!(ollama.endpoint, "http://localhost:11434/v1");
}

#[test]
fn test_config_validation_withHostedProviderWithoutKey_shouldFail() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.provider.provider = ProviderKind::OpenAI;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("API key is required"));

    config.provider.provider_config_mut(ProviderKind::OpenAI).api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_withTemplateMissingText_shouldFail() {
    let mut config = Config::default();
    config.prompt.question_template = "Ask {number} questions".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_withZeroConcurrency_shouldFail() {
    let mut config = Config::default();
    config.generation.concurrency_limit = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{
        "provider": { "type": "anthropic", "available_providers": [
            { "type": "anthropic", "api_key": "key", "model": "claude-3-5-haiku-latest" }
        ] },
        "generation": { "concurrency_limit": 8 }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.provider.provider, ProviderKind::Anthropic);
    assert_eq!(config.provider.get_model(), "claude-3-5-haiku-latest");
    assert_eq!(config.provider.get_endpoint(), "https://api.anthropic.com");
    assert_eq!(config.generation.concurrency_limit, 8);
    assert_eq!(config.generation.max_retries, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_serialize_shouldRoundTrip() {
    let config = Config::default();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let parsed: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.generation, config.generation);
    assert_eq!(parsed.prompt, config.prompt);
    assert_eq!(parsed.provider.available_providers, config.provider.available_providers);
}

#[test]
fn test_providerConfigMut_withMissingEntry_shouldCreateDefaults() {
    let mut config = Config::default();
    config.provider.available_providers.clear();

    config.provider.provider_config_mut(ProviderKind::LMStudio).model = "qwen".to_string();
    config.provider.provider = ProviderKind::LMStudio;

    assert_eq!(config.provider.get_model(), "qwen");
    assert_eq!(config.provider.get_endpoint(), "http://localhost:1234/v1");
    assert_eq!(
        config.provider.get_active_provider_config(),
        Some(&ProviderConfig {
            provider_type: "lmstudio".to_string(),
            model: "qwen".to_string(),
            api_key: String::new(),
            endpoint: "http://localhost:1234/v1".to_string(),
            timeout_secs: 60,
        })
    );
}

#[test]
fn test_promptConfig_questionCount_shouldScaleWithLength() {
    let prompt = PromptConfig::default();
    assert_eq!(prompt.question_count(""), 1);
    assert_eq!(prompt.question_count(&"a".repeat(239)), 1);
    assert_eq!(prompt.question_count(&"a".repeat(480)), 2);
    assert_eq!(prompt.question_count(&"a".repeat(1500)), 6);
}

#[test]
fn test_promptConfig_defaultRender_shouldEmbedContent() {
    let prompt = PromptConfig::default();
    let rendered = prompt.render("Borrowing rules in Rust.");
    assert!(rendered.contains("Borrowing rules in Rust."));
    assert!(rendered.contains("Write 1 question(s)"));
    assert!(!rendered.contains("{text}"));
}
