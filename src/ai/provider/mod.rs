//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for structured LLM output generation.
//! Providers perform one request per call; retry and requeue decisions
//! belong to the sync engine, driven by the `ErrorCategory` of the failure.

mod claude_code;
mod openai;

pub use claude_code::ClaudeCodeProvider;
pub use openai::OpenAiProvider;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::effort::Effort;
use crate::config::LlmConfig;
use crate::types::{Result, SyncError};

// =============================================================================
// LLM Response
// =============================================================================

#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated content (structured JSON)
    pub content: Value,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
    /// Wall-clock time of the request
    pub elapsed: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Shared LLM provider type for concurrent access across sync units.
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for LLM providers
///
/// The API key is never serialized and is redacted in debug output.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Provider type: "claude-code", "openai"
    pub provider: String,
    pub model: Option<String>,
    pub timeout_secs: u64,
    /// 0.0 = deterministic
    pub temperature: f32,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl From<&LlmConfig> for ProviderConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: Some(config.model.clone()).filter(|m| !m.trim().is_empty()),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            api_key: None,
            api_base: config.api_base.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate structured output matching `schema` at the given reasoning effort.
    ///
    /// Failures are `SyncError::Provider` carrying a classified `LlmError`.
    async fn generate(&self, prompt: &str, schema: &Value, effort: Effort) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "claude-code" => Ok(Arc::new(ClaudeCodeProvider::new(config.clone()))),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        _ => Err(SyncError::Config(format!(
            "Unknown provider: {}. Supported: claude-code, openai",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..ProviderConfig::default()
        };
        let shown = format!("{:?}", config);
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains("sk-secret"));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = ProviderConfig {
            provider: "carrier-pigeon".to_string(),
            ..ProviderConfig::default()
        };
        assert!(matches!(create_provider(&config), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_claude_code_is_default() {
        let provider = create_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "claude-code");
    }
}
