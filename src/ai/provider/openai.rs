//! OpenAI API Provider
//!
//! Chat Completions with JSON response format. Reasoning models
//! (`o*`, `gpt-5*`) receive `reasoning_effort` derived from the unit's effort.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use url::Url;

use super::{
    ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse, ProviderConfig,
    ResponseMetadata,
};
use crate::ai::effort::Effort;
use crate::ai::validation::extract_json;
use crate::constants::network::CONNECTION_TIMEOUT_SECS;
use crate::types::{Result, SyncError};

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                SyncError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var".to_string(),
                )
            })?;

        let api_base = normalize_api_base(config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE))?;
        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn is_reasoning_model(&self) -> bool {
        let model = self.model.to_lowercase();
        model.starts_with('o') || model.starts_with("gpt-5")
    }

    fn build_request(&self, prompt: &str, schema: &Value, effort: Effort) -> ChatCompletionRequest {
        let system_content = if schema.is_null() {
            "You are a code documentation expert. Always respond with valid JSON.".to_string()
        } else {
            format!(
                "You are a code documentation expert. Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                schema
            )
        };

        let reasoning = self.is_reasoning_model();
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: (!reasoning).then_some(self.temperature),
            max_tokens: Some(self.max_tokens),
            reasoning_effort: reasoning.then(|| effort.as_str().to_string()),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

/// Validate the base URL and strip a trailing slash
fn normalize_api_base(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| SyncError::Config(format!("Invalid api_base '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::Config(format!(
            "Invalid api_base '{}': scheme must be http or https",
            raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn request_error(err: reqwest::Error) -> LlmError {
    let category = if err.is_timeout() || err.is_connect() {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    };
    LlmError::with_provider(category, format!("OpenAI request failed: {}", err), PROVIDER)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[instrument(skip(self, prompt, schema), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, schema: &Value, effort: Effort) -> Result<LlmResponse> {
        info!(?effort, "Generating with OpenAI");

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema, effort);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let mut err = ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER,
            );
            if let Some(delay) = retry_after {
                err = err.retry_after(delay);
            }
            return Err(err.into());
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse OpenAI response: {}", e),
                PROVIDER,
            )
        })?;

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| {
                LlmError::with_provider(
                    ErrorCategory::ParseError,
                    "No content in OpenAI response",
                    PROVIDER,
                )
            })?;

        debug!("Received response from OpenAI, parsing JSON");
        let content = extract_json(content_str).ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                "OpenAI content is not valid JSON",
                PROVIDER,
            )
        })?;

        let usage = response_body.usage.unwrap_or_default();
        Ok(LlmResponse {
            content,
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER.to_string(),
                elapsed,
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}
