//! Claude Code CLI Provider
//!
//! Runs one `claude -p` invocation per request with JSON output.
//! Reasoning effort is passed through `MAX_THINKING_TOKENS`.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use super::{ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata};
use crate::ai::effort::Effort;
use crate::types::Result;

const PROVIDER: &str = "claude-code";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct ClaudeCodeProvider {
    model: String,
    timeout_secs: u64,
    temperature: f32,
}

impl ClaudeCodeProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
        }
    }

    fn thinking_budget(effort: Effort) -> u32 {
        match effort {
            Effort::Low => 0,
            Effort::Medium => 8_000,
            Effort::High => 32_000,
        }
    }

    fn error(category: ErrorCategory, message: impl Into<String>) -> LlmError {
        LlmError::with_provider(category, message, PROVIDER)
    }

    /// Execute a single Claude Code CLI call
    async fn execute(&self, prompt: &str, schema: &Value, effort: Effort) -> Result<LlmResponse> {
        let start_time = Instant::now();

        let mut cmd = Command::new("claude");
        cmd.arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .arg("--model")
            .arg(&self.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !schema.is_null() {
            cmd.arg("--json-schema").arg(serde_json::to_string(schema)?);
        }

        cmd.env("CLAUDE_CODE_TEMPERATURE", self.temperature.to_string());
        cmd.env("MAX_THINKING_TOKENS", Self::thinking_budget(effort).to_string());

        let child = cmd.spawn().map_err(|e| {
            Self::error(
                ErrorCategory::Unavailable,
                format!("Failed to spawn Claude Code CLI: {}. Is it installed?", e),
            )
        })?;

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            Self::error(
                ErrorCategory::Network,
                format!("Claude Code timed out after {}s", self.timeout_secs),
            )
        })?
        .map_err(|e| Self::error(ErrorCategory::Unknown, format!("Claude Code execution failed: {}", e)))?;

        let elapsed = start_time.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if let Some(message) = api_error(&stdout) {
                return Err(ErrorClassifier::classify(&message, PROVIDER).into());
            }
            let message = if stderr.trim().is_empty() {
                "Process exited with non-zero status".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ErrorClassifier::classify(&message, PROVIDER).into());
        }

        let response: Value = serde_json::from_str(&stdout).map_err(|e| {
            Self::error(
                ErrorCategory::ParseError,
                format!("Failed to parse Claude Code output: {}", e),
            )
        })?;

        if let Some(message) = api_error(&stdout) {
            return Err(ErrorClassifier::classify(&message, PROVIDER).into());
        }

        let content = extract_content(&response)?;
        let usage = response.get("usage");
        let tokens = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32
        };

        debug!(elapsed_ms = elapsed.as_millis() as u64, "Claude Code responded");
        Ok(LlmResponse {
            content,
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER.to_string(),
                elapsed,
                input_tokens: tokens("input_tokens"),
                output_tokens: tokens("output_tokens"),
            },
        })
    }
}

/// Error text of an `is_error` CLI envelope
fn api_error(stdout: &str) -> Option<String> {
    let response: Value = serde_json::from_str(stdout).ok()?;
    if !response.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }
    Some(
        response
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown API error")
            .to_string(),
    )
}

/// Structured output, or the `result` field parsed as JSON
fn extract_content(response: &Value) -> Result<Value> {
    if let Some(structured) = response.get("structured_output") {
        return Ok(structured.clone());
    }
    match response.get("result") {
        Some(result) if result.is_object() || result.is_array() => Ok(result.clone()),
        Some(Value::String(s)) => crate::ai::validation::extract_json(s).ok_or_else(|| {
            ClaudeCodeProvider::error(ErrorCategory::ParseError, "Result is not valid JSON").into()
        }),
        _ => Err(ClaudeCodeProvider::error(
            ErrorCategory::ParseError,
            "No structured output in Claude Code response",
        )
        .into()),
    }
}

#[async_trait]
impl LlmProvider for ClaudeCodeProvider {
    #[instrument(skip(self, prompt, schema), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, schema: &Value, effort: Effort) -> Result<LlmResponse> {
        info!(?effort, "Generating with Claude Code CLI");
        self.execute(prompt, schema, effort).await
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}
