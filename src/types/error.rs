//! Unified Error Type System
//!
//! Centralized error types for the sync engine.
//! Provides error classification for retry and requeue decisions.
//!
//! ## Error Kinds
//!
//! - **Revision**: version-control subprocess failure (abort the unit)
//! - **TransientProvider**: rate limiting and other recoverable generator failures (requeue)
//! - **PermanentProvider**: malformed/placeholder responses, context length exceeded (fail)
//! - **Filesystem**: artifact or document write failure (rollback, propagate)
//! - **DataIntegrity**: rejected before any mutation
//!
//! "Content not found at a revision" is never an error value; it is `None`.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Provider error categories used for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Context/token limit exceeded - the same request will never fit
    TokenLimit,
    /// Authentication failed - fail fast
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Provider unavailable or overloaded
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Response could not be parsed into the expected shape
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Whether a unit failing with this category may be requeued
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::Unavailable | Self::Unknown
        )
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Structured generator error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if the provider sent one)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Shorthand for a rate-limit signal
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RateLimit, message)
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.category.is_transient()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("token")
            && (lower.contains("limit") || lower.contains("exceed") || lower.contains("maximum"))
            || lower.contains("context length")
            || lower.contains("context too long")
            || lower.contains("too large")
        {
            return LlmError::with_provider(ErrorCategory::TokenLimit, message, provider);
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("overloaded")
            || lower.contains("not installed")
        {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("malformed") {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("parse") || lower.contains("json") || lower.contains("unexpected token")
        {
            return LlmError::with_provider(ErrorCategory::ParseError, message, provider);
        }

        if lower.contains("retry") || lower.contains("temporary") || lower.contains("500") {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 413 => Self::classify(message, provider),
            500 | 502 | 503 | 504 | 529 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Data Integrity Errors
// =============================================================================

/// Rejections raised before any mutation takes place
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module already exists: {0}")]
    ModuleAlreadyExists(String),

    #[error("invalid module slug '{0}': use lowercase letters, digits and single hyphens")]
    InvalidSlug(String),

    #[error("file list too small: {actual} file(s), at least {min} required")]
    FileListTooSmall { min: usize, actual: usize },

    #[error("{path} is already owned by module '{owner}'")]
    PathOwnedByOtherModule { path: String, owner: String },

    #[error("invalid source path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

// =============================================================================
// Application Error
// =============================================================================

/// Coarse error kinds used for unit outcome routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Revision,
    TransientProvider,
    PermanentProvider,
    Filesystem,
    DataIntegrity,
    Configuration,
    Internal,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Version-control subprocess failure
    #[error("revision error ({command}): {message}")]
    Revision { command: String, message: String },

    #[error("generator error: {0}")]
    Provider(LlmError),

    /// Generator answered, but the answer is unusable
    #[error("invalid generator response for {item}: {reason}")]
    InvalidResponse { item: String, reason: String },

    #[error("filesystem error at {path}: {message}")]
    Filesystem { path: String, message: String },

    #[error("{0}")]
    Integrity(#[from] IntegrityError),

    #[error("malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'docsync init' first")]
    NotInitialized,
}

impl From<LlmError> for SyncError {
    fn from(err: LlmError) -> Self {
        SyncError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn revision(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Revision {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid_response(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            item: item.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Map onto the error-handling table
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Revision { .. } => ErrorKind::Revision,
            Self::Provider(e) if e.is_transient() => ErrorKind::TransientProvider,
            Self::Provider(_) | Self::InvalidResponse { .. } => ErrorKind::PermanentProvider,
            Self::Timeout { .. } => ErrorKind::TransientProvider,
            Self::Io(_) | Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Integrity(_) => ErrorKind::DataIntegrity,
            Self::Config(_) | Self::NotInitialized => ErrorKind::Configuration,
            Self::Json(_) | Self::MalformedDocument { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the unit may be requeued after a delay
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientProvider
    }

    /// Delay hint for requeueing, if the error carries one
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            Self::Provider(e) => e.retry_after,
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::TokenLimit.to_string(), "TOKEN_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_transient() {
        assert!(ErrorCategory::RateLimit.is_transient());
        assert!(ErrorCategory::Network.is_transient());
        assert!(ErrorCategory::Transient.is_transient());
        assert!(!ErrorCategory::TokenLimit.is_transient());
        assert!(!ErrorCategory::ParseError.is_transient());
        assert!(!ErrorCategory::Auth.is_transient());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ErrorClassifier::classify("Rate limit exceeded, please retry", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_context_length_is_permanent() {
        let err = ErrorClassifier::classify("This model's maximum context length is 128000", "x");
        assert_eq!(err.category, ErrorCategory::TokenLimit);
        let sync_err: SyncError = err.into();
        assert_eq!(sync_err.kind(), ErrorKind::PermanentProvider);
    }

    #[test]
    fn test_classify_network() {
        let err = ErrorClassifier::classify("Connection timed out after 30s", "claude-code");
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let server_error = ErrorClassifier::classify_http_status(503, "Server error", "test");
        assert_eq!(server_error.category, ErrorCategory::Transient);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SyncError::revision("git diff", "fatal").kind(),
            ErrorKind::Revision
        );
        assert_eq!(
            SyncError::from(LlmError::rate_limited("slow down")).kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(
            SyncError::invalid_response("a.rs", "placeholder").kind(),
            ErrorKind::PermanentProvider
        );
        assert_eq!(
            SyncError::from(IntegrityError::ModuleNotFound("x".into())).kind(),
            ErrorKind::DataIntegrity
        );
        assert!(SyncError::timeout("generate", Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }

    #[test]
    fn test_retry_hint_comes_from_provider() {
        let err: SyncError = LlmError::new(ErrorCategory::RateLimit, "slow down")
            .retry_after(Duration::from_secs(100))
            .into();
        assert_eq!(err.retry_hint(), Some(Duration::from_secs(100)));
        assert_eq!(SyncError::from(LlmError::rate_limited("x")).retry_hint(), None);
    }
}
