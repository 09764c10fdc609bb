//! AI Integration Layer
//!
//! - `provider`: LLM backends (Claude Code CLI, OpenAI HTTP)
//! - `generator`: the `Generator` capability used by the sync engine
//! - `effort`: reasoning effort selection
//! - `validation`: response acceptance rules
//! - `timeout`: wall-clock deadlines for blocking calls

pub mod effort;
pub mod generator;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use effort::{Effort, EffortPolicy, FixedEffort, GenerationTask, SizeBasedEffort};
pub use generator::{
    AssignmentRequest, FileDoc, FileExcerpt, Generator, LlmGenerator, ModuleDocRequest,
    ModuleSummary, SharedGenerator, TierContent, TierRequest, TierUpdate, UpdateRequest,
};
pub use prompt::PromptBuilder;
pub use provider::{
    ClaudeCodeProvider, LlmProvider, LlmResponse, OpenAiProvider, ProviderConfig,
    ResponseMetadata, SharedProvider, create_provider,
};
pub use timeout::{TimeoutConfig, with_timeout};
pub use validation::{ResponseValidator, extract_json};
