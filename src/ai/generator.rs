//! Documentation generator capability
//!
//! The sync engine talks to `Generator` only. `LlmGenerator` implements it on
//! top of an `LlmProvider`, picking reasoning effort through an `EffortPolicy`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::effort::{EffortPolicy, GenerationTask};
use super::prompt;
use super::provider::SharedProvider;
use crate::modules::Recommendation;
use crate::types::{Result, RevisionId, SourcePath, SyncError, Tier};

// =============================================================================
// Responses
// =============================================================================

/// All three tiers for one file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierContent {
    pub micro: String,
    pub standard: String,
    pub expansive: String,
}

impl TierContent {
    pub fn get(&self, tier: Tier) -> &str {
        match tier {
            Tier::Micro => &self.micro,
            Tier::Standard => &self.standard,
            Tier::Expansive => &self.expansive,
        }
    }

    pub fn into_map(self) -> BTreeMap<Tier, String> {
        BTreeMap::from([
            (Tier::Micro, self.micro),
            (Tier::Standard, self.standard),
            (Tier::Expansive, self.expansive),
        ])
    }
}

/// Revised tiers; `None` means the tier needs no change
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TierUpdate {
    #[serde(default)]
    pub micro: Option<String>,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub expansive: Option<String>,
}

impl TierUpdate {
    pub fn get(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Micro => self.micro.as_deref(),
            Tier::Standard => self.standard.as_deref(),
            Tier::Expansive => self.expansive.as_deref(),
        }
    }

    pub fn into_map(self) -> BTreeMap<Tier, String> {
        [
            (Tier::Micro, self.micro),
            (Tier::Standard, self.standard),
            (Tier::Expansive, self.expansive),
        ]
        .into_iter()
        .filter_map(|(tier, text)| text.map(|t| (tier, t)))
        .collect()
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone)]
pub struct TierRequest {
    pub path: SourcePath,
    pub source: String,
    pub revision: RevisionId,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub path: SourcePath,
    pub source: String,
    pub diff: String,
    pub existing: BTreeMap<Tier, String>,
    pub revision: RevisionId,
}

/// Tier documentation of one file fed into a module narrative
#[derive(Debug, Clone)]
pub struct FileDoc {
    pub path: SourcePath,
    pub doc: String,
}

#[derive(Debug, Clone)]
pub struct ModuleDocRequest {
    pub slug: String,
    pub module_name: String,
    /// Body of the previous narrative, if any
    pub current_document: Option<String>,
    pub new_files: Vec<FileDoc>,
}

#[derive(Debug, Clone)]
pub struct FileExcerpt {
    pub path: SourcePath,
    pub excerpt: String,
}

#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub slug: String,
    pub name: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub files: Vec<FileExcerpt>,
    pub modules: Vec<ModuleSummary>,
    pub min_files_per_module: usize,
}

// =============================================================================
// Generator
// =============================================================================

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_tiers(&self, request: TierRequest) -> Result<TierContent>;

    async fn update_tiers(&self, request: UpdateRequest) -> Result<TierUpdate>;

    /// Narrative body starting at `## Overview`, without front matter
    async fn regenerate_module_document(&self, request: ModuleDocRequest) -> Result<String>;

    async fn suggest_assignments(&self, request: AssignmentRequest) -> Result<Vec<Recommendation>>;
}

pub type SharedGenerator = Arc<dyn Generator>;

/// Generator backed by an LLM provider
pub struct LlmGenerator {
    provider: SharedProvider,
    effort: Arc<dyn EffortPolicy>,
    max_source_chars: usize,
}

impl LlmGenerator {
    pub fn new(provider: SharedProvider, effort: Arc<dyn EffortPolicy>, max_source_chars: usize) -> Self {
        Self {
            provider,
            effort,
            max_source_chars,
        }
    }

    async fn call(
        &self,
        item: &str,
        task: GenerationTask,
        input_len: usize,
        prompt: String,
        schema: Value,
    ) -> Result<Value> {
        let effort = self.effort.effort_for(task, input_len);
        let response = self.provider.generate(&prompt, &schema, effort).await?;
        debug!(
            item,
            ?task,
            input_tokens = response.metadata.input_tokens,
            output_tokens = response.metadata.output_tokens,
            elapsed_ms = response.metadata.elapsed.as_millis() as u64,
            "Generator call completed"
        );
        Ok(response.content)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(item: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| SyncError::invalid_response(item, format!("unexpected shape: {}", e)))
}

#[derive(Deserialize)]
struct ModuleDocument {
    document: String,
}

#[derive(Deserialize)]
struct RawRecommendation {
    module_slug: String,
    #[serde(default)]
    module_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    confidence: f64,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct Recommendations {
    recommendations: Vec<RawRecommendation>,
}

impl RawRecommendation {
    /// Drops paths that do not normalize; `None` if nothing is left
    fn into_recommendation(self) -> Option<Recommendation> {
        let files: Vec<SourcePath> = self
            .files
            .iter()
            .filter_map(|f| match SourcePath::new(f) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(path = %f, error = %e, "Ignoring recommended path");
                    None
                }
            })
            .collect();
        if files.is_empty() || !self.confidence.is_finite() {
            return None;
        }
        Some(Recommendation {
            module_slug: self.module_slug.trim().to_string(),
            module_name: self.module_name,
            description: self.description,
            files,
            confidence: self.confidence.clamp(0.0, 1.0),
            reason: self.reason,
        })
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn generate_tiers(&self, request: TierRequest) -> Result<TierContent> {
        let item = request.path.to_string();
        let prompt = prompt::tiers_prompt(&request, self.max_source_chars);
        let value = self
            .call(&item, GenerationTask::Tiers, request.source.len(), prompt, prompt::tiers_schema())
            .await?;
        parse(&item, value)
    }

    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn update_tiers(&self, request: UpdateRequest) -> Result<TierUpdate> {
        let item = request.path.to_string();
        let prompt = prompt::update_prompt(&request, self.max_source_chars);
        let input_len = request.source.len() + request.diff.len();
        let value = self
            .call(&item, GenerationTask::Update, input_len, prompt, prompt::update_schema())
            .await?;
        parse(&item, value)
    }

    #[instrument(skip(self, request), fields(slug = %request.slug))]
    async fn regenerate_module_document(&self, request: ModuleDocRequest) -> Result<String> {
        let input_len: usize = request.new_files.iter().map(|f| f.doc.len()).sum();
        let prompt = prompt::module_prompt(&request, self.max_source_chars);
        let value = self
            .call(&request.slug, GenerationTask::Module, input_len, prompt, prompt::module_schema())
            .await?;
        let doc: ModuleDocument = parse(&request.slug, value)?;
        Ok(doc.document)
    }

    #[instrument(skip(self, request), fields(files = request.files.len()))]
    async fn suggest_assignments(&self, request: AssignmentRequest) -> Result<Vec<Recommendation>> {
        let input_len: usize = request.files.iter().map(|f| f.excerpt.len()).sum();
        let prompt = prompt::assignment_prompt(&request);
        let value = self
            .call(
                "assignment",
                GenerationTask::Assignment,
                input_len,
                prompt,
                prompt::assignment_schema(),
            )
            .await?;
        let raw: Recommendations = parse("assignment", value)?;
        Ok(raw
            .recommendations
            .into_iter()
            .filter_map(RawRecommendation::into_recommendation)
            .collect())
    }
}
