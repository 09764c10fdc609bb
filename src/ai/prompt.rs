//! Prompt Builder
//!
//! Tagged-section prompt construction plus the prompts and JSON schemas
//! for each generator request.

use serde_json::{Value, json};

use super::generator::{AssignmentRequest, ModuleDocRequest, TierRequest, UpdateRequest};

#[derive(Debug, Clone)]
enum PromptSection {
    Role { expertise: String, task: String },
    Objectives(Vec<String>),
    /// Ordered key-value pairs
    Context(Vec<(String, String)>),
    Text {
        header: Option<String>,
        content: String,
    },
    Code { language: String, content: String },
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a context item, appending to the existing context section
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let pair = (key.to_string(), value.to_string());
        match self
            .sections
            .iter_mut()
            .find_map(|s| match s {
                PromptSection::Context(ctx) => Some(ctx),
                _ => None,
            }) {
            Some(ctx) => ctx.push(pair),
            None => self.sections.push(PromptSection::Context(vec![pair])),
        }
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn focus(mut self, target: &str, restrictions: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.into_iter().map(String::from).collect(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(ctx) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in ctx {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

/// Cut `text` to `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n... (truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

const TIER_GUIDE: &str = "micro: one sentence naming the file's single responsibility.\n\
standard: one or two paragraphs covering public surface and collaborators.\n\
expansive: full markdown reference with sections for purpose, key types, control flow and edge cases.";

// =============================================================================
// Prompts
// =============================================================================

pub fn tiers_prompt(request: &TierRequest, max_source_chars: usize) -> String {
    PromptBuilder::new()
        .role("technical writer", "source-level code documentation")
        .objectives(vec![
            "Document the file below at three levels of detail",
            "Describe behavior that exists in the code, nothing speculative",
        ])
        .context_item("Path", request.path.as_str())
        .context_item("Language", request.path.language())
        .context_item("Revision", request.revision.as_str())
        .section("Tiers", TIER_GUIDE)
        .code(request.path.language(), &truncate_chars(&request.source, max_source_chars))
        .focus(
            request.path.as_str(),
            vec!["Do not document other files", "Never emit placeholder text"],
        )
        .build()
}

pub fn update_prompt(request: &UpdateRequest, max_source_chars: usize) -> String {
    let mut builder = PromptBuilder::new()
        .role("technical writer", "keeping code documentation current")
        .objectives(vec![
            "Revise the existing documentation to reflect the diff",
            "Return null for any tier whose text needs no change",
        ])
        .context_item("Path", request.path.as_str())
        .context_item("Revision", request.revision.as_str())
        .section("Tiers", TIER_GUIDE)
        .section("Diff", &truncate_chars(&request.diff, max_source_chars))
        .code(request.path.language(), &truncate_chars(&request.source, max_source_chars));

    for (tier, text) in &request.existing {
        builder = builder.section(&format!("Current {} documentation", tier), text);
    }

    builder
        .focus(request.path.as_str(), vec!["Keep unchanged facts verbatim"])
        .build()
}

pub fn module_prompt(request: &ModuleDocRequest, max_source_chars: usize) -> String {
    let mut builder = PromptBuilder::new()
        .role("software architect", "module-level documentation")
        .objectives(vec![
            "Write the narrative for the module as markdown",
            "Start with a '## Overview' section summarizing the module in one paragraph",
            "Follow with sections describing how the files collaborate",
        ])
        .context_item("Module", &request.module_name)
        .context_item("Slug", &request.slug);

    if let Some(current) = &request.current_document {
        builder = builder.section("Current document", current);
    }

    let per_file = (max_source_chars / request.new_files.len().max(1)).max(1);
    for file in &request.new_files {
        builder = builder.section(
            &format!("File {}", file.path),
            &truncate_chars(&file.doc, per_file),
        );
    }

    builder
        .focus(
            &request.module_name,
            vec!["Do not include front matter", "Never emit placeholder text"],
        )
        .build()
}

pub fn assignment_prompt(request: &AssignmentRequest) -> String {
    let modules = if request.modules.is_empty() {
        "(none)".to_string()
    } else {
        request
            .modules
            .iter()
            .map(|m| format!("- {} ({}): {}", m.slug, m.name, m.summary))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut builder = PromptBuilder::new()
        .role("software architect", "grouping source files into modules")
        .objectives(vec![
            "Place each unassigned file into an existing module where it fits",
            "Propose a new module only for a cohesive group of files",
            "Give each recommendation a confidence between 0 and 1",
        ])
        .context_item(
            "Minimum files per new module",
            &request.min_files_per_module.to_string(),
        )
        .section("Existing modules", &modules);

    for file in &request.files {
        builder = builder.section(&format!("Unassigned file {}", file.path), &file.excerpt);
    }

    builder
        .focus(
            "module membership",
            vec!["Use lowercase hyphenated slugs", "Only list files shown above"],
        )
        .build()
}

// =============================================================================
// Schemas
// =============================================================================

pub fn tiers_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "micro": {"type": "string"},
            "standard": {"type": "string"},
            "expansive": {"type": "string"}
        },
        "required": ["micro", "standard", "expansive"]
    })
}

pub fn update_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "micro": {"type": ["string", "null"]},
            "standard": {"type": ["string", "null"]},
            "expansive": {"type": ["string", "null"]}
        },
        "required": ["micro", "standard", "expansive"]
    })
}

pub fn module_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "document": {"type": "string"}
        },
        "required": ["document"]
    })
}

pub fn assignment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "recommendations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "module_slug": {"type": "string"},
                        "module_name": {"type": ["string", "null"]},
                        "description": {"type": ["string", "null"]},
                        "files": {"type": "array", "items": {"type": "string"}},
                        "confidence": {"type": "number"},
                        "reason": {"type": "string"}
                    },
                    "required": ["module_slug", "files", "confidence"]
                }
            }
        },
        "required": ["recommendations"]
    })
}
