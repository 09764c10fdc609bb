//! Module narrative documents
//!
//! Grammar:
//!
//! ```text
//! document     := "---" NL { meta-line | blank } "---" NL preamble { section }
//! meta-line    := key ":" value NL          key = [A-Za-z0-9_-]+
//! section      := "## " title NL body
//! ```
//!
//! Lines inside fenced code blocks never start a section. The `Overview`
//! section is mandatory and is the only one read back by the engine.

use thiserror::Error;

use crate::types::SyncError;

const DELIMITER: &str = "---";
const SECTION_PREFIX: &str = "## ";
const FENCE: &str = "```";

pub const REQUIRED_KEYS: [&str; 4] = ["module_name", "module_slug", "generated_at", "total_files"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrativeError {
    #[error("document does not start with a front-matter block")]
    MissingFrontMatter,

    #[error("front-matter block is not closed")]
    UnterminatedFrontMatter,

    #[error("line {line}: expected 'key: value', found '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("front matter is missing '{0}'")]
    MissingKey(&'static str),

    #[error("document has no '## Overview' section")]
    MissingOverview,
}

impl NarrativeError {
    pub fn into_sync_error(self, path: impl Into<String>) -> SyncError {
        SyncError::MalformedDocument {
            path: path.into(),
            reason: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Narrative {
    /// Front-matter pairs in document order
    pub meta: Vec<(String, String)>,
    /// Text between the front matter and the first section
    pub preamble: String,
    pub sections: Vec<Section>,
}

impl Narrative {
    /// Build a document from front matter and a generated body
    pub fn from_body(meta: Vec<(String, String)>, body: &str) -> Self {
        let (preamble, sections) = parse_sections(body);
        Self {
            meta,
            preamble,
            sections,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn section(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(title))
            .map(|s| s.body.as_str())
    }

    pub fn overview(&self) -> Option<&str> {
        self.section("Overview")
    }

    /// Check the required keys and the overview section
    pub fn validate(&self) -> Result<(), NarrativeError> {
        for key in REQUIRED_KEYS {
            if self.get(key).is_none() {
                return Err(NarrativeError::MissingKey(key));
            }
        }
        if self.overview().is_none() {
            return Err(NarrativeError::MissingOverview);
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(DELIMITER);
        out.push('\n');
        for (key, value) in &self.meta {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(DELIMITER);
        out.push_str("\n\n");
        out.push_str(&self.render_body());
        out
    }

    /// Preamble and sections without the front matter
    pub fn render_body(&self) -> String {
        let mut out = String::new();
        if !self.preamble.is_empty() {
            out.push_str(&self.preamble);
            out.push_str("\n\n");
        }
        for section in &self.sections {
            out.push_str(SECTION_PREFIX);
            out.push_str(&section.title);
            out.push_str("\n\n");
            if !section.body.is_empty() {
                out.push_str(&section.body);
                out.push_str("\n\n");
            }
        }

        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}

fn is_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse a full narrative document and validate it
pub fn parse(text: &str) -> Result<Narrative, NarrativeError> {
    let mut lines = text.lines().enumerate();

    match lines.next() {
        Some((_, first)) if first.trim_end() == DELIMITER => {}
        _ => return Err(NarrativeError::MissingFrontMatter),
    }

    let mut meta = Vec::new();
    let mut body_start = None;
    for (idx, line) in lines.by_ref() {
        let line = line.trim_end();
        if line == DELIMITER {
            body_start = Some(idx + 1);
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let parsed = line
            .split_once(':')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| is_key(k));
        let Some((key, value)) = parsed else {
            return Err(NarrativeError::MalformedLine {
                line: idx + 1,
                content: line.to_string(),
            });
        };
        meta.push((key.to_string(), value.to_string()));
    }

    let Some(start) = body_start else {
        return Err(NarrativeError::UnterminatedFrontMatter);
    };

    let body: Vec<&str> = text.lines().skip(start).collect();
    let narrative = Narrative::from_body(meta, &body.join("\n"));
    narrative.validate()?;
    Ok(narrative)
}

/// Split a body into its preamble and `##` sections
pub fn parse_sections(body: &str) -> (String, Vec<Section>) {
    let mut preamble: Vec<&str> = Vec::new();
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        if line.trim_start().starts_with(FENCE) {
            in_fence = !in_fence;
        }
        if !in_fence && let Some(title) = line.strip_prefix(SECTION_PREFIX) {
            sections.push((title.trim().to_string(), Vec::new()));
            continue;
        }
        match sections.last_mut() {
            Some((_, lines)) => lines.push(line),
            None => preamble.push(line),
        }
    }

    let sections = sections
        .into_iter()
        .map(|(title, lines)| Section {
            title,
            body: lines.join("\n").trim().to_string(),
        })
        .collect();
    (preamble.join("\n").trim().to_string(), sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DOC: &str = "---\nmodule_name: Billing\nmodule_slug: billing\ngenerated_at: 2026-01-01T00:00:00Z\ntotal_files: 2\n---\n\n# Billing\n\n## Overview\n\nHandles invoices.\n\n## Files\n\n```md\n## not a section\n```\n";

    #[test]
    fn test_parse_document() {
        let doc = parse(DOC).unwrap();
        assert_eq!(doc.get("module_slug"), Some("billing"));
        assert_eq!(doc.preamble, "# Billing");
        assert_eq!(doc.overview(), Some("Handles invoices."));
        assert_eq!(doc.sections.len(), 2);
        assert!(doc.section("files").unwrap().contains("## not a section"));
    }

    #[test]
    fn test_render_then_parse_keeps_content() {
        let doc = parse(DOC).unwrap();
        assert_eq!(parse(&doc.render()).unwrap(), doc);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("# no front matter"), Err(NarrativeError::MissingFrontMatter));
        assert_eq!(
            parse("---\nmodule_name: x\n"),
            Err(NarrativeError::UnterminatedFrontMatter)
        );
        assert!(matches!(
            parse("---\njust words\n---\n"),
            Err(NarrativeError::MalformedLine { line: 2, .. })
        ));
        assert_eq!(
            parse("---\nmodule_name: x\n---\n## Overview\nhi\n"),
            Err(NarrativeError::MissingKey("module_slug"))
        );
        assert_eq!(
            parse("---\nmodule_name: x\nmodule_slug: x\ngenerated_at: now\ntotal_files: 1\n---\n## Details\nhi\n"),
            Err(NarrativeError::MissingOverview)
        );
    }

    #[test]
    fn test_value_may_contain_colons() {
        let doc = parse(
            "---\nmodule_name: A: B\nmodule_slug: a\ngenerated_at: 2026-01-01T00:00:00Z\ntotal_files: 0\n---\n## Overview\nx\n",
        )
        .unwrap();
        assert_eq!(doc.get("module_name"), Some("A: B"));
        assert_eq!(doc.get("generated_at"), Some("2026-01-01T00:00:00Z"));
    }

    fn arb_narrative() -> impl Strategy<Value = Narrative> {
        let value = "[A-Za-z0-9][A-Za-z0-9 .:/-]{0,20}[A-Za-z0-9]";
        let body = prop::collection::vec("[A-Za-z0-9]{1,3}( [A-Za-z0-9,.]{1,5}){0,4}", 0..4)
            .prop_map(|lines| lines.join("\n"));
        let extra = prop::collection::vec(("[A-Za-z][A-Za-z ]{0,10}[A-Za-z]", body.clone()), 0..3);
        (
            prop::collection::vec(value, 4),
            prop::option::of("[A-Za-z][A-Za-z0-9 ]{0,20}"),
            body,
            extra,
        )
            .prop_map(|(values, preamble, overview, extra)| {
                let meta = REQUIRED_KEYS
                    .iter()
                    .zip(values)
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
                let mut sections = vec![Section {
                    title: "Overview".to_string(),
                    body: overview,
                }];
                sections.extend(extra.into_iter().map(|(title, body)| Section { title, body }));
                Narrative {
                    meta,
                    preamble: preamble.map(|p| p.trim().to_string()).unwrap_or_default(),
                    sections,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_rendered_documents_parse_back(doc in arb_narrative()) {
            prop_assert_eq!(parse(&doc.render()), Ok(doc));
        }

        #[test]
        fn prop_parse_never_panics(text in "\\PC{0,200}") {
            let _ = parse(&text);
        }
    }
}
