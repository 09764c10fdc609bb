//! Response Validation
//!
//! Rejects generator output that is empty, too short for its tier, or still
//! contains template placeholders. Rejections are `InvalidResponse`, a
//! permanent failure for the unit.

use serde_json::Value;
use tracing::debug;

use super::generator::{TierContent, TierUpdate};
use crate::config::{GenerationConfig, MinLengths};
use crate::types::{Result, SyncError, Tier};

/// Validates generator responses against configured markers and lengths
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    markers: Vec<String>,
    min_length: MinLengths,
}

impl ResponseValidator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            markers: config
                .placeholder_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            min_length: config.min_length.clone(),
        }
    }

    fn check(&self, item: &str, label: &str, text: &str, min: usize) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SyncError::invalid_response(item, format!("{} is empty", label)));
        }
        if let Some(marker) = self.markers.iter().find(|m| trimmed.contains(m.as_str())) {
            return Err(SyncError::invalid_response(
                item,
                format!("{} contains placeholder marker '{}'", label, marker),
            ));
        }
        let len = trimmed.chars().count();
        if len < min {
            return Err(SyncError::invalid_response(
                item,
                format!("{} is {} chars, minimum is {}", label, len, min),
            ));
        }
        Ok(())
    }

    /// All three tiers are required
    pub fn validate_tiers(&self, item: &str, content: &TierContent) -> Result<()> {
        for tier in Tier::ALL {
            self.check(item, tier.as_str(), content.get(tier), self.min_length.for_tier(tier))?;
        }
        debug!(item, "Tier content accepted");
        Ok(())
    }

    /// Absent tiers mean "unchanged"; present ones are held to the same rules
    pub fn validate_update(&self, item: &str, update: &TierUpdate) -> Result<()> {
        for tier in Tier::ALL {
            if let Some(text) = update.get(tier) {
                self.check(item, tier.as_str(), text, self.min_length.for_tier(tier))?;
            }
        }
        Ok(())
    }

    pub fn validate_module(&self, slug: &str, body: &str) -> Result<()> {
        self.check(slug, "module document", body, self.min_length.module)
    }
}

// =============================================================================
// JSON extraction
// =============================================================================

/// Parse JSON from model output that may be fenced or wrapped in prose.
///
/// Truncated JSON is not repaired: a partial answer must fail the unit.
pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fences(raw.trim().trim_start_matches('\u{feff}'));

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }

    let without_commas = fix_trailing_commas(cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(&without_commas) {
        debug!("JSON parsed after removing trailing commas");
        return Some(value);
    }

    let start = without_commas.find('{')?;
    let end = without_commas.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&without_commas[start..=end]).ok()
}

fn strip_code_fences(s: &str) -> &str {
    let mut result = s;
    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = &result[first_newline + 1..];
    }
    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped;
    }
    result.trim()
}

/// Drop commas directly before `]` or `}` outside strings
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }
    result
}
