//! Revision marker embedded in expansive-tier artifacts

use std::sync::LazyLock;

use regex::Regex;

use crate::types::RevisionId;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:<!--[ \t]*)?revision:[ \t]*([0-9A-Za-z]+)[ \t]*(?:-->)?[ \t]*$")
        .expect("MARKER is a valid regex pattern")
});

/// Canonical marker line for a revision
pub fn marker_line(revision: &RevisionId) -> String {
    format!("<!-- revision: {} -->", revision)
}

/// Revision recorded in `content`, if any
pub fn extract(content: &str) -> Option<RevisionId> {
    MARKER
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| RevisionId::new(m.as_str()))
}

/// Replace the first marker with the canonical one for `revision`,
/// or append it on its own line
pub fn stamp(content: &str, revision: &RevisionId) -> String {
    let line = marker_line(revision);
    if MARKER.is_match(content) {
        return MARKER.replace(content, line.as_str()).into_owned();
    }

    let mut out = content.trim_end_matches('\n').to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(&line);
    out.push('\n');
    out
}
