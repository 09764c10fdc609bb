//! Normalized source paths
//!
//! Identity of a source file is its normalized, repository-relative path.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::IntegrityError;

/// Repository-relative source path with forward slashes and no `.`/`..` segments
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourcePath(String);

impl SourcePath {
    /// Normalize and validate a raw path
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IntegrityError> {
        let raw = raw.as_ref();
        let unified = raw.trim().replace('\\', "/");

        if unified.starts_with('/') {
            return Err(IntegrityError::InvalidPath {
                path: raw.to_string(),
                reason: "absolute paths are not allowed".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(IntegrityError::InvalidPath {
                        path: raw.to_string(),
                        reason: "parent segments are not allowed".to_string(),
                    });
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(IntegrityError::InvalidPath {
                path: raw.to_string(),
                reason: "empty path".to_string(),
            });
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension without the dot
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path with the final extension removed (`app/Foo.php` -> `app/Foo`)
    pub fn without_extension(&self) -> &str {
        match self.extension() {
            Some(ext) => &self.0[..self.0.len() - ext.len() - 1],
            None => &self.0,
        }
    }

    /// Language label derived from the extension
    pub fn language(&self) -> &'static str {
        match self.extension().map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("rs") => "rust",
            Some("php") => "php",
            Some("ts") | Some("tsx") => "typescript",
            Some("js") | Some("jsx") | Some("mjs") => "javascript",
            Some("py") => "python",
            Some("go") => "go",
            Some("java") => "java",
            Some("kt") | Some("kts") => "kotlin",
            Some("rb") => "ruby",
            Some("c") | Some("h") => "c",
            Some("cpp") | Some("hpp") | Some("cc") => "cpp",
            Some("cs") => "csharp",
            Some("swift") => "swift",
            _ => "text",
        }
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SourcePath {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SourcePath {
    type Error = IntegrityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourcePath> for String {
    fn from(path: SourcePath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let p = SourcePath::new("./app//Services\\Foo.php").unwrap();
        assert_eq!(p.as_str(), "app/Services/Foo.php");
        assert_eq!(p.extension(), Some("php"));
        assert_eq!(p.without_extension(), "app/Services/Foo");
        assert_eq!(p.language(), "php");
    }

    #[test]
    fn test_rejects_escape_and_absolute() {
        assert!(SourcePath::new("../etc/passwd").is_err());
        assert!(SourcePath::new("/etc/passwd").is_err());
        assert!(SourcePath::new("./").is_err());
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        let p = SourcePath::new("config/.env").unwrap();
        assert_eq!(p.extension(), None);
        assert_eq!(p.without_extension(), "config/.env");
    }

    #[test]
    fn test_serde_normalizes() {
        let p: SourcePath = serde_json::from_str("\"src/./lib.rs\"").unwrap();
        assert_eq!(p.as_str(), "src/lib.rs");
        assert!(serde_json::from_str::<SourcePath>("\"../x.rs\"").is_err());
    }
}
