//! File storage capability
//!
//! All persisted documents go through `FileStore`, addressed by paths
//! relative to the project root. `LocalFileStore` writes each file
//! atomically (temp file + rename); `MemoryFileStore` keeps everything in
//! memory and can be told to fail specific writes.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::types::{Result, SyncError};

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn read(&self, path: &Path) -> Result<Option<String>>;

    /// Replace the file's content, creating parent directories
    async fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Remove the file; `false` if it did not exist
    async fn delete(&self, path: &Path) -> Result<bool>;

    /// Files directly inside `dir`, sorted; subdirectories are not entered
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

pub type SharedFileStore = Arc<dyn FileStore>;

fn rel_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// =============================================================================
// Local Filesystem
// =============================================================================

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(self.resolve(path))
            .await
            .map_err(|e| SyncError::filesystem(rel_display(path), e))
    }

    async fn read(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(self.resolve(path)).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::filesystem(rel_display(path), e)),
        }
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let full = self.resolve(path);
        let Some(dir) = full.parent() else {
            return Err(SyncError::filesystem(rel_display(path), "invalid path"));
        };
        fs::create_dir_all(dir)
            .await
            .map_err(|e| SyncError::filesystem(rel_display(path), e))?;

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&tmp, contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(SyncError::filesystem(rel_display(path), e));
        }
        if let Err(e) = fs::rename(&tmp, &full).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(SyncError::filesystem(rel_display(path), e));
        }

        debug!(path = %rel_display(path), bytes = contents.len(), "Wrote file");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::filesystem(rel_display(path), e)),
        }
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(self.resolve(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::filesystem(rel_display(dir), e)),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::filesystem(rel_display(dir), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SyncError::filesystem(rel_display(dir), e))?;
            if file_type.is_file() {
                out.push(dir.join(entry.file_name()));
            }
        }

        out.sort();
        Ok(out)
    }
}

// =============================================================================
// In-Memory
// =============================================================================

/// In-memory store; writes to paths containing an injected fragment fail
#[derive(Default)]
pub struct MemoryFileStore {
    files: DashMap<PathBuf, String>,
    failing: DashSet<String>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to a path containing `fragment` fail
    pub fn fail_writes_containing(&self, fragment: impl Into<String>) {
        self.failing.insert(fragment.into());
    }

    pub fn clear_failures(&self) {
        self.failing.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Snapshot of every stored path, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.contains_key(path))
    }

    async fn read(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.files.get(path).map(|e| e.value().clone()))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let shown = rel_display(path);
        if self.failing.iter().any(|f| shown.contains(f.key().as_str())) {
            return Err(SyncError::filesystem(shown, "injected write failure"));
        }
        self.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        Ok(self.files.remove(path).is_some())
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|e| e.key().parent() == Some(dir))
            .map(|e| e.key().clone())
            .collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_roundtrip_and_list() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        let path = Path::new("docs/files/short/src/lib.md");

        assert!(!store.exists(path).await.unwrap());
        assert_eq!(store.read(path).await.unwrap(), None);

        store.write(path, "hello").await.unwrap();
        store
            .write(Path::new("docs/files/short/src/a/b.md"), "nested")
            .await
            .unwrap();
        assert!(store.exists(path).await.unwrap());
        assert_eq!(store.read(path).await.unwrap().as_deref(), Some("hello"));

        store
            .write(Path::new("docs/files/short/src/main.md"), "main")
            .await
            .unwrap();
        let listed = store.list(Path::new("docs/files/short/src")).await.unwrap();
        assert_eq!(
            listed,
            vec![
                PathBuf::from("docs/files/short/src/lib.md"),
                PathBuf::from("docs/files/short/src/main.md"),
            ]
        );

        // No temp files left behind
        let siblings: Vec<_> = std::fs::read_dir(dir.path().join("docs/files/short/src"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(siblings.is_empty());

        assert!(store.delete(path).await.unwrap());
        assert!(!store.delete(path).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_list_missing_prefix_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(store.list(Path::new("nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_failure_injection() {
        let store = MemoryFileStore::new();
        store.fail_writes_containing("/full/");

        store.write(Path::new("docs/short/a.md"), "ok").await.unwrap();
        let err = store
            .write(Path::new("docs/full/a.md"), "boom")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Filesystem { .. }));
        assert_eq!(store.len(), 1);

        store.clear_failures();
        store.write(Path::new("docs/full/a.md"), "ok").await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_list_is_single_level() {
        let store = MemoryFileStore::new();
        store.write(Path::new("docs/modules/a.json"), "{}").await.unwrap();
        store.write(Path::new("docs/modules/b.json"), "{}").await.unwrap();
        store.write(Path::new("docs/modules/nested/c.json"), "{}").await.unwrap();
        store.write(Path::new("docs/modules.json"), "{}").await.unwrap();

        assert_eq!(
            store.list(Path::new("docs/modules")).await.unwrap(),
            vec![
                PathBuf::from("docs/modules/a.json"),
                PathBuf::from("docs/modules/b.json"),
            ]
        );
    }
}
