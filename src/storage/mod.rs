pub mod file_store;
pub mod marker;
pub mod sync_log;
pub mod tier_store;

pub use file_store::{FileStore, LocalFileStore, MemoryFileStore, SharedFileStore};
pub use sync_log::{SyncLog, SyncLogEntry, SyncLogRecord};
pub use tier_store::{TierStore, TierWrite, WrittenSet};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::types::{Result, SyncError};

/// Load a JSON document; `None` if it does not exist
pub(crate) async fn read_json<T: DeserializeOwned>(
    files: &dyn FileStore,
    path: &Path,
) -> Result<Option<T>> {
    let Some(raw) = files.read(path).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| SyncError::MalformedDocument {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Rewrite a JSON document in full
pub(crate) async fn write_json<T: Serialize>(
    files: &dyn FileStore,
    path: &Path,
    value: &T,
) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    files.write(path, &json).await
}
