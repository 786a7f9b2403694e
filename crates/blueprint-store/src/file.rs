use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use blueprint_utils::atomic_write::write_json_atomic;
use blueprint_utils::{BlobKey, ProjectId};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::debug;

use crate::{ProjectStore, StoreError};

/// File-backed store laid out as `<root>/<project>/<key>.json`.
///
/// Each blob is replaced with an atomic rename, so a crash mid-write leaves
/// the previous document intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at a platform path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when the path is not valid UTF-8.
    pub fn from_path(root: PathBuf) -> Result<Self, StoreError> {
        Utf8PathBuf::from_path_buf(root)
            .map(Self::new)
            .map_err(|p| StoreError::Unavailable(format!("storage dir is not UTF-8: {}", p.display())))
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn blob_path(&self, project: &ProjectId, key: BlobKey) -> Utf8PathBuf {
        // ProjectId only admits [A-Za-z0-9_-], so it is safe as a directory name
        self.root
            .join(project.as_str())
            .join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl ProjectStore for FileStore {
    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, StoreError> {
        let path = self.blob_path(project, key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Read {
                    project: project.to_string(),
                    key,
                    reason: format!("{path}: {err}"),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                project: project.to_string(),
                key,
                reason: format!("{path}: {err}"),
            })
    }

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), StoreError> {
        let path = self.blob_path(project, key);
        let write_path = path.clone();
        let outcome = tokio::task::spawn_blocking(move || write_json_atomic(&write_path, &value))
            .await
            .map_err(|err| StoreError::Write {
                project: project.to_string(),
                key,
                reason: format!("write task aborted: {err}"),
            })?;

        let result = outcome.map_err(|err| StoreError::Write {
            project: project.to_string(),
            key,
            reason: format!("{err:#}"),
        })?;
        debug!(
            path = %path,
            bytes = result.bytes_written,
            cross_fs = result.used_cross_filesystem_fallback,
            "Blob written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::from_path(dir.path().join("state")).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_and_layout() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let project = ProjectId::new("shop").unwrap();

        store
            .set_blob(&project, BlobKey::DesignState, json!({"step": "analyzing"}))
            .await
            .unwrap();

        let on_disk = dir.path().join("state").join("shop").join("design_state.json");
        assert!(on_disk.exists());
        assert_eq!(
            store.get_blob(&project, BlobKey::DesignState).await.unwrap(),
            Some(json!({"step": "analyzing"}))
        );
    }

    #[tokio::test]
    async fn test_missing_blob_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let project = ProjectId::new("shop").unwrap();
        assert!(store.get_blob(&project, BlobKey::DesignJobState).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_blob_reported() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let project = ProjectId::new("shop").unwrap();
        let path = dir.path().join("state").join("shop");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("design_state.json"), "{not json").unwrap();

        let err = store.get_blob(&project, BlobKey::DesignState).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { key: BlobKey::DesignState, .. }));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let project = ProjectId::new("shop").unwrap();
        store
            .set_blob(&project, BlobKey::DesignState, json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        store
            .set_blob(&project, BlobKey::DesignState, json!({"a": 3}))
            .await
            .unwrap();
        assert_eq!(
            store.get_blob(&project, BlobKey::DesignState).await.unwrap(),
            Some(json!({"a": 3}))
        );
    }
}
