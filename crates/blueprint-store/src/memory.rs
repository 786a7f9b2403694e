use std::collections::HashMap;

use async_trait::async_trait;
use blueprint_utils::{BlobKey, ProjectId};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{ProjectStore, StoreError};

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<(ProjectId, BlobKey), Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, StoreError> {
        Ok(self.blobs.read().await.get(&(project.clone(), key)).cloned())
    }

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), StoreError> {
        self.blobs.write().await.insert((project.clone(), key), value);
        Ok(())
    }
}
