use std::sync::Arc;

use blueprint_utils::{BlobKey, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{ProjectStore, StoreError};

/// One question and its answer in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    /// An answered question
    #[must_use]
    pub fn answered(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            kind: "question".to_string(),
            content: question.into(),
            answer: Some(answer.into()),
            status: "completed".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only question/answer log, kept apart from the wizard snapshot
#[derive(Clone)]
pub struct ConversationLog {
    store: Arc<dyn ProjectStore>,
    lock: Arc<Mutex<()>>,
}

impl ConversationLog {
    #[must_use]
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// All entries in append order. Unreadable entries are skipped.
    pub async fn load(&self, project: &ProjectId) -> Result<Vec<ConversationEntry>, StoreError> {
        let entries = match self.store.get_blob(project, BlobKey::ConversationHistory).await? {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => {
                return Err(StoreError::Corrupt {
                    project: project.to_string(),
                    key: BlobKey::ConversationHistory,
                    reason: "expected a JSON array".to_string(),
                });
            }
        };
        Ok(entries
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(project_id = %project, error = %err, "Skipping unreadable conversation entry");
                    None
                }
            })
            .collect())
    }

    /// Append `entry` to the end of the log.
    pub async fn append(&self, project: &ProjectId, entry: ConversationEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut items = match self.store.get_blob(project, BlobKey::ConversationHistory).await? {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let value = serde_json::to_value(&entry).map_err(|err| StoreError::Write {
            project: project.to_string(),
            key: BlobKey::ConversationHistory,
            reason: err.to_string(),
        })?;
        items.push(value);
        self.store
            .set_blob(project, BlobKey::ConversationHistory, Value::Array(items))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = Arc::new(MemoryStore::new());
        let log = ConversationLog::new(store.clone());
        let project = ProjectId::new("p").unwrap();

        log.append(&project, ConversationEntry::answered("What?", "shop"))
            .await
            .unwrap();
        log.append(&project, ConversationEntry::answered("Why?", "learn"))
            .await
            .unwrap();

        let entries = log.load(&project).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "What?");
        assert_eq!(entries[1].answer.as_deref(), Some("learn"));
        assert_ne!(entries[0].id, entries[1].id);

        let raw = store
            .get_blob(&project, BlobKey::ConversationHistory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw[0]["type"], "question");
        assert_eq!(raw[0]["status"], "completed");
    }

    #[tokio::test]
    async fn test_independent_of_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let log = ConversationLog::new(store.clone());
        let project = ProjectId::new("p").unwrap();
        log.append(&project, ConversationEntry::answered("What?", "shop"))
            .await
            .unwrap();

        store
            .set_blob(&project, BlobKey::DesignState, json!(null))
            .await
            .unwrap();

        assert_eq!(log.load(&project).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_array_log_is_corrupt() {
        let store = Arc::new(MemoryStore::new());
        let log = ConversationLog::new(store.clone());
        let project = ProjectId::new("p").unwrap();
        store
            .set_blob(&project, BlobKey::ConversationHistory, json!({"x": 1}))
            .await
            .unwrap();
        assert!(log.load(&project).await.is_err());
    }
}
