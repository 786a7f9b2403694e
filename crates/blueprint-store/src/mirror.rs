//! Durable per-job status map stored under `design_job_state`.
//!
//! The blob is a JSON object keyed by job id. Updates are read-modify-write,
//! so they are serialized through a process-wide lock; a terminal entry is
//! never overwritten.

use std::sync::Arc;

use blueprint_utils::{BlobKey, JobStatus, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{ProjectStore, StoreError};

/// One job's mirrored outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEntry {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MirrorEntry {
    #[must_use]
    pub fn completed(result: Value, updated_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(result),
            error: None,
            updated_at,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: None,
            error: Some(error.into()),
            updated_at,
        }
    }
}

/// Read and update the per-job status map of a project
#[derive(Clone)]
pub struct JobMirror {
    store: Arc<dyn ProjectStore>,
    lock: Arc<Mutex<()>>,
}

impl JobMirror {
    #[must_use]
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_map(&self, project: &ProjectId) -> Result<Map<String, Value>, StoreError> {
        match self.store.get_blob(project, BlobKey::DesignJobState).await? {
            Some(Value::Object(map)) => Ok(map),
            Some(Value::Null) | None => Ok(Map::new()),
            Some(other) => {
                warn!(project_id = %project, kind = ?other, "Job mirror is not an object, starting over");
                Ok(Map::new())
            }
        }
    }

    /// Record `entry` for `job_id`.
    ///
    /// Returns `false` without writing when the job already has a terminal
    /// entry.
    pub async fn record(&self, project: &ProjectId, job_id: &str, entry: MirrorEntry) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map(project).await?;

        if let Some(existing) = map.get(job_id)
            && let Ok(existing) = serde_json::from_value::<MirrorEntry>(existing.clone())
            && existing.status.is_terminal()
        {
            return Ok(false);
        }

        let value = serde_json::to_value(&entry).map_err(|err| StoreError::Write {
            project: project.to_string(),
            key: BlobKey::DesignJobState,
            reason: err.to_string(),
        })?;
        map.insert(job_id.to_string(), value);
        self.store
            .set_blob(project, BlobKey::DesignJobState, Value::Object(map))
            .await?;
        Ok(true)
    }

    /// Look up the mirrored entry of `job_id`.
    pub async fn lookup(&self, project: &ProjectId, job_id: &str) -> Result<Option<MirrorEntry>, StoreError> {
        let map = self.load_map(project).await?;
        map.get(job_id)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| StoreError::Corrupt {
                project: project.to_string(),
                key: BlobKey::DesignJobState,
                reason: format!("entry {job_id}: {err}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde_json::json;

    fn mirror() -> (Arc<MemoryStore>, JobMirror) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), JobMirror::new(store))
    }

    #[tokio::test]
    async fn test_record_and_lookup() {
        let (store, mirror) = mirror();
        let project = ProjectId::new("p").unwrap();

        let written = mirror
            .record(&project, "job_1", MirrorEntry::completed(json!({"ok": true}), Utc::now()))
            .await
            .unwrap();

        assert!(written);
        let entry = mirror.lookup(&project, "job_1").await.unwrap().unwrap();
        assert_eq!(entry.status, JobStatus::Completed);
        assert_eq!(entry.result, Some(json!({"ok": true})));

        let raw = store.get_blob(&project, BlobKey::DesignJobState).await.unwrap().unwrap();
        assert_eq!(raw["job_1"]["status"], "completed");
        assert!(raw["job_1"].get("error").is_none());
        assert!(raw["job_1"].get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn test_terminal_entry_is_final() {
        let (_, mirror) = mirror();
        let project = ProjectId::new("p").unwrap();
        mirror
            .record(&project, "job_1", MirrorEntry::failed("boom", Utc::now()))
            .await
            .unwrap();

        let written = mirror
            .record(&project, "job_1", MirrorEntry::completed(json!(1), Utc::now()))
            .await
            .unwrap();

        assert!(!written);
        let entry = mirror.lookup(&project, "job_1").await.unwrap().unwrap();
        assert_eq!(entry.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_concurrent_records_are_all_kept() {
        let (_, mirror) = mirror();
        let project = ProjectId::new("p").unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let mirror = mirror.clone();
            let project = project.clone();
            handles.push(tokio::spawn(async move {
                mirror
                    .record(&project, &format!("job_{i}"), MirrorEntry::completed(json!(i), Utc::now()))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..16 {
            assert!(mirror.lookup(&project, &format!("job_{i}")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_unknown_job_and_bad_entry() {
        let (store, mirror) = mirror();
        let project = ProjectId::new("p").unwrap();
        assert!(mirror.lookup(&project, "nope").await.unwrap().is_none());

        store
            .set_blob(&project, BlobKey::DesignJobState, json!({"job_x": {"status": "weird"}}))
            .await
            .unwrap();
        assert!(matches!(
            mirror.lookup(&project, "job_x").await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
