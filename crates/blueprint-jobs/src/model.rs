use std::fmt;

use blueprint_utils::{JobStatus, ProjectId, StepKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque job identifier, `job_<32 hex digits>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job id {0:?}")]
pub struct InvalidJobId(pub String);

impl JobId {
    /// Fresh random id; never collides in practice
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("job_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Accept an id received from a client.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidJobId> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= 128
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid { Ok(Self(raw)) } else { Err(InvalidJobId(raw)) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

/// One asynchronous execution of a design step
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub step: StepKind,
    pub status: JobStatus,
    /// Present only when `completed`
    pub result: Option<serde_json::Value>,
    /// Present only when `failed`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    #[must_use]
    pub fn pending(id: JobId, project_id: ProjectId, step: StepKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            step,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// What a poll returns: `{jobId, status, result?, error?, updatedAt}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Forward move requested by the executor or launcher
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Processing,
    Completed(serde_json::Value),
    Failed(String),
}

impl JobUpdate {
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Processing => JobStatus::Processing,
            Self::Completed(_) => JobStatus::Completed,
            Self::Failed(_) => JobStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct_and_valid() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("job_"));
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(JobId::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn test_parse_rejects_odd_ids() {
        assert!(JobId::parse("").is_err());
        assert!(JobId::parse("job/../x").is_err());
        assert!(serde_json::from_str::<JobId>("\"a b\"").is_err());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let job = Job::pending(
            JobId::parse("job_1").unwrap(),
            ProjectId::new("p").unwrap(),
            StepKind::Analyze,
        );
        let value = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(value["jobId"], "job_1");
        assert_eq!(value["status"], "pending");
        assert!(value.get("result").is_none());
        assert!(value.get("updatedAt").is_some());
    }
}
