//! Request and response bodies shared by the HTTP server and its clients.
//!
//! Required request fields are optional at the serde level so a missing
//! field becomes a 400 with a clear message instead of a decode failure.

use blueprint_jobs::JobId;
use blueprint_steps::{Answers, FinalDecisions, ProjectOverview, StepContext};
use blueprint_store::ConversationEntry;
use blueprint_utils::{JobStatus, ProjectId, StepKind};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub use blueprint_jobs::JobSnapshot as PollResponse;

/// `POST /api/design/jobs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Answers>,
    #[serde(default)]
    pub context: StepContext,
}

/// A launch request with every required field present and valid
#[derive(Debug, Clone)]
pub struct CheckedLaunch {
    pub project_id: ProjectId,
    pub step: StepKind,
    pub answers: Answers,
    pub context: StepContext,
}

impl LaunchRequest {
    #[must_use]
    pub fn new(project_id: &ProjectId, step: StepKind, answers: Answers, context: StepContext) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            step: Some(step.as_str().to_string()),
            answers: Some(answers),
            context,
        }
    }

    pub fn check(self) -> Result<CheckedLaunch, ServiceError> {
        let (Some(project_id), Some(step), Some(answers)) = (self.project_id, self.step, self.answers) else {
            return Err(ServiceError::BadRequest("Missing required fields".to_string()));
        };
        Ok(CheckedLaunch {
            project_id: parse_project(&project_id)?,
            step: parse_step(&step)?,
            answers,
            context: self.context,
        })
    }
}

/// `{jobId, status: "pending"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// `POST /api/design/stream`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub context: StepContext,
}

impl StreamRequest {
    #[must_use]
    pub fn new(project_id: &ProjectId, step: StepKind, answers: Answers, context: StepContext) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            step: Some(step.as_str().to_string()),
            answers,
            context,
        }
    }
}

/// One server-sent event of a streamed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Text { text: String },
    Done { done: bool },
    Error { error: String },
}

/// `POST /api/design/validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub overview: ProjectOverview,
}

/// `POST /api/design/extract-decisions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ConversationEntry>>,
}

/// `{finalDecisions}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionsResponse {
    pub final_decisions: FinalDecisions,
}

/// `{ "error": "..." }` body of every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn parse_project(raw: &str) -> Result<ProjectId, ServiceError> {
    ProjectId::new(raw).map_err(|err| ServiceError::BadRequest(format!("Invalid projectId: {err}")))
}

pub(crate) fn parse_step(raw: &str) -> Result<StepKind, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::BadRequest(format!("Invalid step: {raw}")))
}
