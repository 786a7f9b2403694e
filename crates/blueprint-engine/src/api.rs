//! Client-side view of the design service.
//!
//! The wizard talks to a [`DesignApi`], either in-process
//! ([`LocalDesignApi`]) or over HTTP. [`ApiBridge`] adapts any `DesignApi`
//! to the store and poller traits so the conversation log and the poll
//! fallback work the same way over both transports.

use std::sync::Arc;

use async_trait::async_trait;
use blueprint_jobs::{JobId, JobSnapshot, JobStatusSource, PollError};
use blueprint_llm::{LlmError, TextStream};
use blueprint_steps::{Answers, FinalDecisions, ProjectOverview, StepContext, ValidationReport};
use blueprint_store::{ConversationEntry, JobMirror, MirrorEntry, ProjectStore, StoreError};
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use blueprint_utils::{BlobKey, ProjectId, StepKind};
use serde_json::Value;
use thiserror::Error;

use crate::error::ServiceError;
use crate::service::DesignService;
use crate::wire::{DecisionsRequest, LaunchRequest, StreamRequest, ValidateRequest};

/// Failure of a call to the design service
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The service answered with a non-success status
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Rejected {
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

impl UserFriendlyError for ApiError {
    fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::Transport(msg) => format!("Could not reach the design service: {msg}"),
            Self::InvalidResponse(msg) => format!("The design service sent an unexpected response: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        None
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec!["Check that 'blueprint serve' is running".to_string()],
            Self::Rejected { status: 503, .. } => vec!["Retry in a few seconds".to_string()],
            _ => vec!["Retry the step".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Rejected { status: 400..=499, .. } => ErrorCategory::Validation,
            Self::Rejected { status: 503, .. } => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::JobExecution,
        }
    }
}

/// Operations the wizard needs from the design service
#[async_trait]
pub trait DesignApi: Send + Sync {
    async fn launch(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<JobId, ApiError>;

    /// Live status, `None` when the service does not know the job
    async fn job_status(&self, job_id: &JobId, project: &ProjectId) -> Result<Option<JobSnapshot>, ApiError>;

    async fn stream_step(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<TextStream, ApiError>;

    async fn validate(&self, project: &ProjectId, overview: &ProjectOverview) -> Result<ValidationReport, ApiError>;

    async fn extract_decisions(
        &self,
        project: &ProjectId,
        history: &[ConversationEntry],
    ) -> Result<FinalDecisions, ApiError>;

    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, ApiError>;

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), ApiError>;
}

/// Calls a [`DesignService`] in the same process
#[derive(Clone)]
pub struct LocalDesignApi {
    service: Arc<DesignService>,
    user: Option<String>,
}

impl LocalDesignApi {
    #[must_use]
    pub fn new(service: Arc<DesignService>, user: Option<String>) -> Self {
        Self { service, user }
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[async_trait]
impl DesignApi for LocalDesignApi {
    async fn launch(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<JobId, ApiError> {
        let request = LaunchRequest::new(project, step, answers.clone(), context.clone());
        Ok(self.service.launch(self.user(), request).await?.job_id)
    }

    async fn job_status(&self, job_id: &JobId, project: &ProjectId) -> Result<Option<JobSnapshot>, ApiError> {
        match self
            .service
            .poll(self.user(), job_id.as_str(), Some(project.as_str()))
            .await
        {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn stream_step(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<TextStream, ApiError> {
        let request = StreamRequest::new(project, step, answers.clone(), context.clone());
        Ok(self.service.stream(self.user(), request).await?)
    }

    async fn validate(&self, project: &ProjectId, overview: &ProjectOverview) -> Result<ValidationReport, ApiError> {
        let request = ValidateRequest {
            project_id: Some(project.to_string()),
            overview: overview.clone(),
        };
        Ok(self.service.validate(self.user(), request).await?)
    }

    async fn extract_decisions(
        &self,
        project: &ProjectId,
        history: &[ConversationEntry],
    ) -> Result<FinalDecisions, ApiError> {
        let request = DecisionsRequest {
            project_id: Some(project.to_string()),
            conversation_history: Some(history.to_vec()),
        };
        Ok(self.service.extract_decisions(self.user(), request).await?)
    }

    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, ApiError> {
        Ok(self
            .service
            .get_blob(self.user(), project.as_str(), key.as_str())
            .await?)
    }

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), ApiError> {
        Ok(self
            .service
            .set_blob(self.user(), project.as_str(), key.as_str(), value)
            .await?)
    }
}

/// Adapts a [`DesignApi`] to [`ProjectStore`] and [`JobStatusSource`]
#[derive(Clone)]
pub struct ApiBridge {
    api: Arc<dyn DesignApi>,
}

impl ApiBridge {
    #[must_use]
    pub fn new(api: Arc<dyn DesignApi>) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn DesignApi> {
        &self.api
    }
}

#[async_trait]
impl ProjectStore for ApiBridge {
    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, StoreError> {
        self.api
            .get_blob(project, key)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), StoreError> {
        self.api
            .set_blob(project, key, value)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

#[async_trait]
impl JobStatusSource for ApiBridge {
    async fn job_status(&self, job_id: &JobId, project_id: &ProjectId) -> Result<Option<JobSnapshot>, PollError> {
        self.api
            .job_status(job_id, project_id)
            .await
            .map_err(|err| PollError::Source(err.to_string()))
    }

    async fn mirrored_status(&self, job_id: &JobId, project_id: &ProjectId) -> Result<Option<MirrorEntry>, PollError> {
        JobMirror::new(Arc::new(self.clone()))
            .lookup(project_id, job_id.as_str())
            .await
            .map_err(|err| PollError::Source(err.to_string()))
    }
}

/// Collect a text stream into one string, failing on the first error.
pub async fn collect_stream(mut stream: TextStream) -> Result<String, LlmError> {
    use futures::StreamExt;

    let mut buffer = String::new();
    while let Some(fragment) = stream.next().await {
        buffer.push_str(&fragment?);
    }
    Ok(buffer)
}
