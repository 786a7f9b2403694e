//! Server-side entry point: register a job and hand it to the worker pool.

use std::sync::Arc;

use blueprint_steps::{Answers, StepContext};
use blueprint_store::{AccessError, ProjectAccess};
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use blueprint_utils::{ProjectId, StepKind};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use crate::executor::JobRequest;
use crate::model::{Job, JobId, JobUpdate};
use crate::store::{JobStore, JobStoreError};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Job registration failed: {0}")]
    Registration(#[from] JobStoreError),

    #[error("Job queue is full ({capacity} waiting jobs)")]
    QueueFull { capacity: usize },

    #[error("Job workers are shutting down")]
    ShuttingDown,
}

impl UserFriendlyError for LaunchError {
    fn user_message(&self) -> String {
        match self {
            Self::Access(err) => format!("Not allowed to start a step: {err}"),
            Self::Registration(err) => format!("Could not register the step: {err}"),
            Self::QueueFull { .. } => "Too many steps are running right now".to_string(),
            Self::ShuttingDown => "The server is shutting down".to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::QueueFull { capacity } => Some(format!(
                "At most {capacity} steps can wait for a worker at once."
            )),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::QueueFull { .. } | Self::ShuttingDown => {
                vec!["Retry the step in a few seconds".to_string()]
            }
            Self::Access(_) => vec!["Sign in as the project's owner".to_string()],
            Self::Registration(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Access(_) => ErrorCategory::Validation,
            Self::QueueFull { .. } => ErrorCategory::ResourceLimits,
            Self::Registration(_) | Self::ShuttingDown => ErrorCategory::JobExecution,
        }
    }
}

/// Starts jobs without waiting for them
#[derive(Clone)]
pub struct JobLauncher {
    jobs: Arc<JobStore>,
    queue: mpsc::Sender<JobRequest>,
    access: Arc<dyn ProjectAccess>,
    capacity: usize,
}

impl JobLauncher {
    #[must_use]
    pub fn new(
        jobs: Arc<JobStore>,
        queue: mpsc::Sender<JobRequest>,
        access: Arc<dyn ProjectAccess>,
    ) -> Self {
        let capacity = queue.max_capacity();
        Self {
            jobs,
            queue,
            access,
            capacity,
        }
    }

    /// Register a `pending` job for `step` and queue it.
    ///
    /// Returns as soon as the job is queued. When the queue is full the job
    /// is marked `failed` and the launch fails.
    pub async fn launch(
        &self,
        user: Option<&str>,
        project_id: ProjectId,
        step: StepKind,
        answers: Answers,
        context: StepContext,
    ) -> Result<JobId, LaunchError> {
        self.access.authorize(user, &project_id).await?;

        let job_id = JobId::generate();
        self.jobs
            .register(Job::pending(job_id.clone(), project_id.clone(), step))
            .await?;

        let request = JobRequest {
            job_id: job_id.clone(),
            project_id: project_id.clone(),
            step,
            answers,
            context,
        };

        let refused = match self.queue.try_send(request) {
            Ok(()) => None,
            Err(TrySendError::Full(_)) => Some(LaunchError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Some(LaunchError::ShuttingDown),
        };
        if let Some(err) = refused {
            warn!(job_id = %job_id, project_id = %project_id, step = %step, error = %err, "Launch refused");
            if let Err(mark_err) = self
                .jobs
                .transition(&job_id, JobUpdate::Failed(err.to_string()))
                .await
            {
                warn!(job_id = %job_id, error = %mark_err, "Could not mark refused job as failed");
            }
            return Err(err);
        }

        info!(job_id = %job_id, project_id = %project_id, step = %step, "Job launched");
        Ok(job_id)
    }
}
