//! Client-side wait for a job's terminal status.
//!
//! Two-tier lookup: the live registry is polled at a fixed interval up to an
//! attempt ceiling, then the durable mirror is read once. The poller never
//! cancels the job; dropping the future simply stops waiting.

use std::time::Duration;

use async_trait::async_trait;
use blueprint_config::JobsConfig;
use blueprint_store::MirrorEntry;
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use blueprint_utils::{JobStatus, ProjectId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{JobId, JobSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The job reached `failed`
    #[error("{0}")]
    JobFailed(String),

    #[error("Job {job_id} is unknown to the server")]
    UnknownJob { job_id: JobId },

    #[error("Job {job_id} did not finish after {attempts} status checks")]
    TimedOut { job_id: JobId, attempts: u32 },

    /// The status source itself failed (network, server error)
    #[error("Status check failed: {0}")]
    Source(String),
}

impl UserFriendlyError for PollError {
    fn user_message(&self) -> String {
        match self {
            Self::JobFailed(msg) => format!("The step failed: {msg}"),
            Self::UnknownJob { .. } => "The step was lost, probably because the server restarted".to_string(),
            Self::TimedOut { .. } => "The step is taking too long".to_string(),
            Self::Source(msg) => format!("Could not check on the step: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::TimedOut { .. } => {
                Some("The job may still finish on the server; its result is kept.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Retry the step".to_string()]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::JobExecution
    }
}

/// Where the poller reads job status from
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Live status; `None` when the registry does not know the job.
    async fn job_status(&self, job_id: &JobId, project_id: &ProjectId) -> Result<Option<JobSnapshot>, PollError>;

    /// Durable mirror entry of the job, if any.
    async fn mirrored_status(&self, job_id: &JobId, project_id: &ProjectId) -> Result<Option<MirrorEntry>, PollError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSettings {
    #[must_use]
    pub fn from_config(jobs: &JobsConfig) -> Self {
        Self {
            interval: jobs.poll_interval(),
            max_attempts: jobs.max_poll_attempts,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&JobsConfig::default())
    }
}

fn terminal_outcome(
    status: JobStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
) -> Option<Result<serde_json::Value, PollError>> {
    match status {
        JobStatus::Completed => Some(Ok(result.unwrap_or(serde_json::Value::Null))),
        JobStatus::Failed => Some(Err(PollError::JobFailed(
            error.unwrap_or_else(|| "job failed".to_string()),
        ))),
        JobStatus::Pending | JobStatus::Processing => None,
    }
}

/// Wait for `job_id` to reach a terminal status and return its result.
pub async fn await_job<S>(
    source: &S,
    job_id: &JobId,
    project_id: &ProjectId,
    settings: PollSettings,
) -> Result<serde_json::Value, PollError>
where
    S: JobStatusSource + ?Sized,
{
    for attempt in 1..=settings.max_attempts {
        match source.job_status(job_id, project_id).await? {
            Some(snapshot) => {
                if let Some(outcome) = terminal_outcome(snapshot.status, snapshot.result, snapshot.error) {
                    debug!(job_id = %job_id, attempt, "Job reached terminal status");
                    return outcome;
                }
            }
            None => {
                debug!(job_id = %job_id, attempt, "Job unknown to registry, checking mirror");
                return match read_mirror(source, job_id, project_id).await {
                    Some(outcome) => outcome,
                    None => Err(PollError::UnknownJob {
                        job_id: job_id.clone(),
                    }),
                };
            }
        }
        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }

    debug!(job_id = %job_id, attempts = settings.max_attempts, "Poll ceiling reached, checking mirror");
    read_mirror(source, job_id, project_id)
        .await
        .unwrap_or_else(|| {
            Err(PollError::TimedOut {
                job_id: job_id.clone(),
                attempts: settings.max_attempts,
            })
        })
}

async fn read_mirror<S>(
    source: &S,
    job_id: &JobId,
    project_id: &ProjectId,
) -> Option<Result<serde_json::Value, PollError>>
where
    S: JobStatusSource + ?Sized,
{
    match source.mirrored_status(job_id, project_id).await {
        Ok(Some(entry)) => terminal_outcome(entry.status, entry.result, entry.error),
        Ok(None) => None,
        Err(err) => {
            warn!(job_id = %job_id, error = %err, "Job mirror read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports `processing` for the first `busy_for` checks, then `live`.
    struct FakeSource {
        busy_for: u32,
        live: Option<JobStatus>,
        mirror: Option<MirrorEntry>,
        status_calls: AtomicU32,
        mirror_calls: AtomicU32,
        mirror_seen_at: Mutex<Option<u32>>,
    }

    impl FakeSource {
        fn new(busy_for: u32, live: Option<JobStatus>, mirror: Option<MirrorEntry>) -> Self {
            Self {
                busy_for,
                live,
                mirror,
                status_calls: AtomicU32::new(0),
                mirror_calls: AtomicU32::new(0),
                mirror_seen_at: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl JobStatusSource for FakeSource {
        async fn job_status(&self, job_id: &JobId, _: &ProjectId) -> Result<Option<JobSnapshot>, PollError> {
            let n = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if n <= self.busy_for {
                JobStatus::Processing
            } else {
                match self.live {
                    Some(status) => status,
                    None => return Ok(None),
                }
            };
            Ok(Some(JobSnapshot {
                job_id: job_id.clone(),
                status,
                result: (status == JobStatus::Completed).then(|| json!({"live": true})),
                error: (status == JobStatus::Failed).then(|| "model refused".to_string()),
                updated_at: Utc::now(),
            }))
        }

        async fn mirrored_status(&self, _: &JobId, _: &ProjectId) -> Result<Option<MirrorEntry>, PollError> {
            self.mirror_calls.fetch_add(1, Ordering::SeqCst);
            *self.mirror_seen_at.lock().unwrap() = Some(self.status_calls.load(Ordering::SeqCst));
            Ok(self.mirror.clone())
        }
    }

    fn ids() -> (JobId, ProjectId) {
        (JobId::parse("job_1").unwrap(), ProjectId::new("p").unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_result_on_completion() {
        let source = FakeSource::new(3, Some(JobStatus::Completed), None);
        let (job, project) = ids();

        let result = await_job(&source, &job, &project, PollSettings::default()).await;

        assert_eq!(result.unwrap(), json!({"live": true}));
        assert_eq!(source.status_calls.load(Ordering::SeqCst), 4);
        assert_eq!(source.mirror_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raises_stored_error() {
        let source = FakeSource::new(0, Some(JobStatus::Failed), None);
        let (job, project) = ids();
        let err = await_job(&source, &job, &project, PollSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err, PollError::JobFailed("model refused".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_falls_back_to_mirror() {
        let mirror = MirrorEntry::completed(json!({"from": "mirror"}), Utc::now());
        let source = FakeSource::new(u32::MAX, None, Some(mirror));
        let (job, project) = ids();
        let started = tokio::time::Instant::now();

        let result = await_job(&source, &job, &project, PollSettings::default()).await;

        assert_eq!(result.unwrap(), json!({"from": "mirror"}));
        assert_eq!(source.status_calls.load(Ordering::SeqCst), 120);
        assert_eq!(*source.mirror_seen_at.lock().unwrap(), Some(120));
        // 119 gaps between 120 checks; no wait after the last one.
        assert!(started.elapsed() >= Duration::from_secs(119));
        assert!(started.elapsed() < Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mirror_read_right_after_last_check() {
        let mirror = MirrorEntry::completed(json!({"from": "mirror"}), Utc::now());
        let source = FakeSource::new(u32::MAX, None, Some(mirror));
        let (job, project) = ids();
        let settings = PollSettings {
            interval: Duration::from_secs(30),
            max_attempts: 1,
        };
        let started = tokio::time::Instant::now();

        let result = await_job(&source, &job, &project, settings).await;

        assert_eq!(result.unwrap(), json!({"from": "mirror"}));
        assert_eq!(*source.mirror_seen_at.lock().unwrap(), Some(1));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_without_mirror_times_out() {
        let source = FakeSource::new(u32::MAX, None, None);
        let (job, project) = ids();
        let settings = PollSettings {
            interval: Duration::from_millis(10),
            max_attempts: 5,
        };

        let err = await_job(&source, &job, &project, settings).await.unwrap_err();

        assert!(matches!(err, PollError::TimedOut { attempts: 5, .. }));
        assert_eq!(source.mirror_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_consults_mirror_immediately() {
        let mirror = MirrorEntry::failed("evicted but failed", Utc::now());
        let source = FakeSource::new(0, None, Some(mirror));
        let (job, project) = ids();

        let err = await_job(&source, &job, &project, PollSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err, PollError::JobFailed("evicted but failed".to_string()));
        assert_eq!(source.status_calls.load(Ordering::SeqCst), 1);

        let lost = FakeSource::new(0, None, None);
        assert!(matches!(
            await_job(&lost, &job, &project, PollSettings::default()).await,
            Err(PollError::UnknownJob { .. })
        ));
    }
}
