//! Runs one design step for one job, exactly once.

use std::sync::Arc;
use std::time::Instant;

use blueprint_llm::{LlmBackend, LlmError};
use blueprint_steps::{Answers, CallSettings, StepContext, parse_step_output};
use blueprint_store::{JobMirror, MirrorEntry};
use blueprint_utils::logging::{job_span, log_job_complete, log_job_error, log_job_start};
use blueprint_utils::redaction::redact_secrets;
use blueprint_utils::{JobStatus, ProjectId, StepKind};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, warn};

use crate::model::{JobId, JobSnapshot, JobUpdate};
use crate::store::{JobStore, TransitionOutcome};

/// Everything needed to run a queued job
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub project_id: ProjectId,
    pub step: StepKind,
    pub answers: Answers,
    pub context: StepContext,
}

pub struct JobExecutor {
    backend: Arc<dyn LlmBackend>,
    settings: CallSettings,
    jobs: Arc<JobStore>,
    mirror: JobMirror,
    mirror_writes: TaskTracker,
}

impl JobExecutor {
    #[must_use]
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        settings: CallSettings,
        jobs: Arc<JobStore>,
        mirror: JobMirror,
    ) -> Self {
        Self {
            backend,
            settings,
            jobs,
            mirror,
            mirror_writes: TaskTracker::new(),
        }
    }

    /// Run `request` to a terminal status and return it.
    ///
    /// The gateway is called once; any failure becomes a `failed` job. A job
    /// that is already terminal (for instance failed at launch) is not run.
    pub async fn execute(&self, request: JobRequest) -> JobStatus {
        let span = job_span(request.job_id.as_str(), request.project_id.as_str(), request.step.as_str());
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, request: JobRequest) -> JobStatus {
        let JobRequest {
            job_id,
            project_id,
            step,
            answers,
            context,
        } = request;

        match self.jobs.transition(&job_id, JobUpdate::Processing).await {
            Ok(TransitionOutcome::Applied(_)) => {}
            Ok(TransitionOutcome::IgnoredTerminal(status)) => return status,
            Err(err) => {
                warn!(error = %err, "Job vanished before it could start");
                return JobStatus::Failed;
            }
        }

        log_job_start(job_id.as_str(), project_id.as_str(), step.as_str());
        let started = Instant::now();

        let update = match self.run_step(&project_id, step, &answers, &context).await {
            Ok(result) => {
                log_job_complete(job_id.as_str(), step.as_str(), started.elapsed().as_millis());
                JobUpdate::Completed(result)
            }
            Err(message) => {
                log_job_error(job_id.as_str(), step.as_str(), &message, started.elapsed().as_millis());
                JobUpdate::Failed(redact_secrets(&message))
            }
        };

        match self.jobs.transition(&job_id, update).await {
            Ok(TransitionOutcome::Applied(snapshot)) => {
                let status = snapshot.status;
                self.mirror_outcome(project_id, snapshot);
                status
            }
            Ok(TransitionOutcome::IgnoredTerminal(status)) => status,
            Err(err) => {
                warn!(error = %err, "Could not record job outcome");
                JobStatus::Failed
            }
        }
    }

    async fn run_step(
        &self,
        project_id: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<serde_json::Value, String> {
        let inv = self.settings.step_invocation(project_id, step, answers, context);
        let timeout = self.settings.timeout;

        let raw = match tokio::time::timeout(timeout, self.backend.invoke(inv)).await {
            Ok(Ok(result)) => {
                debug!(
                    provider = %result.provider,
                    model = %result.model_used,
                    tokens_output = ?result.tokens_output,
                    "Step response received"
                );
                result.raw_response
            }
            Ok(Err(err)) => return Err(err.to_string()),
            Err(_) => return Err(LlmError::Timeout { duration: timeout }.to_string()),
        };

        parse_step_output(step, &raw).map_err(|err| format!("Could not read {step} output: {err}"))
    }

    /// Copy the terminal outcome into the durable mirror without waiting.
    fn mirror_outcome(&self, project_id: ProjectId, snapshot: JobSnapshot) {
        let entry = match snapshot.status {
            JobStatus::Completed => MirrorEntry::completed(
                snapshot.result.unwrap_or(serde_json::Value::Null),
                snapshot.updated_at,
            ),
            _ => MirrorEntry::failed(snapshot.error.unwrap_or_default(), snapshot.updated_at),
        };
        let mirror = self.mirror.clone();
        let job_id = snapshot.job_id;
        self.mirror_writes.spawn(
            async move {
                if let Err(err) = mirror.record(&project_id, job_id.as_str(), entry).await {
                    warn!(error = %err, "Job mirror write failed");
                }
            }
            .in_current_span(),
        );
    }

    /// Wait until every mirror write started so far has finished.
    pub async fn flush_mirror_writes(&self) {
        self.mirror_writes.close();
        self.mirror_writes.wait().await;
        self.mirror_writes.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;
    use blueprint_llm::{ScriptedBackend, ScriptedReply};
    use blueprint_store::MemoryStore;
    use std::time::Duration;

    struct Harness {
        executor: JobExecutor,
        jobs: Arc<JobStore>,
        mirror: JobMirror,
        project: ProjectId,
    }

    fn harness(backend: ScriptedBackend) -> Harness {
        let jobs = Arc::new(JobStore::new());
        let mirror = JobMirror::new(Arc::new(MemoryStore::new()));
        let settings = CallSettings {
            timeout: Duration::from_secs(5),
            ..CallSettings::default()
        };
        Harness {
            executor: JobExecutor::new(Arc::new(backend), settings, jobs.clone(), mirror.clone()),
            jobs,
            mirror,
            project: ProjectId::new("p").unwrap(),
        }
    }

    async fn request(h: &Harness, step: StepKind) -> JobRequest {
        let job_id = JobId::generate();
        h.jobs
            .register(Job::pending(job_id.clone(), h.project.clone(), step))
            .await
            .unwrap();
        JobRequest {
            job_id,
            project_id: h.project.clone(),
            step,
            answers: Answers::new(),
            context: StepContext::default(),
        }
    }

    #[tokio::test]
    async fn test_success_completes_and_mirrors() {
        let backend = ScriptedBackend::new().with_reply(
            "analyze",
            ScriptedReply::text("Sure!\n```json\n{\"projectType\":\"shop\",\"questions\":[\"q1\",\"q2\"]}\n```"),
        );
        let h = harness(backend);
        let req = request(&h, StepKind::Analyze).await;
        let id = req.job_id.clone();

        let status = h.executor.execute(req).await;
        h.executor.flush_mirror_writes().await;

        assert_eq!(status, JobStatus::Completed);
        let job = h.jobs.get(&id).await.unwrap();
        assert_eq!(job.result.unwrap()["projectType"], "shop");
        let mirrored = h.mirror.lookup(&h.project, id.as_str()).await.unwrap().unwrap();
        assert_eq!(mirrored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_truncated_output_is_repaired() {
        let backend = ScriptedBackend::new().with_reply(
            "final",
            ScriptedReply::text(r#"{"goal": "x", "summary": "s", "features": ["a","b""#),
        );
        let h = harness(backend);
        let req = request(&h, StepKind::Final).await;
        let id = req.job_id.clone();

        assert_eq!(h.executor.execute(req).await, JobStatus::Completed);
        let result = h.jobs.get(&id).await.unwrap().result.unwrap();
        assert_eq!(result["features"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_gateway_error_fails_without_retry() {
        let backend = ScriptedBackend::new().with_reply(
            "realityCheck",
            ScriptedReply::Fail(LlmError::ProviderOutage(
                "upstream down, key sk-abcdefghijklmnopqrstuvwx".to_string(),
            )),
        );
        let h = harness(backend);
        let req = request(&h, StepKind::RealityCheck).await;
        let id = req.job_id.clone();

        let status = h.executor.execute(req).await;
        h.executor.flush_mirror_writes().await;

        assert_eq!(status, JobStatus::Failed);
        let job = h.jobs.get(&id).await.unwrap();
        let error = job.error.unwrap();
        assert!(error.contains("Provider outage"));
        assert!(!error.contains("sk-abcdefghijklmnopqrstuvwx"));
        let mirrored = h.mirror.lookup(&h.project, id.as_str()).await.unwrap().unwrap();
        assert_eq!(mirrored.error.as_deref(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_unparseable_output_fails() {
        let backend = ScriptedBackend::new().with_reply("analyze", ScriptedReply::text("I cannot help with that."));
        let h = harness(backend);
        let req = request(&h, StepKind::Analyze).await;
        let id = req.job_id.clone();

        assert_eq!(h.executor.execute(req).await, JobStatus::Failed);
        let error = h.jobs.get(&id).await.unwrap().error.unwrap();
        assert!(error.starts_with("Could not read analyze output"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_gateway_times_out() {
        let backend = ScriptedBackend::new().with_reply("analyze", ScriptedReply::Hang);
        let h = harness(backend);
        let req = request(&h, StepKind::Analyze).await;
        let id = req.job_id.clone();

        assert_eq!(h.executor.execute(req).await, JobStatus::Failed);
        assert!(h.jobs.get(&id).await.unwrap().error.unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_already_failed_job_is_not_run() {
        let backend = ScriptedBackend::new();
        let h = harness(backend);
        let req = request(&h, StepKind::Analyze).await;
        h.jobs
            .transition(&req.job_id, JobUpdate::Failed("queue full".into()))
            .await
            .unwrap();

        assert_eq!(h.executor.execute(req).await, JobStatus::Failed);
    }
}
