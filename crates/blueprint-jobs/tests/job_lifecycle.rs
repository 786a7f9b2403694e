use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blueprint_config::JobsConfig;
use blueprint_jobs::{
    JobId, JobRuntime, JobSnapshot, JobStatusSource, LaunchError, PollError, PollSettings, await_job,
};
use blueprint_llm::{ScriptedBackend, ScriptedReply};
use blueprint_steps::{Answers, CallSettings, StepContext};
use blueprint_store::{AllowAll, JobMirror, MemoryStore, MirrorEntry};
use blueprint_utils::{JobStatus, ProjectId, StepKind};

const ANALYZE: &str = r#"{"projectType":"e-commerce","questions":["Who buys?","What do they buy?","How do they pay?","Where do they live?","Why you?"]}"#;

/// Reads status straight from a runtime, the way the HTTP handlers do
struct InProcess<'a>(&'a JobRuntime);

#[async_trait]
impl JobStatusSource for InProcess<'_> {
    async fn job_status(&self, job_id: &JobId, _: &ProjectId) -> Result<Option<JobSnapshot>, PollError> {
        Ok(self.0.jobs().get(job_id).await.map(|job| job.snapshot()))
    }

    async fn mirrored_status(&self, job_id: &JobId, project_id: &ProjectId) -> Result<Option<MirrorEntry>, PollError> {
        self.0
            .mirror()
            .lookup(project_id, job_id.as_str())
            .await
            .map_err(|err| PollError::Source(err.to_string()))
    }
}

fn answers() -> Answers {
    [("what", "shop"), ("why", "learn"), ("when", "3 months")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn runtime(backend: ScriptedBackend, config: JobsConfig) -> JobRuntime {
    let mirror = JobMirror::new(Arc::new(MemoryStore::new()));
    JobRuntime::start(&config, Arc::new(backend), CallSettings::default(), mirror, Arc::new(AllowAll))
}

fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(20),
        max_attempts: 250,
    }
}

#[tokio::test]
async fn analyze_job_completes_with_questions() {
    let backend = ScriptedBackend::new().with_reply("analyze", ScriptedReply::text(ANALYZE));
    let rt = runtime(backend, JobsConfig::default());
    let project = ProjectId::new("shop").unwrap();

    let job_id = rt
        .launcher()
        .launch(None, project.clone(), StepKind::Analyze, answers(), StepContext::default())
        .await
        .unwrap();
    let result = await_job(&InProcess(&rt), &job_id, &project, fast_poll())
        .await
        .unwrap();

    assert_eq!(result["projectType"], "e-commerce");
    let questions = result["questions"].as_array().unwrap();
    assert!((5..=7).contains(&questions.len()));
    rt.shutdown().await;
}

#[tokio::test]
async fn launch_returns_before_job_finishes() {
    let backend = ScriptedBackend::new()
        .with_reply("analyze", ScriptedReply::text(ANALYZE))
        .with_delay(Duration::from_millis(300));
    let rt = runtime(backend, JobsConfig::default());
    let project = ProjectId::new("shop").unwrap();

    let job_id = rt
        .launcher()
        .launch(None, project.clone(), StepKind::Analyze, answers(), StepContext::default())
        .await
        .unwrap();

    let status = rt.jobs().get(&job_id).await.unwrap().status;
    assert!(!status.is_terminal());

    while rt.jobs().get(&job_id).await.unwrap().status == JobStatus::Pending {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // shutdown waits for running jobs and their mirror writes
    let jobs = rt.jobs().clone();
    let mirror = rt.mirror().clone();
    rt.shutdown().await;
    assert_eq!(jobs.get(&job_id).await.unwrap().status, JobStatus::Completed);
    let entry = mirror.lookup(&project, job_id.as_str()).await.unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Completed);
}

#[tokio::test]
async fn failed_job_is_mirrored_and_outlives_registry() {
    let backend = ScriptedBackend::new().with_reply("analyze", ScriptedReply::text("no structure at all"));
    let config = JobsConfig {
        eviction_grace_secs: 0,
        eviction_interval_secs: 1,
        ..JobsConfig::default()
    };
    let rt = runtime(backend, config);
    let project = ProjectId::new("shop").unwrap();

    let job_id = rt
        .launcher()
        .launch(None, project.clone(), StepKind::Analyze, answers(), StepContext::default())
        .await
        .unwrap();
    let err = await_job(&InProcess(&rt), &job_id, &project, fast_poll())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::JobFailed(_)));

    // after eviction the poller is answered by the mirror alone
    let mut evicted = false;
    for _ in 0..50 {
        if rt.jobs().get(&job_id).await.is_none() {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(evicted);
    let again = await_job(&InProcess(&rt), &job_id, &project, fast_poll())
        .await
        .unwrap_err();
    assert_eq!(again, err);
    rt.shutdown().await;
}

#[tokio::test]
async fn saturated_queue_refuses_launch() {
    let backend = ScriptedBackend::new().with_reply("analyze", ScriptedReply::Hang);
    let config = JobsConfig {
        workers: 1,
        queue_capacity: 1,
        ..JobsConfig::default()
    };
    let rt = runtime(backend, config);
    let project = ProjectId::new("shop").unwrap();
    let launch = || {
        rt.launcher()
            .launch(None, project.clone(), StepKind::Analyze, answers(), StepContext::default())
    };

    // one running, one waiting, the rest refused
    let mut refused = Vec::new();
    for _ in 0..4 {
        if let Err(err) = launch().await {
            refused.push(err);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(!refused.is_empty());
    assert!(refused.iter().all(|e| matches!(e, LaunchError::QueueFull { .. })));
}
