//! Server-side facade over jobs, streaming, validation and project blobs.

use std::sync::Arc;

use blueprint_config::Config;
use blueprint_jobs::{JobId, JobRuntime, JobSnapshot};
use blueprint_llm::{LlmBackend, LlmError, TextStream};
use blueprint_steps::{CallSettings, DesignValidator, Exchange, FinalDecisions, ValidationReport, parse_decisions};
use blueprint_store::{ConversationEntry, JobMirror, ProjectAccess, ProjectStore};
use blueprint_utils::{BlobKey, JobStatus, ProjectId};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::wire::{
    DecisionsRequest, LaunchRequest, LaunchResponse, StreamRequest, ValidateRequest, parse_project, parse_step,
};

/// Project id used for logging streamed or validated calls made without one
const ANONYMOUS_PROJECT: &str = "anonymous";

pub struct DesignService {
    runtime: JobRuntime,
    store: Arc<dyn ProjectStore>,
    backend: Arc<dyn LlmBackend>,
    settings: CallSettings,
    validator: DesignValidator,
    access: Arc<dyn ProjectAccess>,
}

impl DesignService {
    /// Wire the service from explicit collaborators.
    ///
    /// Starts the job worker pool and evictor, so it must run inside a tokio
    /// runtime.
    #[must_use]
    pub fn new(
        config: &Config,
        backend: Arc<dyn LlmBackend>,
        store: Arc<dyn ProjectStore>,
        access: Arc<dyn ProjectAccess>,
    ) -> Self {
        let settings = CallSettings::from_config(&config.llm);
        let runtime = JobRuntime::start(
            &config.jobs,
            backend.clone(),
            settings.clone(),
            JobMirror::new(store.clone()),
            access.clone(),
        );
        Self {
            runtime,
            validator: DesignValidator::new(backend.clone(), settings.clone()),
            store,
            backend,
            settings,
            access,
        }
    }

    /// Build backend and store from configuration.
    pub fn from_config(config: &Config, access: Arc<dyn ProjectAccess>) -> anyhow::Result<Self> {
        let backend = blueprint_llm::from_config(config)?;
        let store = blueprint_store::from_config(config)?;
        info!(
            provider = backend.name(),
            storage = %config.storage.backend,
            workers = config.jobs.workers,
            "Design service ready"
        );
        Ok(Self::new(config, backend, store, access))
    }

    fn optional_project(raw: Option<&str>) -> Result<ProjectId, ServiceError> {
        match raw {
            Some(raw) => parse_project(raw),
            None => parse_project(ANONYMOUS_PROJECT),
        }
    }

    /// Register and queue a step job; returns immediately.
    pub async fn launch(&self, user: Option<&str>, request: LaunchRequest) -> Result<LaunchResponse, ServiceError> {
        let checked = request.check()?;
        let job_id = self
            .runtime
            .launcher()
            .launch(user, checked.project_id, checked.step, checked.answers, checked.context)
            .await?;
        Ok(LaunchResponse {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// Current status of a job.
    ///
    /// The live registry answers first. When it no longer knows the job and a
    /// project is given, the durable mirror of that project is consulted.
    pub async fn poll(&self, user: Option<&str>, job_id: &str, project: Option<&str>) -> Result<JobSnapshot, ServiceError> {
        let job_id = JobId::parse(job_id).map_err(|err| ServiceError::BadRequest(err.to_string()))?;
        let project = project.map(parse_project).transpose()?;

        if let Some(job) = self.runtime.jobs().get(&job_id).await {
            if project.as_ref().is_some_and(|p| *p != job.project_id) {
                return Err(ServiceError::NotFound(format!("Job not found: {job_id}")));
            }
            self.access.authorize(user, &job.project_id).await?;
            return Ok(job.snapshot());
        }

        let Some(project) = project else {
            return Err(ServiceError::NotFound(format!("Job not found: {job_id}")));
        };
        self.access.authorize(user, &project).await?;
        debug!(job_id = %job_id, project_id = %project, "Job not in registry, reading mirror");
        match self.runtime.mirror().lookup(&project, job_id.as_str()).await? {
            Some(entry) => Ok(JobSnapshot {
                job_id,
                status: entry.status,
                result: entry.result,
                error: entry.error,
                updated_at: entry.updated_at,
            }),
            None => Err(ServiceError::NotFound(format!("Job not found: {job_id}"))),
        }
    }

    /// Start a streamed step and return its text fragments.
    pub async fn stream(&self, user: Option<&str>, request: StreamRequest) -> Result<TextStream, ServiceError> {
        let step = request
            .step
            .as_deref()
            .ok_or_else(|| ServiceError::BadRequest("Missing required fields".to_string()))
            .and_then(parse_step)?;
        let project = Self::optional_project(request.project_id.as_deref())?;
        if request.project_id.is_some() {
            self.access.authorize(user, &project).await?;
        }

        let inv = self
            .settings
            .step_invocation(&project, step, &request.answers, &request.context);
        debug!(project_id = %project, step = %step, "Streaming step");
        Ok(self.backend.stream(inv).await?)
    }

    /// Run the four-way validation of a final overview.
    pub async fn validate(&self, user: Option<&str>, request: ValidateRequest) -> Result<ValidationReport, ServiceError> {
        let project = Self::optional_project(request.project_id.as_deref())?;
        if request.project_id.is_some() {
            self.access.authorize(user, &project).await?;
        }
        Ok(self.validator.validate(&project, &request.overview).await)
    }

    /// Sort the decisions in a conversation log into completed, pending and
    /// deferred ones.
    pub async fn extract_decisions(
        &self,
        user: Option<&str>,
        request: DecisionsRequest,
    ) -> Result<FinalDecisions, ServiceError> {
        let history = request
            .conversation_history
            .ok_or_else(|| ServiceError::BadRequest("conversationHistory is required".to_string()))?;
        let project = Self::optional_project(request.project_id.as_deref())?;
        if request.project_id.is_some() {
            self.access.authorize(user, &project).await?;
        }

        let exchanges = exchanges(&history);
        let inv = self.settings.decisions_invocation(&project, &exchanges);
        let raw = self.backend.invoke(inv).await?.raw_response;
        let decisions = parse_decisions(&raw).map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        debug!(
            project_id = %project,
            exchanges = exchanges.len(),
            decisions = decisions.len(),
            "Decisions extracted"
        );
        Ok(decisions)
    }

    pub async fn get_blob(&self, user: Option<&str>, project: &str, key: &str) -> Result<Option<Value>, ServiceError> {
        let (project, key) = parse_blob_address(project, key)?;
        self.access.authorize(user, &project).await?;
        Ok(self.store.get_blob(&project, key).await?)
    }

    pub async fn set_blob(&self, user: Option<&str>, project: &str, key: &str, value: Value) -> Result<(), ServiceError> {
        let (project, key) = parse_blob_address(project, key)?;
        self.access.authorize(user, &project).await?;
        Ok(self.store.set_blob(&project, key, value).await?)
    }

    /// Stop the workers after running jobs finish.
    pub async fn shutdown(self) {
        self.runtime.shutdown().await;
    }
}

/// Question and answer pairs of a conversation log, in order
fn exchanges(history: &[ConversationEntry]) -> Vec<Exchange> {
    history
        .iter()
        .filter(|entry| !entry.content.trim().is_empty())
        .map(|entry| Exchange {
            question: entry.content.clone(),
            answer: entry.answer.clone().unwrap_or_default(),
        })
        .collect()
}

fn parse_blob_address(project: &str, key: &str) -> Result<(ProjectId, BlobKey), ServiceError> {
    let project = parse_project(project)?;
    let key = key
        .parse()
        .map_err(|err: blueprint_utils::types::UnknownBlobKey| ServiceError::NotFound(err.to_string()))?;
    Ok((project, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_llm::{ScriptedBackend, ScriptedReply};
    use blueprint_store::{AllowAll, MemoryStore, MirrorEntry, OwnerRegistry};
    use futures::StreamExt;
    use serde_json::json;

    fn service_with(backend: ScriptedBackend, access: Arc<dyn ProjectAccess>) -> (DesignService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::builder().storage_backend("memory").build().unwrap();
        (
            DesignService::new(&config, Arc::new(backend), store.clone(), access),
            store,
        )
    }

    #[tokio::test]
    async fn test_poll_unknown_job_without_project_is_not_found() {
        let (service, _) = service_with(ScriptedBackend::new(), Arc::new(AllowAll));
        let err = service.poll(None, "job_missing", None).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_poll_falls_back_to_mirror() {
        let (service, store) = service_with(ScriptedBackend::new(), Arc::new(AllowAll));
        let project = ProjectId::new("p").unwrap();
        JobMirror::new(store)
            .record(&project, "job_old", MirrorEntry::completed(json!({"x": 1}), chrono::Utc::now()))
            .await
            .unwrap();

        let snapshot = service.poll(None, "job_old", Some("p")).await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.result, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_blob_access_is_checked() {
        let (service, _) = service_with(ScriptedBackend::new(), Arc::new(OwnerRegistry::new()));
        service
            .set_blob(Some("alice"), "p", "design_state", json!({"step": "initial"}))
            .await
            .unwrap();

        let err = service.get_blob(Some("bob"), "p", "design_state").await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = service.get_blob(None, "p", "design_state").await.unwrap_err();
        assert_eq!(err.status_code(), 401);
        let err = service.get_blob(Some("alice"), "p", "nope").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            service.get_blob(Some("alice"), "p", "design_state").await.unwrap(),
            Some(json!({"step": "initial"}))
        );
    }

    #[tokio::test]
    async fn test_stream_yields_fragments() {
        let backend = ScriptedBackend::new().with_reply(
            "techStack",
            ScriptedReply::fragments(["{\"opt", "ions\":[]}"]),
        );
        let (service, _) = service_with(backend, Arc::new(AllowAll));
        let request: StreamRequest = serde_json::from_value(json!({"step": "techStack", "answers": {}})).unwrap();

        let fragments: Vec<String> = service
            .stream(None, request)
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(fragments.concat(), "{\"options\":[]}");
    }

    #[tokio::test]
    async fn test_extract_decisions_from_history() {
        let backend = ScriptedBackend::new().with_reply(
            "extractDecisions",
            ScriptedReply::text(r#"{"completed": [{"decision": "Web first", "reason": "reach"}], "deferred": [{"decision": "Mobile app"}]}"#),
        );
        let (service, _) = service_with(backend, Arc::new(AllowAll));
        let request = DecisionsRequest {
            project_id: Some("p".to_string()),
            conversation_history: Some(vec![ConversationEntry::answered("Which platforms?", "web, mobile later")]),
        };

        let decisions = service.extract_decisions(None, request).await.unwrap();

        assert_eq!(decisions.completed[0].decision, "Web first");
        assert!(decisions.pending.is_empty());
        assert_eq!(decisions.deferred[0].decision, "Mobile app");
    }

    #[tokio::test]
    async fn test_extract_decisions_errors() {
        let backend = ScriptedBackend::new().with_reply("extractDecisions", ScriptedReply::text("no decisions"));
        let (service, _) = service_with(backend, Arc::new(AllowAll));

        let err = service
            .extract_decisions(None, DecisionsRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let request = DecisionsRequest {
            project_id: None,
            conversation_history: Some(Vec::new()),
        };
        let err = service.extract_decisions(None, request).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(matches!(err, ServiceError::Llm(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_stream_requires_step() {
        let (service, _) = service_with(ScriptedBackend::new(), Arc::new(AllowAll));
        let err = service.stream(None, StreamRequest::default()).await.err().unwrap();
        assert_eq!(err.status_code(), 400);
    }
}
