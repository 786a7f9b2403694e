//! The wizard driven through `HttpDesignApi` against a live server.

use std::sync::Arc;
use std::time::Duration;

use blueprint_config::Config;
use blueprint_engine::{DesignApi, DesignService, collect_stream};
use blueprint_jobs::PollSettings;
use blueprint_llm::{LlmError, ScriptedBackend, ScriptedReply};
use blueprint_steps::{Answers, StepContext};
use blueprint_store::{MemoryStore, OwnerRegistry};
use blueprint_utils::{BlobKey, ProjectId, StepKind};
use blueprint_wizard::{AutosaveController, DesignWizard, HttpDesignApi, MountOutcome, WizardError, WizardStep};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TECH: &str = r#"{"options": [{"name": "Boring", "stack": {"frontend": "React", "backend": "Axum", "database": "Postgres", "deployment": "Docker"}, "pros": ["known"], "cons": [], "reason": "team knows it"}]}"#;

fn backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .with_reply(
            "analyze",
            ScriptedReply::text(r#"{"projectType": "saas", "questions": ["Who pays?"]}"#),
        )
        .with_reply(
            "techStack",
            ScriptedReply::fragments(TECH.as_bytes().chunks(16).map(|c| String::from_utf8_lossy(c).into_owned())),
        )
        .with_reply(
            "realityCheck",
            ScriptedReply::text(r#"{"warnings": [], "risks": [{"type": "scope", "description": "big", "mitigation": "cut"}], "phases": [], "recommendation": "ship small"}"#),
        )
        .with_reply(
            "final",
            ScriptedReply::fragments([r#"{"type": "saas", "goal": "bill"#, r#"ing", "summary": "invoices"}"#]),
        )
        .with_reply(
            "validate.feasibility",
            ScriptedReply::text(r#"{"realistic": true, "bottlenecks": [], "recommendations": []}"#),
        )
        .with_reply(
            "extractDecisions",
            ScriptedReply::text(r#"{"completed": [{"decision": "Axum backend", "reason": "team knows it"}]}"#),
        )
}

struct Server {
    base: String,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Server {
    async fn start() -> Self {
        Self::start_with(Arc::new(backend())).await
    }

    async fn start_with(backend: Arc<ScriptedBackend>) -> Self {
        let service = DesignService::new(
            &Config::default(),
            backend,
            Arc::new(MemoryStore::new()),
            Arc::new(OwnerRegistry::new()),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(blueprint_server::serve(listener, Arc::new(service), async move {
            let _ = stopped.await;
        }));
        Self {
            base,
            stop: Some(stop),
            handle,
        }
    }

    fn api(&self, user: &str) -> Arc<dyn DesignApi> {
        Arc::new(HttpDesignApi::new(&self.base, Some(user.to_string())).unwrap())
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn wizard(api: Arc<dyn DesignApi>) -> DesignWizard {
    let poll = PollSettings {
        interval: Duration::from_millis(20),
        max_attempts: 250,
    };
    DesignWizard::new(api, ProjectId::new("billing").unwrap(), poll)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_design_run_over_http() {
    let server = Server::start().await;
    let mut wizard = wizard(server.api("ann"));
    assert_eq!(wizard.mount().await, MountOutcome::Fresh);

    for answer in ["invoicing tool", "save time", "in a month", "small agencies"] {
        wizard.answer(answer).await.unwrap();
    }
    assert_eq!(wizard.state().step, WizardStep::TechStackChoice);
    assert_eq!(wizard.state().tech_stack_options[0].name, "Boring");

    wizard.select_tech_stack(0).await.unwrap();

    let state = wizard.state();
    assert_eq!(state.step, WizardStep::Validated);
    assert_eq!(state.project_overview.as_ref().unwrap().goal, "billing");
    let report = state.validation_result.as_ref().unwrap();
    // Only feasibility answered: 80 renormalized over its own weight.
    assert_eq!(report.overall_score, 80);
    assert_eq!(report.degraded.len(), 3);

    let overview = wizard.proceed().await.unwrap();
    assert_eq!(overview.summary, "invoices");

    let api = server.api("ann");
    let project = ProjectId::new("billing").unwrap();
    let decisions = api.get_blob(&project, BlobKey::FinalDecisions).await.unwrap().unwrap();
    assert_eq!(decisions["completed"][0]["decision"], "Axum backend");
    let stored = api.get_blob(&project, BlobKey::Description).await.unwrap().unwrap();
    assert_eq!(stored["goal"], "billing");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_event_fails_the_stream_and_the_step() {
    let backend = Arc::new(backend());
    for _ in 0..2 {
        backend.enqueue("techStack", ScriptedReply::Interrupted(vec!["{\"opt".to_string()]));
    }
    let server = Server::start_with(backend.clone()).await;
    let api = server.api("ann");
    let project = ProjectId::new("billing").unwrap();

    let stream = api
        .stream_step(&project, StepKind::TechStack, &Answers::new(), &StepContext::default())
        .await
        .unwrap();
    match collect_stream(stream).await {
        Err(LlmError::StreamInterrupted(message)) => assert!(message.contains("scripted interruption")),
        other => panic!("expected an interrupted stream, got {other:?}"),
    }

    let mut wizard = wizard(api);
    for answer in ["invoicing tool", "save time", "in a month"] {
        wizard.answer(answer).await.unwrap();
    }
    let err = wizard.answer("small agencies").await.unwrap_err();
    assert!(matches!(err, WizardError::Stream(LlmError::StreamInterrupted(_))));
    assert!(wizard.banner().is_some());
    assert_eq!(wizard.state().step, WizardStep::CustomQuestions);
    assert_eq!(wizard.state().answers["custom_0"], "small agencies");

    wizard.retry().await.unwrap();
    assert_eq!(wizard.state().step, WizardStep::TechStackChoice);
    assert_eq!(backend.call_count("techStack"), 3);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshot_saved_over_http_is_restored() {
    let server = Server::start().await;
    let api = server.api("ann");
    let mut first = wizard(api.clone());
    first.mount().await;
    let autosave = AutosaveController::start(
        api.clone(),
        first.project().clone(),
        first.subscribe(),
        Duration::from_millis(200),
    );
    first.answer("invoicing tool").await.unwrap();
    autosave.teardown_and_flush().await;

    let mut second = wizard(server.api("ann"));
    assert!(matches!(second.mount().await, MountOutcome::Restored { .. }));
    assert_eq!(second.state().answers["what"], "invoicing tool");

    // Another user cannot read ann's project.
    let mut intruder = wizard(server.api("bob"));
    assert_eq!(intruder.mount().await, MountOutcome::Fresh);
    assert!(intruder.answer("x").await.is_ok());

    server.stop().await;
}
