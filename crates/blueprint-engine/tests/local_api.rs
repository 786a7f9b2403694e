use std::sync::Arc;
use std::time::Duration;

use blueprint_config::Config;
use blueprint_engine::{ApiBridge, DesignApi, DesignService, LocalDesignApi, collect_stream};
use blueprint_jobs::{PollSettings, await_job};
use blueprint_llm::{ScriptedBackend, ScriptedReply};
use blueprint_steps::{Answers, StepContext};
use blueprint_store::{AllowAll, ConversationEntry, ConversationLog, MemoryStore};
use blueprint_utils::{BlobKey, ProjectId, StepKind};
use serde_json::json;

fn api(backend: ScriptedBackend) -> Arc<dyn DesignApi> {
    let config = Config::builder().storage_backend("memory").build().unwrap();
    let service = DesignService::new(
        &config,
        Arc::new(backend),
        Arc::new(MemoryStore::new()),
        Arc::new(AllowAll),
    );
    Arc::new(LocalDesignApi::new(Arc::new(service), None))
}

#[tokio::test]
async fn launch_and_await_through_bridge() {
    let backend = ScriptedBackend::new().with_reply(
        "realityCheck",
        ScriptedReply::text(r#"{"warnings":["big"],"recommendation":"trim scope"}"#),
    );
    let api = api(backend);
    let bridge = ApiBridge::new(api.clone());
    let project = ProjectId::new("p").unwrap();

    let job_id = api
        .launch(&project, StepKind::RealityCheck, &Answers::new(), &StepContext::default())
        .await
        .unwrap();
    let settings = PollSettings {
        interval: Duration::from_millis(10),
        max_attempts: 500,
    };
    let result = await_job(&bridge, &job_id, &project, settings).await.unwrap();

    assert_eq!(result["recommendation"], "trim scope");
}

#[tokio::test]
async fn stream_collects_fragments() {
    let backend = ScriptedBackend::new().with_reply(
        "techStack",
        ScriptedReply::fragments(["{\"opt", "ions\":[]}"]),
    );
    let api = api(backend);
    let project = ProjectId::new("p").unwrap();

    let stream = api
        .stream_step(&project, StepKind::TechStack, &Answers::new(), &StepContext::default())
        .await
        .unwrap();

    assert_eq!(collect_stream(stream).await.unwrap(), r#"{"options":[]}"#);
}

#[tokio::test]
async fn conversation_log_over_bridge() {
    let api = api(ScriptedBackend::new());
    let log = ConversationLog::new(Arc::new(ApiBridge::new(api.clone())));
    let project = ProjectId::new("p").unwrap();

    log.append(&project, ConversationEntry::answered("What?", "shop"))
        .await
        .unwrap();

    let raw = api.get_blob(&project, BlobKey::ConversationHistory).await.unwrap().unwrap();
    assert_eq!(raw[0]["answer"], json!("shop"));
}

#[tokio::test]
async fn unwritten_blob_reads_as_none() {
    let api = api(ScriptedBackend::new());
    let project = ProjectId::new("p").unwrap();
    assert!(api.get_blob(&project, BlobKey::DesignState).await.unwrap().is_none());
}
