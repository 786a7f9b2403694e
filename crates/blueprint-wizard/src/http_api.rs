//! [`DesignApi`] over HTTP, talking to `blueprint serve`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use blueprint_engine::wire::{
    DecisionsRequest, DecisionsResponse, ErrorBody, LaunchRequest, LaunchResponse, StreamEvent, StreamRequest,
    ValidateRequest,
};
use blueprint_engine::{ApiError, DesignApi};
use blueprint_jobs::{JobId, JobSnapshot};
use blueprint_llm::sse::SseDecoder;
use blueprint_llm::{LlmError, TextStream};
use blueprint_steps::{Answers, FinalDecisions, ProjectOverview, StepContext, ValidationReport};
use blueprint_store::ConversationEntry;
use blueprint_utils::{BlobKey, ProjectId, StepKind};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Header carrying the caller's identity
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct HttpDesignApi {
    client: Client,
    base: String,
    user: Option<String>,
}

impl HttpDesignApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8787`.
    pub fn new(base_url: impl Into<String>, user: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {e}")))?;
        let base = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base, user })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base));
        match &self.user {
            Some(user) => builder.header(USER_HEADER, user),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn expect_success(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(rejection(response).await)
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::expect_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn blob_path(project: &ProjectId, key: BlobKey) -> String {
        format!("/api/projects/{project}/blobs/{key}")
    }
}

/// Turn a non-2xx response into [`ApiError::Rejected`], preferring the
/// `{error}` body over the bare status text.
async fn rejection(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .ok()
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ApiError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DesignApi for HttpDesignApi {
    async fn launch(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<JobId, ApiError> {
        let body = LaunchRequest::new(project, step, answers.clone(), context.clone());
        let response = Self::send(self.request(Method::POST, "/api/design/jobs").json(&body)).await?;
        let launched: LaunchResponse = Self::json(response).await?;
        debug!(job_id = %launched.job_id, step = %step, "Job launched");
        Ok(launched.job_id)
    }

    async fn job_status(&self, job_id: &JobId, project: &ProjectId) -> Result<Option<JobSnapshot>, ApiError> {
        // Both ids are restricted to URL-safe characters.
        let path = format!("/api/design/jobs/{job_id}?projectId={project}");
        let response = Self::send(self.request(Method::GET, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::json(response).await.map(Some)
    }

    async fn stream_step(
        &self,
        project: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> Result<TextStream, ApiError> {
        let body = StreamRequest::new(project, step, answers.clone(), context.clone());
        let response = Self::send(
            self.request(Method::POST, "/api/design/stream")
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(&body),
        )
        .await?;
        let response = Self::expect_success(response).await?;
        Ok(event_stream(response))
    }

    async fn validate(&self, project: &ProjectId, overview: &ProjectOverview) -> Result<ValidationReport, ApiError> {
        let body = ValidateRequest {
            project_id: Some(project.to_string()),
            overview: overview.clone(),
        };
        let response = Self::send(self.request(Method::POST, "/api/design/validate").json(&body)).await?;
        Self::json(response).await
    }

    async fn extract_decisions(
        &self,
        project: &ProjectId,
        history: &[ConversationEntry],
    ) -> Result<FinalDecisions, ApiError> {
        let body = DecisionsRequest {
            project_id: Some(project.to_string()),
            conversation_history: Some(history.to_vec()),
        };
        let response = Self::send(self.request(Method::POST, "/api/design/extract-decisions").json(&body)).await?;
        let decoded: DecisionsResponse = Self::json(response).await?;
        Ok(decoded.final_decisions)
    }

    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, ApiError> {
        let response = Self::send(self.request(Method::GET, &Self::blob_path(project, key))).await?;
        let value: Value = Self::json(response).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), ApiError> {
        let response = Self::send(self.request(Method::PUT, &Self::blob_path(project, key)).json(&value)).await?;
        Self::expect_success(response).await.map(|_| ())
    }
}

struct EventState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

/// Decode `{text}` events until `{done: true}`; `{error}` or an early end
/// of the body fails the stream.
fn event_stream(response: Response) -> TextStream {
    let state = EventState {
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let fragments = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(&chunk) {
                        match serde_json::from_str::<StreamEvent>(&event.data) {
                            Ok(StreamEvent::Text { text }) => state.pending.push_back(Ok(text)),
                            Ok(StreamEvent::Done { .. }) => {
                                state.finished = true;
                                break;
                            }
                            Ok(StreamEvent::Error { error }) => {
                                state.pending.push_back(Err(LlmError::StreamInterrupted(error)));
                                state.finished = true;
                                break;
                            }
                            Err(_) => debug!(data = %event.data, "Ignoring unrecognized stream event"),
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::StreamInterrupted(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    return Some((
                        Err(LlmError::StreamInterrupted(
                            "connection closed before the done marker".to_string(),
                        )),
                        state,
                    ));
                }
            }
        }
    });

    Box::pin(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = HttpDesignApi::new("http://127.0.0.1:8787/", Some("ann".to_string())).unwrap();
        assert_eq!(api.base, "http://127.0.0.1:8787");
        let project = ProjectId::new("shop").unwrap();
        assert_eq!(
            HttpDesignApi::blob_path(&project, BlobKey::DesignState),
            "/api/projects/shop/blobs/design_state"
        );
    }
}
