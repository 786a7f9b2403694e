//! Route handlers. Each one unpacks the request, calls [`DesignService`]
//! and maps its error to an HTTP status.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use blueprint_engine::DesignService;
use blueprint_engine::wire::{
    DecisionsRequest, DecisionsResponse, LaunchRequest, LaunchResponse, PollResponse, StreamEvent, StreamRequest,
    ValidateRequest,
};
use blueprint_steps::ValidationReport;
use blueprint_utils::error::UserFriendlyError;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::HttpError;
use crate::extract::CallerId;

pub(crate) type AppState = Arc<DesignService>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PollQuery {
    project_id: Option<String>,
}

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

/// POST /api/design/jobs
pub(crate) async fn launch(
    State(service): State<AppState>,
    caller: CallerId,
    body: Result<Json<LaunchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LaunchResponse>), HttpError> {
    let Json(request) = body?;
    let response = service.launch(caller.as_deref(), request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/design/jobs/{job_id}?projectId=
pub(crate) async fn poll(
    State(service): State<AppState>,
    caller: CallerId,
    Path(job_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, HttpError> {
    let snapshot = service
        .poll(caller.as_deref(), &job_id, query.project_id.as_deref())
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/design/stream
///
/// Emits `{text}` events, then `{done: true}`; a failure mid-stream emits
/// one `{error}` event and ends the stream without `done`.
pub(crate) async fn stream(
    State(service): State<AppState>,
    caller: CallerId,
    body: Result<Json<StreamRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    let Json(request) = body?;
    let fragments = service.stream(caller.as_deref(), request).await?;

    let events = fragments
        .map(|fragment| match fragment {
            Ok(text) => StreamEvent::Text { text },
            Err(err) => {
                warn!(error = %err, "Step stream failed");
                StreamEvent::Error {
                    error: err.user_message(),
                }
            }
        })
        .chain(stream::once(async { StreamEvent::Done { done: true } }))
        .scan(false, |failed, event| {
            let next = (!*failed).then(|| {
                *failed = matches!(event, StreamEvent::Error { .. });
                event
            });
            futures::future::ready(next)
        })
        .map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => Event::default().data(format!(r#"{{"error":"{err}"}}"#)),
    }
}

/// POST /api/design/validate
pub(crate) async fn validate(
    State(service): State<AppState>,
    caller: CallerId,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationReport>, HttpError> {
    let Json(request) = body?;
    Ok(Json(service.validate(caller.as_deref(), request).await?))
}

/// POST /api/design/extract-decisions
pub(crate) async fn extract_decisions(
    State(service): State<AppState>,
    caller: CallerId,
    body: Result<Json<DecisionsRequest>, JsonRejection>,
) -> Result<Json<DecisionsResponse>, HttpError> {
    let Json(request) = body?;
    let final_decisions = service.extract_decisions(caller.as_deref(), request).await?;
    Ok(Json(DecisionsResponse { final_decisions }))
}

/// GET /api/projects/{project_id}/blobs/{key}; `null` when never written
pub(crate) async fn get_blob(
    State(service): State<AppState>,
    caller: CallerId,
    Path((project_id, key)): Path<(String, String)>,
) -> Result<Json<Value>, HttpError> {
    let value = service.get_blob(caller.as_deref(), &project_id, &key).await?;
    Ok(Json(value.unwrap_or(Value::Null)))
}

/// PUT /api/projects/{project_id}/blobs/{key}; replaces the whole value
pub(crate) async fn put_blob(
    State(service): State<AppState>,
    caller: CallerId,
    Path((project_id, key)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(value) = body?;
    service
        .set_blob(caller.as_deref(), &project_id, &key, value)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
