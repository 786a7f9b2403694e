//! Anthropic Messages API backend, blocking and streaming.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::sse::{SseDecoder, SseEvent};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role, TextStream};

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl AnthropicBackend {
    pub fn new(
        api_key: String,
        base_url: String,
        default_model: String,
        default_params: HttpParams,
        max_timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::with_max_timeout(max_timeout)?,
            base_url,
            api_key,
            default_model,
            default_params,
        })
    }

    /// Build from `[llm]`; the API key is read from the variable named by `api_key_env`.
    pub fn new_from_config(config: &blueprint_config::Config) -> Result<Self, LlmError> {
        let llm = &config.llm;
        let api_key = std::env::var(&llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::ProviderAuth(format!(
                    "Anthropic API key not found in environment variable '{}'",
                    llm.api_key_env
                ))
            })?;

        Self::new(
            api_key,
            llm.base_url.clone(),
            llm.model.clone(),
            HttpParams {
                max_tokens: llm.max_tokens,
                temperature: llm.temperature,
            },
            llm.timeout(),
        )
    }

    /// `inv.model` and `inv.metadata` override the backend defaults
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, HttpParams) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .map_or(self.default_params.max_tokens, |v| v as u32);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map_or(self.default_params.temperature, |v| v as f32);

        (
            model,
            HttpParams {
                max_tokens,
                temperature,
            },
        )
    }

    /// Split system messages into the top-level `system` field
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut anthropic_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => match system_prompt.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    }
                    None => system_prompt = Some(msg.content.clone()),
                },
                Role::User | Role::Assistant => anthropic_messages.push(AnthropicMessage {
                    role: if msg.role == Role::User {
                        "user"
                    } else {
                        "assistant"
                    },
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, anthropic_messages)
    }

    fn request(&self, inv: &LlmInvocation, stream: bool) -> (String, reqwest::RequestBuilder) {
        let (model, params) = self.resolve_params(inv);
        let (system, messages) = Self::convert_messages(&inv.messages);

        debug!(
            provider = "anthropic",
            model = %model,
            label = %inv.label,
            stream = stream,
            max_tokens = params.max_tokens,
            "Invoking Anthropic backend"
        );

        let body = AnthropicRequest {
            model: model.clone(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
            stream,
        };

        let builder = self
            .client
            .inner()
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        (model, builder)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, request) = self.request(&inv, false);
        let response = self
            .client
            .execute_with_retry(request, inv.timeout, "anthropic")
            .await?;

        let body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let content: String = body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::InvalidResponse(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, "anthropic", model);
        if let Some(usage) = body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
        }
        Ok(result)
    }

    async fn stream(&self, inv: LlmInvocation) -> Result<TextStream, LlmError> {
        let (_, request) = self.request(&inv, true);
        let timeout = inv.timeout;
        let response = self
            .client
            .execute_with_retry(request, timeout, "anthropic")
            .await?;

        let state = StreamState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
            timeout,
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
                            match classify_event(&event) {
                                StreamSignal::Text(text) => state.pending.push_back(Ok(text)),
                                StreamSignal::Stop => {
                                    state.finished = true;
                                    break;
                                }
                                StreamSignal::Failed(err) => {
                                    state.pending.push_back(Err(err));
                                    state.finished = true;
                                    break;
                                }
                                StreamSignal::Ignore => {}
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        let err = if e.is_timeout() {
                            LlmError::Timeout {
                                duration: state.timeout,
                            }
                        } else {
                            LlmError::StreamInterrupted(e.to_string())
                        };
                        return Some((Err(err), state));
                    }
                    None => {
                        state.finished = true;
                        return Some((
                            Err(LlmError::StreamInterrupted(
                                "connection closed before message_stop".to_string(),
                            )),
                            state,
                        ));
                    }
                }
            }
        });

        Ok(Box::pin(fragments))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
    timeout: Duration,
}

#[derive(Debug)]
enum StreamSignal {
    Text(String),
    Stop,
    Failed(LlmError),
    Ignore,
}

fn classify_event(event: &SseEvent) -> StreamSignal {
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(&event.data) else {
        return StreamSignal::Ignore;
    };

    match payload.get("type").and_then(serde_json::Value::as_str) {
        Some("content_block_delta") => payload
            .pointer("/delta/text")
            .and_then(serde_json::Value::as_str)
            .map_or(StreamSignal::Ignore, |text| {
                StreamSignal::Text(text.to_string())
            }),
        Some("message_stop") => StreamSignal::Stop,
        Some("error") => {
            let kind = payload
                .pointer("/error/type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("error");
            let message = payload
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown stream error");
            let detail = format!("{kind}: {message}");
            StreamSignal::Failed(match kind {
                "overloaded_error" | "api_error" => LlmError::ProviderOutage(detail),
                "rate_limit_error" => LlmError::ProviderQuota(detail),
                "authentication_error" | "permission_error" => LlmError::ProviderAuth(detail),
                _ => LlmError::InvalidResponse(detail),
            })
        }
        _ => StreamSignal::Ignore,
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
