//! Core types for the language model gateway

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::LlmError;

/// Incremental text fragments of one streamed response.
///
/// The stream ends (`None`) only after the provider's end marker was seen;
/// a connection that drops early yields `Err(LlmError::StreamInterrupted)`.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input to a language model call
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Project the call is made for (logging only)
    pub project_id: String,
    /// Label of the step or validation facet, e.g. `analyze` or `validate.uiux`
    pub label: String,
    /// Model override; empty means the backend default
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
    /// Provider-specific parameters (`max_tokens`, `temperature`)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        label: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            label: label.into(),
            model: String::new(),
            timeout,
            messages,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result of a blocking language model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    pub raw_response: String,
    /// Provider name (`anthropic`, `scripted`)
    pub provider: String,
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Language model gateway.
///
/// Every provider offers a blocking `invoke`; `stream` defaults to a single
/// fragment holding the blocking response.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Run the conversation to completion and return the full text.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;

    /// Run the conversation and yield text fragments as they arrive.
    async fn stream(&self, inv: LlmInvocation) -> Result<TextStream, LlmError> {
        let result = self.invoke(inv).await?;
        Ok(Box::pin(stream::once(async move {
            Ok(result.raw_response)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct Echo;

    #[async_trait]
    impl LlmBackend for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            let last = inv.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(LlmResult::new(last, "echo", "none"))
        }
    }

    #[tokio::test]
    async fn test_default_stream_yields_whole_response() {
        let inv = LlmInvocation::new(
            "p",
            "analyze",
            Duration::from_secs(1),
            vec![Message::user("hello")],
        );
        let fragments: Vec<_> = Echo.stream(inv).await.unwrap().collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "hello");
    }

    #[test]
    fn test_invocation_builders() {
        let inv = LlmInvocation::new("p", "final", Duration::from_secs(5), vec![])
            .with_model("m")
            .with_metadata("max_tokens", serde_json::json!(10));
        assert_eq!(inv.model, "m");
        assert_eq!(inv.metadata["max_tokens"], 10);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
