//! Language model gateway.
//!
//! All providers implement [`LlmBackend`], offering a blocking `invoke` and a
//! fragment-by-fragment `stream`. Callers hold an `Arc<dyn LlmBackend>` and
//! never see provider details.

mod anthropic_backend;
pub(crate) mod http_client;
mod scripted_backend;
pub mod sse;
mod types;

use std::sync::Arc;

pub use blueprint_utils::error::LlmError;
pub use scripted_backend::{ScriptedBackend, ScriptedReply};
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role, TextStream};

pub(crate) use anthropic_backend::AnthropicBackend;

use blueprint_config::{Config, LlmProvider};

/// Create the backend selected by `[llm] provider`.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for an unknown provider and
/// `LlmError::ProviderAuth` when the Anthropic API key is missing.
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    match config.llm.provider_kind() {
        Some(LlmProvider::Anthropic) => Ok(Arc::new(AnthropicBackend::new_from_config(config)?)),
        Some(LlmProvider::Scripted) => Ok(Arc::new(ScriptedBackend::demo())),
        None => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{}'. Supported providers: anthropic, scripted.",
            config.llm.provider
        ))),
    }
}
