use blueprint_engine::ApiError;
use blueprint_extraction::ExtractionError;
use blueprint_jobs::PollError;
use blueprint_llm::LlmError;
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use thiserror::Error;

use crate::state::WizardStep;

#[derive(Debug, Clone, Error)]
pub enum WizardError {
    #[error("Cannot {action} while in step {step}")]
    InvalidAction { step: WizardStep, action: &'static str },

    #[error("Answer must not be empty")]
    EmptyAnswer,

    #[error("No technology stack option {index} (there are {available})")]
    InvalidSelection { index: usize, available: usize },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("Streaming failed: {0}")]
    Stream(#[from] LlmError),

    #[error("Could not read the response: {0}")]
    Parse(#[from] ExtractionError),

    /// The caller stopped waiting (page left, Ctrl-C); never shown
    #[error("Cancelled")]
    Cancelled,
}

impl WizardError {
    /// Whether this error is shown in the banner
    #[must_use]
    pub const fn is_surfaced(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl UserFriendlyError for WizardError {
    fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Poll(err) => err.user_message(),
            Self::Stream(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Poll(err) => err.context(),
            Self::Stream(err) => err.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Api(_) | Self::Poll(_) | Self::Stream(_) | Self::Parse(_) => {
                vec!["Retry the step; your answers are kept".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAction { .. } | Self::EmptyAnswer | Self::InvalidSelection { .. } => {
                ErrorCategory::Validation
            }
            Self::Stream(err) => err.category(),
            _ => ErrorCategory::JobExecution,
        }
    }
}
