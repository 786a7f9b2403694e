use blueprint_jobs::LaunchError;
use blueprint_llm::LlmError;
use blueprint_store::{AccessError, StoreError};
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use thiserror::Error;

/// Errors raised by [`crate::DesignService`], each with an HTTP status
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Launch(LaunchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl From<LaunchError> for ServiceError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Access(access) => Self::Access(access),
            other => Self::Launch(other),
        }
    }
}

impl ServiceError {
    /// HTTP status code for this error
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Access(AccessError::Unauthenticated) => 401,
            Self::Access(AccessError::Forbidden { .. }) => 403,
            Self::NotFound(_) => 404,
            Self::Launch(LaunchError::QueueFull { .. } | LaunchError::ShuttingDown) => 503,
            Self::Launch(_) | Self::Store(_) | Self::Llm(_) => 500,
        }
    }
}

impl UserFriendlyError for ServiceError {
    fn user_message(&self) -> String {
        match self {
            Self::Launch(err) => err.user_message(),
            Self::Store(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Launch(err) => err.context(),
            Self::Store(err) => err.context(),
            Self::Llm(err) => err.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Launch(err) => err.suggestions(),
            Self::Store(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest(_) | Self::Access(_) | Self::NotFound(_) => ErrorCategory::Validation,
            Self::Launch(err) => err.category(),
            Self::Store(err) => err.category(),
            Self::Llm(err) => err.category(),
        }
    }
}
