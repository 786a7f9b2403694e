use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Cross-cutting error type returned by the top-level entry points.
///
/// Crate-specific errors (`StoreError`, `LaunchError`, `PollError`, ...) live
/// next to the code that raises them; this enum only aggregates what the CLI
/// and server need to report uniformly.
#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    LanguageModel,
    Persistence,
    JobExecution,
    ResourceLimits,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::LanguageModel => write!(f, "Language Model"),
            Self::Persistence => write!(f, "Persistence"),
            Self::JobExecution => write!(f, "Job Execution"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {}", .errors.join("; "))]
    ValidationFailed { errors: Vec<String> },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::ValidationFailed { errors } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => {
                Some("The configuration file must be valid TOML.".to_string())
            }
            Self::NotFound { .. } => Some(
                "An explicitly requested configuration file must exist; discovered files are optional."
                    .to_string(),
            ),
            Self::InvalidValue { .. } | Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check .blueprint/config.toml for syntax errors".to_string(),
                "Run 'blueprint config show' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => {
                vec![format!("Fix the value of '{key}' in .blueprint/config.toml")]
            }
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use upward discovery".to_string(),
            ],
            Self::ValidationFailed { .. } => {
                vec!["Intervals, attempt counts, workers and queue capacity must be positive".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors that can occur during language model calls
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, broken body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// The provider answered but the body was not what the protocol promises
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// A stream ended without its terminating marker
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether a caller could reasonably try the same request again.
    ///
    /// Job execution never retries on its own; this only drives the HTTP
    /// client's transport-level retry and user-facing hints.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ProviderQuota(_)
                | Self::ProviderOutage(_)
                | Self::Timeout { .. }
                | Self::StreamInterrupted(_)
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::InvalidResponse(msg) => format!("LLM provider sent an invalid response: {msg}"),
            Self::StreamInterrupted(msg) => format!("LLM stream ended early: {msg}"),
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) | Self::StreamInterrupted(_) => Some(
                "Transport errors occur when the language model service cannot be reached."
                    .to_string(),
            ),
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when a call takes longer than [llm] timeout_secs.".to_string(),
            ),
            Self::InvalidResponse(_) => None,
            Self::Misconfiguration(_) | Self::Unsupported(_) => Some(
                "Configuration errors indicate missing or invalid [llm] settings.".to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) | Self::StreamInterrupted(_) => vec![
                "Verify network connectivity".to_string(),
                "Retry the step".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the environment variable named by [llm] api_key_env is set"
                    .to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and retry the step".to_string(),
                "Check the provider's status page for known issues".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase [llm] timeout_secs".to_string(),
                "Retry the step".to_string(),
            ],
            Self::InvalidResponse(_) => vec!["Retry the step".to_string()],
            Self::Misconfiguration(_) | Self::Unsupported(_) => vec![
                "Check the [llm] section in .blueprint/config.toml".to_string(),
                "Run 'blueprint config show' to see the effective configuration".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::LanguageModel,
        }
    }
}

impl UserFriendlyError for BlueprintError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Io(err) => format!("File system error: {err}"),
            Self::Other(msg) => msg.clone(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Io(_) | Self::Other(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Io(_) => vec!["Check permissions of the storage directory".to_string()],
            Self::Other(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Llm(err) => err.category(),
            Self::Io(_) => ErrorCategory::Persistence,
            Self::Other(_) => ErrorCategory::JobExecution,
        }
    }
}

impl BlueprintError {
    /// Render the error with context and suggestions for terminal output.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        render_for_user(self)
    }
}

/// `[Category] message`, then the context and one `- suggestion` per line.
#[must_use]
pub fn render_for_user<E: UserFriendlyError + ?Sized>(err: &E) -> String {
    let mut out = format!("[{}] {}", err.category(), err.user_message());
    if let Some(context) = err.context() {
        out.push_str("\n  ");
        out.push_str(&context);
    }
    for suggestion in err.suggestions() {
        out.push_str("\n  - ");
        out.push_str(&suggestion);
    }
    out
}
