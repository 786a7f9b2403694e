pub(crate) mod config;
pub(crate) mod design;
pub(crate) mod job_status;
pub(crate) mod serve;

use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use thiserror::Error;

use super::args::ServerArgs;
use crate::Config;

/// Failures raised by the command layer itself
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("Invalid {what}: {reason}")]
    InvalidInput { what: &'static str, reason: String },

    #[error("Job {0} is not known to the server")]
    JobNotFound(String),
}

impl UserFriendlyError for CliError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::JobNotFound(_) => Some(
                "Finished jobs are forgotten by the server after a grace period; their outcome stays in the project's job mirror."
                    .to_string(),
            ),
            Self::InvalidInput { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { what, .. } => vec![format!("Check the {what} argument")],
            Self::JobNotFound(_) => vec!["Check the job id and --project".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Server root for client commands: `--server`, else `http://<server.bind>`
pub(crate) fn server_url(config: &Config, target: &ServerArgs) -> String {
    target
        .server
        .clone()
        .unwrap_or_else(|| format!("http://{}", config.server.bind))
}

pub(crate) fn parse_project(raw: &str) -> Result<blueprint_utils::ProjectId, CliError> {
    blueprint_utils::ProjectId::new(raw).map_err(|err| CliError::InvalidInput {
        what: "project id",
        reason: err.to_string(),
    })
}
