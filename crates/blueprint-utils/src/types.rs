use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the project a design conversation belongs to.
///
/// Project ids end up as directory names in the file-backed store, so the
/// accepted alphabet is restricted to ASCII alphanumerics, `-` and `_`.
///
/// ```rust
/// use blueprint_utils::types::ProjectId;
///
/// let id = ProjectId::new("shop-42").unwrap();
/// assert_eq!(id.as_str(), "shop-42");
/// assert!(ProjectId::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

/// Maximum accepted length of a project id.
pub const MAX_PROJECT_ID_LEN: usize = 128;

/// Reason a project id was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectIdError {
    #[error("project id is empty")]
    Empty,
    #[error("project id is longer than {MAX_PROJECT_ID_LEN} characters")]
    TooLong,
    #[error("project id contains invalid character {0:?}")]
    InvalidChar(char),
}

impl ProjectId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ProjectIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ProjectIdError::Empty);
        }
        if raw.len() > MAX_PROJECT_ID_LEN {
            return Err(ProjectIdError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ProjectIdError::InvalidChar(c));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = ProjectIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(value: ProjectId) -> Self {
        value.0
    }
}

impl FromStr for ProjectId {
    type Err = ProjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Named stage of the design workflow that runs a language-model call.
///
/// Serialized with the wire names used by the HTTP API (`analyze`,
/// `techStack`, `realityCheck`, `final`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    #[serde(rename = "analyze")]
    Analyze,
    #[serde(rename = "techStack")]
    TechStack,
    #[serde(rename = "realityCheck")]
    RealityCheck,
    #[serde(rename = "final")]
    Final,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Analyze,
        StepKind::TechStack,
        StepKind::RealityCheck,
        StepKind::Final,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::TechStack => "techStack",
            Self::RealityCheck => "realityCheck",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step {0:?}")]
pub struct UnknownStep(pub String);

impl FromStr for StepKind {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

/// Independent JSON fields attached to a project record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobKey {
    /// Resumable wizard snapshot.
    DesignState,
    /// Append-only question/answer log.
    ConversationHistory,
    /// Per-job status mirror, keyed by job id.
    DesignJobState,
    /// Accepted project overview, written on proceed.
    Description,
    ValidationResult,
    /// Decisions sorted out of the conversation on proceed.
    FinalDecisions,
}

impl BlobKey {
    pub const ALL: [BlobKey; 6] = [
        BlobKey::DesignState,
        BlobKey::ConversationHistory,
        BlobKey::DesignJobState,
        BlobKey::Description,
        BlobKey::ValidationResult,
        BlobKey::FinalDecisions,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DesignState => "design_state",
            Self::ConversationHistory => "conversation_history",
            Self::DesignJobState => "design_job_state",
            Self::Description => "description",
            Self::ValidationResult => "validation_result",
            Self::FinalDecisions => "final_decisions",
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown blob key {0:?}")]
pub struct UnknownBlobKey(pub String);

impl FromStr for BlobKey {
    type Err = UnknownBlobKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownBlobKey(s.to_string()))
    }
}

/// Lifecycle status of a background job.
///
/// Moves strictly forward: `pending -> processing -> {completed | failed}`.
/// A pending job may also fail directly when it never got a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    #[must_use]
    pub const fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Failed) | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_rejects_path_characters() {
        assert_eq!(ProjectId::new(""), Err(ProjectIdError::Empty));
        assert_eq!(
            ProjectId::new("a/b"),
            Err(ProjectIdError::InvalidChar('/'))
        );
        assert_eq!(
            ProjectId::new("..".to_string()),
            Err(ProjectIdError::InvalidChar('.'))
        );
        assert!(ProjectId::new("x".repeat(MAX_PROJECT_ID_LEN + 1)).is_err());
        assert!(ProjectId::new("proj_1-A").is_ok());
    }

    #[test]
    fn test_project_id_serde_validates() {
        let ok: ProjectId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<ProjectId>("\"a b\"").is_err());
    }

    #[test]
    fn test_step_kind_wire_names() {
        for step in StepKind::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
            assert_eq!(step.as_str().parse::<StepKind>().unwrap(), step);
        }
        assert!("validate".parse::<StepKind>().is_err());
    }

    #[test]
    fn test_blob_key_names() {
        assert_eq!(BlobKey::DesignState.as_str(), "design_state");
        assert_eq!(
            "design_job_state".parse::<BlobKey>().unwrap(),
            BlobKey::DesignJobState
        );
        assert_eq!(
            serde_json::to_string(&BlobKey::ConversationHistory).unwrap(),
            "\"conversation_history\""
        );
        for key in BlobKey::ALL {
            assert_eq!(key.as_str().parse::<BlobKey>().unwrap(), key);
            assert_eq!(serde_json::to_string(&key).unwrap(), format!("\"{key}\""));
        }
        assert!("overview".parse::<BlobKey>().is_err());
    }

    #[test]
    fn test_job_status_forward_only() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Failed));
        // A result only comes from a job that ran.
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Processing));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert_eq!(serde_json::to_string(&Processing).unwrap(), "\"processing\"");
    }
}
