//! Shared building blocks for the blueprint workspace.
//!
//! Error taxonomy, tracing setup, atomic file writes, secret redaction and the
//! small identifier types that every other crate passes around.

pub mod atomic_write;
pub mod error;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{
    BlueprintError, ConfigError, ErrorCategory, LlmError, UserFriendlyError, render_for_user,
};
pub use types::{BlobKey, JobStatus, ProjectId, StepKind};
