//! Persistence façade for per-project JSON blobs.
//!
//! A project record carries a handful of independent, opaque JSON fields
//! (see [`BlobKey`]). Writes replace a field wholesale and the last writer
//! wins; there are no transactions across keys. Read-modify-write helpers
//! such as [`JobMirror`] and [`ConversationLog`] serialize their own updates.

mod access;
mod conversation;
mod file;
mod memory;
mod mirror;

use std::sync::Arc;

use async_trait::async_trait;
use blueprint_config::{Config, StorageBackend};
use blueprint_utils::error::{ErrorCategory, UserFriendlyError};
use blueprint_utils::{BlobKey, ProjectId};
use serde_json::Value;
use thiserror::Error;

pub use access::{AccessError, AllowAll, OwnerRegistry, ProjectAccess};
pub use conversation::{ConversationEntry, ConversationLog};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use mirror::{JobMirror, MirrorEntry};

/// Errors raised by project stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {key} for project {project}: {reason}")]
    Read {
        project: String,
        key: BlobKey,
        reason: String,
    },

    #[error("Failed to write {key} for project {project}: {reason}")]
    Write {
        project: String,
        key: BlobKey,
        reason: String,
    },

    #[error("Stored {key} for project {project} is malformed: {reason}")]
    Corrupt {
        project: String,
        key: BlobKey,
        reason: String,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { project, key, .. } => {
                format!("Could not load saved {key} for project '{project}'")
            }
            Self::Write { project, key, .. } => {
                format!("Could not save {key} for project '{project}'")
            }
            Self::Corrupt { project, key, .. } => {
                format!("Saved {key} for project '{project}' cannot be understood")
            }
            Self::Unavailable(msg) => format!("Storage is unavailable: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Corrupt { reason, .. } => Some(reason.clone()),
            Self::Read { reason, .. } | Self::Write { reason, .. } => Some(reason.clone()),
            Self::Unavailable(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Corrupt { .. } => vec!["Delete the damaged file under [storage] dir".to_string()],
            _ => vec![
                "Check permissions of the [storage] dir".to_string(),
                "Run 'blueprint config show' to see where state is stored".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Persistence
    }
}

/// Per-project JSON blob storage.
///
/// The store never interprets the documents it holds.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Read the blob stored under `key`, `None` if it was never written.
    async fn get_blob(&self, project: &ProjectId, key: BlobKey) -> Result<Option<Value>, StoreError>;

    /// Replace the blob stored under `key`.
    async fn set_blob(&self, project: &ProjectId, key: BlobKey, value: Value) -> Result<(), StoreError>;
}

/// Create the store selected by `[storage] backend`.
///
/// # Errors
///
/// Returns `StoreError::Unavailable` for an unknown backend or a storage
/// directory whose path is not valid UTF-8.
pub fn from_config(config: &Config) -> Result<Arc<dyn ProjectStore>, StoreError> {
    match config.storage.backend_kind() {
        Some(StorageBackend::Memory) => Ok(Arc::new(MemoryStore::new())),
        Some(StorageBackend::File) => Ok(Arc::new(FileStore::from_path(config.storage.dir.clone())?)),
        None => Err(StoreError::Unavailable(format!(
            "unknown storage backend '{}'",
            config.storage.backend
        ))),
    }
}
