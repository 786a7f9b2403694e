//! Project authorization collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use blueprint_utils::ProjectId;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("user {user} may not access project {project}")]
    Forbidden { user: String, project: String },
}

/// Decides whether a caller may act on a project
#[async_trait]
pub trait ProjectAccess: Send + Sync {
    async fn authorize(&self, user: Option<&str>, project: &ProjectId) -> Result<(), AccessError>;
}

/// Grants every request; for local single-user runs
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl ProjectAccess for AllowAll {
    async fn authorize(&self, _user: Option<&str>, _project: &ProjectId) -> Result<(), AccessError> {
        Ok(())
    }
}

/// First user to touch a project owns it; everyone else is refused.
#[derive(Debug, Default)]
pub struct OwnerRegistry {
    owners: RwLock<HashMap<ProjectId, String>>,
}

impl OwnerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectAccess for OwnerRegistry {
    async fn authorize(&self, user: Option<&str>, project: &ProjectId) -> Result<(), AccessError> {
        let user = user
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(AccessError::Unauthenticated)?;

        let mut owners = self.owners.write().await;
        let owner = owners
            .entry(project.clone())
            .or_insert_with(|| user.to_string());
        if owner == user {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                user: user.to_string(),
                project: project.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_owner_registry() {
        let registry = OwnerRegistry::new();
        let project = ProjectId::new("p").unwrap();

        assert_eq!(
            registry.authorize(None, &project).await,
            Err(AccessError::Unauthenticated)
        );
        assert!(registry.authorize(Some("alice"), &project).await.is_ok());
        assert!(registry.authorize(Some("alice"), &project).await.is_ok());
        assert!(matches!(
            registry.authorize(Some("bob"), &project).await,
            Err(AccessError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_allow_all() {
        let project = ProjectId::new("p").unwrap();
        assert!(AllowAll.authorize(None, &project).await.is_ok());
    }
}
