//! Workspaces owned by users

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use thiserror::Error;
use tracing::{info, instrument};

use crate::model::store::{self, Store};
use crate::model::users::UserId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("workspace not found")]
    NotFound,
    #[error("workspace with this name already exists")]
    Conflict,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Storage(store::Error),
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        match err {
            store::Error::NotFound => Self::NotFound,
            store::Error::Conflict => Self::Conflict,
            err => Self::Storage(err),
        }
    }
}

/// Workspace id newtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct WorkspaceId(i64);

impl WorkspaceId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub description: Option<String>,
    /// Owner, never changes after creation
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// User provided part of the workspace, used both for creation and update
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkspaceDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl WorkspaceDraft {
    fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("workspace name is required"));
        }
        Ok(())
    }
}

/// Workspaces manager
///
/// Every operation takes the acting user, and never reaches workspaces owned by anyone else.
#[derive(Clone)]
pub struct Workspaces {
    store: Arc<dyn Store>,
}

impl Workspaces {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a workspace, names are unique per owner
    #[instrument(skip(self))]
    pub async fn create(&self, draft: &WorkspaceDraft, owner: UserId) -> Result<WorkspaceId, Error> {
        draft.validate()?;

        if self.store.count_workspaces_named(&draft.name, owner).await? > 0 {
            return Err(Error::Conflict);
        }

        // A concurrent insert of the same name is rejected by the unique index
        let id = self.store.create_workspace(draft, owner).await?;
        info!(%id, "Workspace created");
        Ok(id)
    }

    /// Owner's workspaces, newest first
    pub async fn list(&self, owner: UserId) -> Result<Vec<Workspace>, Error> {
        Ok(self.store.workspaces(owner).await?)
    }

    pub async fn get(&self, id: WorkspaceId, owner: UserId) -> Result<Workspace, Error> {
        Ok(self.store.workspace(id, owner).await?)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: WorkspaceId,
        draft: &WorkspaceDraft,
        owner: UserId,
    ) -> Result<(), Error> {
        draft.validate()?;
        self.store.update_workspace(id, draft, owner).await?;
        info!("Workspace updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: WorkspaceId, owner: UserId) -> Result<(), Error> {
        self.store.delete_workspace(id, owner).await?;
        info!("Workspace deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::UserStore;
    use crate::model::store::tests::sqlite;

    fn draft(name: &str) -> WorkspaceDraft {
        WorkspaceDraft {
            name: name.to_owned(),
            description: None,
        }
    }

    async fn setup() -> (Workspaces, UserId, UserId) {
        let store = sqlite().await;
        let user1 = store.create_user("user1", "pass1").await.unwrap().id;
        let user2 = store.create_user("user2", "pass2").await.unwrap().id;
        (Workspaces::new(Arc::new(store)), user1, user2)
    }

    #[tokio::test]
    async fn duplicate_names_per_owner() {
        let (workspaces, user1, user2) = setup().await;

        workspaces.create(&draft("notes"), user1).await.unwrap();
        assert!(matches!(
            workspaces.create(&draft("notes"), user1).await,
            Err(Error::Conflict)
        ));

        // Another user can pick the same name
        workspaces.create(&draft("notes"), user2).await.unwrap();

        assert_eq!(workspaces.list(user1).await.unwrap().len(), 1);
        assert_eq!(workspaces.list(user2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let (workspaces, user1, _) = setup().await;

        assert!(matches!(
            workspaces.create(&draft("  "), user1).await,
            Err(Error::Validation(_))
        ));

        let id = workspaces.create(&draft("notes"), user1).await.unwrap();
        assert!(matches!(
            workspaces.update(id, &draft(""), user1).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(workspaces.get(id, user1).await.unwrap().name, "notes");
    }

    #[tokio::test]
    async fn listing_scoped_and_newest_first() {
        let (workspaces, user1, user2) = setup().await;

        let a = workspaces.create(&draft("a"), user1).await.unwrap();
        let b = workspaces.create(&draft("b"), user2).await.unwrap();
        let c = workspaces.create(&draft("c"), user1).await.unwrap();

        let listed: Vec<_> = workspaces
            .list(user1)
            .await
            .unwrap()
            .into_iter()
            .map(|ws| ws.id)
            .collect();
        assert_eq!(listed, [c, a]);

        let listed = workspaces.list(user2).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, b);
        assert_eq!(listed[0].created_by, user2);
    }

    #[tokio::test]
    async fn foreign_workspace_untouchable() {
        let (workspaces, user1, user2) = setup().await;

        let id = workspaces
            .create(
                &WorkspaceDraft {
                    name: "private".to_owned(),
                    description: Some("secret plans".to_owned()),
                },
                user1,
            )
            .await
            .unwrap();
        let before = workspaces.get(id, user1).await.unwrap();

        assert!(matches!(
            workspaces.get(id, user2).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            workspaces.update(id, &draft("mine now"), user2).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            workspaces.delete(id, user2).await,
            Err(Error::NotFound)
        ));

        assert_eq!(workspaces.get(id, user1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn rename_into_taken_name() {
        let (workspaces, user1, _) = setup().await;

        let first = workspaces.create(&draft("first"), user1).await.unwrap();
        workspaces.create(&draft("second"), user1).await.unwrap();

        assert!(matches!(
            workspaces.update(first, &draft("second"), user1).await,
            Err(Error::Conflict)
        ));

        // Keeping own name is not a clash
        workspaces.update(first, &draft("first"), user1).await.unwrap();
    }
}
