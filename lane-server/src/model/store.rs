//! Storage contract
//!
//! Every data access goes through the [`Store`] trait, which has one implementation per SQL
//! dialect. The dialect is picked once when the [`Model`](crate::model::Model) is built, the
//! rest of the service only ever sees `dyn Store`.
//!
//! Implementations have to behave the same way: all values are bound as query parameters,
//! missing rows are reported as [`Error::NotFound`] and uniqueness violations as
//! [`Error::Conflict`], whatever the driver reports them as.

use async_trait::async_trait;
use thiserror::Error;

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::model::users::{User, UserId};
use crate::model::workspaces::{Workspace, WorkspaceDraft, WorkspaceId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    Conflict,
    #[error("Database failure: {0}")]
    Database(#[source] sqlx::Error),
    #[error("Migration failure: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            err => Self::Database(err),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Access to user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetches the user with the given username
    async fn user_by_username(&self, username: &str) -> Result<User>;

    /// Checks if the username is taken
    async fn user_exists(&self, username: &str) -> Result<bool>;

    /// Inserts a new user returning the stored record
    async fn create_user(&self, username: &str, password: &str) -> Result<User>;
}

/// Access to workspace records
///
/// All operations are scoped by the owner - a workspace owned by someone else is
/// indistinguishable from a missing one.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Counts owner's workspaces with the given name
    async fn count_workspaces_named(&self, name: &str, owner: UserId) -> Result<i64>;

    /// Inserts a new workspace returning its id
    async fn create_workspace(&self, draft: &WorkspaceDraft, owner: UserId) -> Result<WorkspaceId>;

    /// Lists owner's workspaces, newest first
    async fn workspaces(&self, owner: UserId) -> Result<Vec<Workspace>>;

    /// Fetches single workspace
    async fn workspace(&self, id: WorkspaceId, owner: UserId) -> Result<Workspace>;

    /// Replaces name and description of the workspace
    async fn update_workspace(
        &self,
        id: WorkspaceId,
        draft: &WorkspaceDraft,
        owner: UserId,
    ) -> Result<()>;

    /// Removes the workspace
    async fn delete_workspace(&self, id: WorkspaceId, owner: UserId) -> Result<()>;
}

/// Complete storage backend
#[async_trait]
pub trait Store: UserStore + WorkspaceStore {
    /// Dialect name, for diagnostics
    fn dialect(&self) -> &'static str;

    /// Checks if the database is reachable
    async fn ping(&self) -> Result<()>;

    /// Brings the schema up to date
    async fn migrate(&self) -> Result<()>;
}

/// Fails with `NotFound` if the statement didn't touch any row
fn ensure_affected(rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    //! Behaviour every dialect has to share
    //!
    //! The suite runs against in-memory SQLite always, and against PostgreSQL when
    //! `DATABASE_URL` is set.

    use super::*;

    /// Username unique across test runs on persistent databases
    fn unique(name: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{name}-{nanos}")
    }

    fn draft(name: &str) -> WorkspaceDraft {
        WorkspaceDraft {
            name: name.to_owned(),
            description: Some(format!("{name} description")),
        }
    }

    pub async fn sqlite() -> SqliteStore {
        let store = SqliteStore::memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn postgres() -> Option<PostgresStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PostgresStore::connect_url(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    async fn users(store: &dyn Store) {
        let name = unique("user1");

        assert!(matches!(
            store.user_by_username(&name).await,
            Err(Error::NotFound)
        ));
        assert!(!store.user_exists(&name).await.unwrap());

        let created = store.create_user(&name, "password1").await.unwrap();
        assert_eq!(created.username, name);
        assert_eq!(created.password, "password1");
        assert!(store.user_exists(&name).await.unwrap());

        let fetched = store.user_by_username(&name).await.unwrap();
        assert_eq!(created, fetched);

        let other = store.create_user(&unique("user2"), "password2").await.unwrap();
        assert_ne!(created.id, other.id);

        // Username uniqueness is enforced by the schema itself
        assert!(matches!(
            store.create_user(&name, "other").await,
            Err(Error::Conflict)
        ));
        assert_eq!(store.user_by_username(&name).await.unwrap(), created);
    }

    async fn workspaces(store: &dyn Store) {
        let owner = store.create_user(&unique("owner"), "pass").await.unwrap().id;
        let intruder = store.create_user(&unique("intruder"), "pass").await.unwrap().id;

        let first = store.create_workspace(&draft("first"), owner).await.unwrap();
        let second = store.create_workspace(&draft("second"), owner).await.unwrap();
        store.create_workspace(&draft("first"), intruder).await.unwrap();

        assert_eq!(store.count_workspaces_named("first", owner).await.unwrap(), 1);
        assert_eq!(store.count_workspaces_named("third", owner).await.unwrap(), 0);

        assert!(matches!(
            store.create_workspace(&draft("first"), owner).await,
            Err(Error::Conflict)
        ));

        let listed = store.workspaces(owner).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|ws| ws.id).collect();
        assert_eq!(ids, [second, first]);
        assert!(listed.iter().all(|ws| ws.created_by == owner));
        assert_eq!(listed[1].description.as_deref(), Some("first description"));

        let fetched = store.workspace(first, owner).await.unwrap();
        assert_eq!(fetched.name, "first");
        assert!(matches!(
            store.workspace(first, intruder).await,
            Err(Error::NotFound)
        ));

        let renamed = WorkspaceDraft {
            name: "renamed".to_owned(),
            description: None,
        };
        store.update_workspace(first, &renamed, owner).await.unwrap();
        let fetched = store.workspace(first, owner).await.unwrap();
        assert_eq!(fetched.name, "renamed");
        assert_eq!(fetched.description, None);

        assert!(matches!(
            store.update_workspace(first, &draft("hijacked"), intruder).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            store.update_workspace(first, &draft("second"), owner).await,
            Err(Error::Conflict)
        ));
        assert!(matches!(
            store.delete_workspace(first, intruder).await,
            Err(Error::NotFound)
        ));
        assert_eq!(store.workspace(first, owner).await.unwrap().name, "renamed");

        store.delete_workspace(first, owner).await.unwrap();
        assert!(matches!(
            store.workspace(first, owner).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            store.delete_workspace(first, owner).await,
            Err(Error::NotFound)
        ));
        assert_eq!(store.workspaces(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sqlite_users() {
        users(&sqlite().await).await;
    }

    #[tokio::test]
    async fn sqlite_workspaces() {
        workspaces(&sqlite().await).await;
    }

    #[tokio::test]
    async fn sqlite_ping() {
        let store = sqlite().await;
        store.ping().await.unwrap();
        assert_eq!(store.dialect(), "embedded");
    }

    #[tokio::test]
    async fn postgres_users() {
        let Some(store) = postgres().await else {
            return;
        };
        users(&store).await;
    }

    #[tokio::test]
    async fn postgres_workspaces() {
        let Some(store) = postgres().await else {
            return;
        };
        workspaces(&store).await;
    }
}
