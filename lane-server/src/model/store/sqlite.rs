//! Embedded SQLite dialect
//!
//! Parameters use `?` placeholders, ids of inserted rows are read back with
//! `last_insert_rowid`.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::{Result, Store, UserStore, WorkspaceStore, ensure_affected};
use crate::model::users::{User, UserId};
use crate::model::workspaces::{Workspace, WorkspaceDraft, WorkspaceId};

/// SQLite backed storage
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Database access
    db: SqlitePool,
}

impl SqliteStore {
    /// Opens database file, creating it if needed
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { db })
    }

    /// Creates a private in-memory database
    ///
    /// Every connection would see its own database, so the pool holds exactly one and never
    /// recycles it.
    pub async fn memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        Ok(Self { db })
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn user_by_username(&self, username: &str) -> Result<User> {
        let user = sqlx::query_as("select id, username, password from users where username = ?")
            .bind(username)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        let row: Option<(UserId,)> = sqlx::query_as("select id from users where username = ?")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let result = sqlx::query("insert into users (username, password) values (?, ?)")
            .bind(username)
            .bind(password)
            .execute(&self.db)
            .await?;

        Ok(User {
            id: UserId::new(result.last_insert_rowid()),
            username: username.to_owned(),
            password: password.to_owned(),
        })
    }
}

#[async_trait]
impl WorkspaceStore for SqliteStore {
    async fn count_workspaces_named(&self, name: &str, owner: UserId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("select count(*) from workspaces where name = ? and created_by = ?")
                .bind(name)
                .bind(owner)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    async fn create_workspace(&self, draft: &WorkspaceDraft, owner: UserId) -> Result<WorkspaceId> {
        let result =
            sqlx::query("insert into workspaces (name, description, created_by) values (?, ?, ?)")
                .bind(&draft.name)
                .bind(&draft.description)
                .bind(owner)
                .execute(&self.db)
                .await?;

        Ok(WorkspaceId::new(result.last_insert_rowid()))
    }

    async fn workspaces(&self, owner: UserId) -> Result<Vec<Workspace>> {
        let workspaces = sqlx::query_as(
            "select id, name, description, created_by, created_at from workspaces \
             where created_by = ? order by created_at desc, id desc",
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(workspaces)
    }

    async fn workspace(&self, id: WorkspaceId, owner: UserId) -> Result<Workspace> {
        let workspace = sqlx::query_as(
            "select id, name, description, created_by, created_at from workspaces \
             where id = ? and created_by = ?",
        )
        .bind(id)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;
        Ok(workspace)
    }

    async fn update_workspace(
        &self,
        id: WorkspaceId,
        draft: &WorkspaceDraft,
        owner: UserId,
    ) -> Result<()> {
        let result = sqlx::query(
            "update workspaces set name = ?, description = ? where id = ? and created_by = ?",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(id)
        .bind(owner)
        .execute(&self.db)
        .await?;

        ensure_affected(result.rows_affected())
    }

    async fn delete_workspace(&self, id: WorkspaceId, owner: UserId) -> Result<()> {
        let result = sqlx::query("delete from workspaces where id = ? and created_by = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;

        ensure_affected(result.rows_affected())
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn dialect(&self) -> &'static str {
        "embedded"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("select 1").execute(&self.db).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("migrations/sqlite").run(&self.db).await?;
        Ok(())
    }
}
