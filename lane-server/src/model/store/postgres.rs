//! Client-server PostgreSQL dialect
//!
//! Parameters use positional `$n` placeholders, ids of inserted rows come back through
//! `returning id`.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use super::{Result, Store, UserStore, WorkspaceStore, ensure_affected};
use crate::config;
use crate::model::users::{User, UserId};
use crate::model::workspaces::{Workspace, WorkspaceDraft, WorkspaceId};

/// PostgreSQL backed storage
#[derive(Debug, Clone)]
pub struct PostgresStore {
    /// Database access
    db: PgPool,
}

impl PostgresStore {
    /// Connects using the service configuration
    pub async fn connect(config: &config::ClientServer, max_connections: u32) -> Result<Self> {
        let mut opts = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.dbname)
            .ssl_mode(PgSslMode::from_str(&config.sslmode)?);

        if !config.password.is_empty() {
            opts = opts.password(&config.password);
        }

        Self::connect_with(opts, max_connections).await
    }

    /// Connects using a `postgres://` url
    #[cfg(test)]
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        Self::connect_with(PgConnectOptions::from_str(url)?, max_connections).await
    }

    async fn connect_with(opts: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { db })
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn user_by_username(&self, username: &str) -> Result<User> {
        let user = sqlx::query_as("select id, username, password from users where username = $1")
            .bind(username)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        let row: Option<(UserId,)> = sqlx::query_as("select id from users where username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let (id,): (UserId,) =
            sqlx::query_as("insert into users (username, password) values ($1, $2) returning id")
                .bind(username)
                .bind(password)
                .fetch_one(&self.db)
                .await?;

        Ok(User {
            id,
            username: username.to_owned(),
            password: password.to_owned(),
        })
    }
}

#[async_trait]
impl WorkspaceStore for PostgresStore {
    async fn count_workspaces_named(&self, name: &str, owner: UserId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("select count(*) from workspaces where name = $1 and created_by = $2")
                .bind(name)
                .bind(owner)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    async fn create_workspace(&self, draft: &WorkspaceDraft, owner: UserId) -> Result<WorkspaceId> {
        let (id,): (WorkspaceId,) = sqlx::query_as(
            "insert into workspaces (name, description, created_by) values ($1, $2, $3) \
             returning id",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn workspaces(&self, owner: UserId) -> Result<Vec<Workspace>> {
        let workspaces = sqlx::query_as(
            "select id, name, description, created_by, created_at from workspaces \
             where created_by = $1 order by created_at desc, id desc",
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(workspaces)
    }

    async fn workspace(&self, id: WorkspaceId, owner: UserId) -> Result<Workspace> {
        let workspace = sqlx::query_as(
            "select id, name, description, created_by, created_at from workspaces \
             where id = $1 and created_by = $2",
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
            "update workspaces set name = $1, description = $2 where id = $3 and created_by = $4",
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
        let result = sqlx::query("delete from workspaces where id = $1 and created_by = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;

        ensure_affected(result.rows_affected())
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn dialect(&self) -> &'static str {
        "client-server"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("select 1").execute(&self.db).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("migrations/postgres").run(&self.db).await?;
        Ok(())
    }
}
