//! Service global state

use std::sync::Arc;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tracing::{info, instrument};

pub mod auth;
pub mod session;
pub mod store;
pub mod users;
pub mod workspaces;

use crate::config::{self, Dialect};
use crate::model::auth::Authenticator;
use crate::model::session::TokenCodec;
use crate::model::store::{PostgresStore, SqliteStore, Store};
use crate::model::workspaces::Workspaces;

/// Account created on startup so a fresh deployment can be logged into
const DEFAULT_USERNAME: &str = "admin@local";
const DEFAULT_PASSWORD: &str = "ChangeMe123!";

/// State shared by all the request handlers
#[derive(Clone)]
pub struct Model {
    /// Storage of the configured dialect
    store: Arc<dyn Store>,
    tokens: TokenCodec,
}

impl Model {
    /// Model for testing purposes - private in-memory SQLite database
    #[cfg(test)]
    pub async fn test() -> Self {
        let store = SqliteStore::memory().await.unwrap();
        store.migrate().await.unwrap();

        Self {
            store: Arc::new(store),
            tokens: TokenCodec::new(session::tests::SECRET).unwrap(),
        }
    }

    /// Model from configuration
    ///
    /// Fails if the signing secret is missing or the database can't be reached. In-memory
    /// databases are always migrated, as they start empty.
    #[instrument(skip_all, fields(dialect = ?config.database.dialect))]
    pub async fn with_config(config: &config::Config) -> Result<Self> {
        let tokens = TokenCodec::new(&config.auth.secret)?;

        let db = &config.database;
        let store: Arc<dyn Store> = match db.dialect {
            Dialect::Embedded if db.embedded.in_memory() => Arc::new(SqliteStore::memory().await?),
            Dialect::Embedded => {
                Arc::new(SqliteStore::connect(&db.embedded.path, db.max_connections).await?)
            }
            Dialect::ClientServer => {
                Arc::new(PostgresStore::connect(&db.client_server, db.max_connections).await?)
            }
        };

        store.ping().await.wrap_err("Database is not reachable")?;

        if db.migrate || (db.dialect == Dialect::Embedded && db.embedded.in_memory()) {
            store.migrate().await?;
            info!(dialect = store.dialect(), "Database migrated");
        }

        let model = Self { store, tokens };
        if db.seed_default_user {
            model.seed_default_user().await?;
        }

        Ok(model)
    }

    /// Creates the default user unless it already exists
    async fn seed_default_user(&self) -> Result<()> {
        match self.auth().signup(DEFAULT_USERNAME, DEFAULT_PASSWORD).await {
            Ok(user) => info!(user_id = %user.id, username = DEFAULT_USERNAME, "Default user created"),
            Err(auth::Error::Conflict) => (),
            Err(err) => return Err(err).wrap_err("Cannot create default user"),
        }
        Ok(())
    }

    /// Accesses the storage
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn auth(&self) -> Authenticator {
        Authenticator::new(self.store.clone())
    }

    pub fn workspaces(&self) -> Workspaces {
        Workspaces::new(self.store.clone())
    }

    /// Session tokens codec
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }
}
