//! Service configuration
//!
//! Configuration is layered: built-in defaults, then the TOML file, then `SECRETLANE__*`
//! environment variables (`__` separates nested keys, eg. `SECRETLANE__AUTH__SECRET`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use ::config::{ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use tracing_subscriber::filter::Directive;

/// Prefix of environment variables overriding the configuration
const ENV_PREFIX: &str = "SECRETLANE";

/// Logging output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Compact
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Auth {
    /// Secret session tokens are signed with. Required.
    #[serde(default)]
    pub secret: String,

    /// Marks session cookie as HTTPS only
    #[serde(default)]
    pub secure_cookie: bool,
}

/// Cross-origin requests policy
#[derive(Debug, Clone, Deserialize)]
pub struct Cors {
    /// The only origin allowed to make credentialed requests
    #[serde(default = "Cors::default_allowed_origin")]
    pub allowed_origin: String,
}

impl Cors {
    fn default_allowed_origin() -> String {
        "http://localhost:3000".to_owned()
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allowed_origin: Self::default_allowed_origin(),
        }
    }
}

/// SQL dialect the service talks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// SQLite database file
    Embedded,
    /// PostgreSQL server
    ClientServer,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Embedded
    }
}

/// Embedded database settings
#[derive(Debug, Clone, Deserialize)]
pub struct Embedded {
    /// Database file, `:memory:` for in-memory database
    #[serde(default = "Embedded::default_path")]
    pub path: PathBuf,
}

impl Embedded {
    fn default_path() -> PathBuf {
        "sqlite-secretlane.db".into()
    }

    /// Checks if this is the in-memory database
    pub fn in_memory(&self) -> bool {
        self.path == Path::new(":memory:")
    }
}

impl Default for Embedded {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

/// Database server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientServer {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}

impl Default for ClientServer {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: String::new(),
            dbname: "secretlane".to_owned(),
            sslmode: "disable".to_owned(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub dialect: Dialect,

    /// Connection pool size
    #[serde(default = "Database::default_max_connections")]
    pub max_connections: u32,

    /// Runs migrations on startup
    #[serde(default = "Database::default_true")]
    pub migrate: bool,

    /// Creates the default admin user on startup
    #[serde(default = "Database::default_true")]
    pub seed_default_user: bool,

    #[serde(default)]
    pub embedded: Embedded,

    #[serde(default)]
    pub client_server: ClientServer,
}

impl Database {
    fn default_max_connections() -> u32 {
        5
    }

    fn default_true() -> bool {
        true
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_connections: Self::default_max_connections(),
            migrate: true,
            seed_default_user: true,
            embedded: Embedded::default(),
            client_server: ClientServer::default(),
        }
    }
}

/// Top level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address where to host the service
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,

    #[serde(default)]
    pub auth: Auth,

    #[serde(default)]
    pub cors: Cors,

    #[serde(default)]
    pub database: Database,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 8080).into()
    }

    /// Loads configuration from the file (if it exists) and process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let env = env
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("logging.filters");

        ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
