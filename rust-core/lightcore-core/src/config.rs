//! # Configuration
//!
//! Flat key/value configuration assembled from a `.env` file and the
//! process environment, plus the typed views the core needs out of it.
//!
//! Precedence, lowest first: `.env` file, then real environment variables.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default cap for request bodies (5 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

/// Flat string configuration map
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit pairs (tests, embedding)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot of the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Load `.env` (if the file exists) and overlay the process environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read, or
    /// `Error::Config` if a line doesn't parse.
    pub fn load(dotenv: impl AsRef<Path>) -> Result<Self> {
        let path = dotenv.as_ref();
        let mut config = if path.exists() {
            let iter = dotenvy::from_path_iter(path).map_err(dotenv_error)?;
            Self::from_pairs(read_dotenv(iter)?)
        } else {
            Self::new()
        };
        config.merge(Self::from_env());
        Ok(config)
    }

    /// Overlay another config; its values win
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Set a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a value or a default
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// First value present among several alias keys
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Parse a value into `T`; `Ok(None)` when the key is absent
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the value is present but doesn't parse.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|_| Error::config(key, format!("cannot parse '{raw}'")))
            })
            .transpose()
    }
}

/// Collect `.env` pairs in file order without touching the process environment
fn read_dotenv<R: Read>(iter: dotenvy::Iter<R>) -> Result<Vec<(String, String)>> {
    iter.map(|item| item.map_err(dotenv_error)).collect()
}

fn dotenv_error(err: dotenvy::Error) -> Error {
    match err {
        dotenvy::Error::Io(io) => Error::Io(io),
        other => Error::config(".env", other.to_string()),
    }
}

/// Supported database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    Postgres,
    /// SQLite (file path or `:memory:` as database name)
    Sqlite,
}

impl Driver {
    /// DSN prefix, as PDO spells it
    #[must_use]
    pub const fn dsn_prefix(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "pgsql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(Error::config("DB_DRIVER", format!("unsupported driver '{other}'"))),
        }
    }
}

/// Connection settings extracted from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database driver
    pub driver: Driver,
    /// Server host
    pub host: String,
    /// Optional server port
    pub port: Option<u16>,
    /// Database name (path for SQLite)
    pub database: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Pool size override
    pub max_connections: Option<u32>,
}

impl DatabaseConfig {
    /// Read `DB_*` keys, accepting the `DB_DATABASE`/`DB_USERNAME`/`DB_PASSWORD` aliases
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a required key is missing or malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let driver = config.get("DB_DRIVER").unwrap_or("mysql").parse::<Driver>()?;

        let database = config
            .get_any(&["DB_NAME", "DB_DATABASE"])
            .ok_or_else(|| Error::config("DB_NAME", "missing"))?
            .to_string();

        let (host, username, password) = if driver == Driver::Sqlite {
            (String::new(), String::new(), String::new())
        } else {
            let host = config
                .get("DB_HOST")
                .ok_or_else(|| Error::config("DB_HOST", "missing"))?;
            let username = config
                .get_any(&["DB_USER", "DB_USERNAME"])
                .ok_or_else(|| Error::config("DB_USER", "missing"))?;
            let password = config.get_any(&["DB_PASS", "DB_PASSWORD"]).unwrap_or("");
            (host.to_string(), username.to_string(), password.to_string())
        };

        Ok(Self {
            driver,
            host,
            port: config.parse("DB_PORT")?,
            database,
            username,
            password,
            max_connections: config.parse("DB_MAX_CONNECTIONS")?,
        })
    }

    /// In-memory SQLite settings with a single pooled connection
    #[must_use]
    pub fn sqlite_memory() -> Self {
        Self {
            driver: Driver::Sqlite,
            host: String::new(),
            port: None,
            database: ":memory:".to_string(),
            username: String::new(),
            password: String::new(),
            max_connections: Some(1),
        }
    }

    /// PDO-style DSN: `driver:host=<host>;dbname=<name>`
    #[must_use]
    pub fn dsn(&self) -> String {
        match self.driver {
            Driver::Sqlite => format!("sqlite:{}", self.database),
            driver => format!(
                "{}:host={};dbname={}",
                driver.dsn_prefix(),
                self.host,
                self.database
            ),
        }
    }

    /// Connection URL understood by sqlx, credentials percent-encoded
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match self.driver {
            Driver::MySql => "mysql",
            Driver::Postgres => "postgres",
            Driver::Sqlite => {
                return if self.database == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite://{}", self.database)
                };
            }
        };

        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        format!(
            "{scheme}://{}:{}@{}{port}/{}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.database
        )
    }
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::config("LOG_FORMAT", format!("unknown format '{other}'"))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Prefix stripped from request paths before route matching
    pub base_path: String,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            base_path: String::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            shutdown_timeout: Duration::from_secs(30),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Read `APP_*` and `LOG_FORMAT` keys over the defaults
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a present key fails to parse.
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let host = config.get_or("APP_HOST", "127.0.0.1");
        let port: u16 = config.parse("APP_PORT")?.unwrap_or(defaults.address.port());
        let address = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| Error::config("APP_HOST", e.to_string()))?;

        Ok(Self {
            address,
            base_path: config.get_or("APP_BASE_PATH", "").to_string(),
            max_body_size: config
                .parse("APP_MAX_BODY_SIZE")?
                .unwrap_or(defaults.max_body_size),
            shutdown_timeout: config
                .parse::<u64>("APP_SHUTDOWN_TIMEOUT")?
                .map_or(defaults.shutdown_timeout, Duration::from_secs),
            log_format: config
                .get("LOG_FORMAT")
                .map(str::parse::<LogFormat>)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}
