//! # Database Connection
//!
//! Lazily opened handle over a [`DatabasePool`]. Nothing touches the
//! database until the first statement runs; a failed open is reported to
//! that caller and is never retried in the background. After
//! [`Connection::disconnect`] the next statement opens a fresh pool.

use crate::config::{DatabaseConfig, Driver};
use crate::database::{DatabasePool, DbValue, ExecResult, Row};
use crate::error::Result;
use crate::query::QueryBuilder;
use tokio::sync::RwLock;
use tracing::info;

/// Database connection
#[derive(Debug)]
pub struct Connection {
    config: DatabaseConfig,
    pool: RwLock<Option<DatabasePool>>,
}

impl Connection {
    /// Connection that opens on first use
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    /// Wrap an already opened pool
    #[must_use]
    pub fn from_pool(config: DatabaseConfig, pool: DatabasePool) -> Self {
        Self {
            config,
            pool: RwLock::new(Some(pool)),
        }
    }

    /// Open the pool if needed and return it
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` if the pool cannot be opened.
    pub async fn pool(&self) -> Result<DatabasePool> {
        if let Some(pool) = self.pool.read().await.as_ref() {
            return Ok(pool.clone());
        }
        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }
        let pool = DatabasePool::connect(&self.config).await?;
        *slot = Some(pool.clone());
        Ok(pool)
    }

    /// Configured backend
    #[must_use]
    pub const fn driver(&self) -> Driver {
        self.config.driver
    }

    /// Connection settings
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// `driver:host=<host>;dbname=<name>`
    #[must_use]
    pub fn dsn(&self) -> String {
        self.config.dsn()
    }

    /// Whether the pool has been opened and not closed since
    ///
    /// Reports `false` while another task is still opening it.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pool
            .try_read()
            .is_ok_and(|slot| slot.as_ref().is_some_and(|pool| !pool.is_closed()))
    }

    /// Run a statement with positional `?` bindings
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` or `Error::SqlExecution`.
    pub async fn execute(&self, sql: &str, bindings: &[DbValue]) -> Result<ExecResult> {
        self.pool().await?.execute(sql, bindings).await
    }

    /// Run a query with positional `?` bindings and collect the rows
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` or `Error::SqlExecution`.
    pub async fn fetch_all(&self, sql: &str, bindings: &[DbValue]) -> Result<Vec<Row>> {
        self.pool().await?.fetch_all(sql, bindings).await
    }

    /// Start a query on `table`
    #[must_use]
    pub fn table(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    /// Close the pool if it was opened; the next statement reopens it
    pub async fn disconnect(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            info!(dsn = %self.dsn(), "Database connection closed");
        }
    }
}
