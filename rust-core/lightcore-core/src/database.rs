//! # Database Module
//!
//! Async database connectivity with SQLx for SQLite, PostgreSQL and MySQL.
//!
//! SQL is written with `?` placeholders for every backend; PostgreSQL
//! statements are rewritten to `$1, $2, ...` before they are prepared.
//! Values are bound positionally from a [`DbValue`] slice and rows come
//! back as column-name maps.

use crate::config::{DatabaseConfig, Driver};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo};
use std::collections::HashMap;
use tracing::{debug, info};

/// One result row keyed by column name
pub type Row = HashMap<String, DbValue>;

/// Default pool size when the config doesn't set one
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Outcome of a statement that doesn't return rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Auto-increment id of the last insert, where the driver reports one
    pub last_insert_id: Option<i64>,
}

/// Database connection pool supporting multiple backends
#[derive(Debug, Clone)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
    /// MySQL connection pool
    MySql(MySqlPool),
}

/// Bind a `DbValue` slice onto a typed `sqlx::query`
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                DbValue::Null => query.bind(Option::<String>::None),
                DbValue::Int(v) => query.bind(*v),
                DbValue::Float(v) => query.bind(*v),
                DbValue::String(v) => query.bind(v.as_str()),
                DbValue::Bool(v) => query.bind(*v),
                DbValue::Bytes(v) => query.bind(v.as_slice()),
            };
        }
        query
    }};
}

impl DatabasePool {
    /// Open a pool for the configured driver
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` if the pool cannot be opened.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url();
        let pool = match config.driver {
            Driver::Sqlite => Self::connect_sqlite(&url, config.max_connections).await?,
            Driver::Postgres => Self::connect_postgres(&url, config.max_connections).await?,
            Driver::MySql => Self::connect_mysql(&url, config.max_connections).await?,
        };
        info!(dsn = %config.dsn(), "Database connection established");
        Ok(pool)
    }

    /// Connect to a SQLite database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pool = DatabasePool::connect_sqlite("sqlite::memory:", Some(1)).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` if the pool cannot be opened.
    pub async fn connect_sqlite(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .connect(url)
            .await
            .map_err(|e| Error::DatabaseConnection {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` if the pool cannot be opened.
    pub async fn connect_postgres(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .connect(url)
            .await
            .map_err(|e| Error::DatabaseConnection {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Connect to a MySQL database
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` if the pool cannot be opened.
    pub async fn connect_mysql(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .connect(url)
            .await
            .map_err(|e| Error::DatabaseConnection {
                message: format!("MySQL connection failed: {e}"),
            })?;

        Ok(Self::MySql(pool))
    }

    /// Backend of this pool
    #[must_use]
    pub const fn driver(&self) -> Driver {
        match self {
            Self::Sqlite(_) => Driver::Sqlite,
            Self::Postgres(_) => Driver::Postgres,
            Self::MySql(_) => Driver::MySql,
        }
    }

    /// Execute a statement that doesn't return rows (INSERT, UPDATE, DELETE, DDL)
    ///
    /// # Errors
    ///
    /// Returns `Error::SqlExecution` if the statement fails, or
    /// `Error::DatabaseConnection` if the connection is lost.
    pub async fn execute(&self, sql: &str, values: &[DbValue]) -> Result<ExecResult> {
        debug!(sql, bindings = values.len(), "Executing statement");
        match self {
            Self::Sqlite(pool) => {
                let result = bind_values!(sqlx::query::<Sqlite>(sql), values)
                    .execute(pool)
                    .await
                    .map_err(|e| query_error(sql, e))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: Some(result.last_insert_rowid()),
                })
            }
            Self::Postgres(pool) => {
                let sql = numbered_placeholders(sql);
                let result = bind_values!(sqlx::query::<Postgres>(&sql), values)
                    .execute(pool)
                    .await
                    .map_err(|e| query_error(&sql, e))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                })
            }
            Self::MySql(pool) => {
                let result = bind_values!(sqlx::query::<MySql>(sql), values)
                    .execute(pool)
                    .await
                    .map_err(|e| query_error(sql, e))?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: i64::try_from(result.last_insert_id()).ok(),
                })
            }
        }
    }

    /// Fetch all rows from a query
    ///
    /// # Errors
    ///
    /// Returns `Error::SqlExecution` if the query fails, or
    /// `Error::DatabaseConnection` if the connection is lost.
    pub async fn fetch_all(&self, sql: &str, values: &[DbValue]) -> Result<Vec<Row>> {
        debug!(sql, bindings = values.len(), "Fetching rows");
        match self {
            Self::Sqlite(pool) => {
                let rows: Vec<SqliteRow> = bind_values!(sqlx::query::<Sqlite>(sql), values)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| query_error(sql, e))?;

                Ok(rows.iter().map(sqlite_row_to_map).collect())
            }
            Self::Postgres(pool) => {
                let sql = numbered_placeholders(sql);
                let rows: Vec<PgRow> = bind_values!(sqlx::query::<Postgres>(&sql), values)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| query_error(&sql, e))?;

                Ok(rows.iter().map(pg_row_to_map).collect())
            }
            Self::MySql(pool) => {
                let rows: Vec<MySqlRow> = bind_values!(sqlx::query::<MySql>(sql), values)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| query_error(sql, e))?;

                Ok(rows.iter().map(mysql_row_to_map).collect())
            }
        }
    }

    /// Fetch the first row, if any
    ///
    /// # Errors
    ///
    /// See [`DatabasePool::fetch_all`].
    pub async fn fetch_optional(&self, sql: &str, values: &[DbValue]) -> Result<Option<Row>> {
        Ok(self.fetch_all(sql, values).await?.into_iter().next())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
    }

    /// Whether the pool has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Sqlite(pool) => pool.is_closed(),
            Self::Postgres(pool) => pool.is_closed(),
            Self::MySql(pool) => pool.is_closed(),
        }
    }
}

/// Classify a driver error raised while running `sql`
fn query_error(sql: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_)
        | sqlx::Error::WorkerCrashed => Error::DatabaseConnection {
            message: err.to_string(),
        },
        other => Error::SqlExecution {
            sql: sql.to_string(),
            message: other.to_string(),
        },
    }
}

/// Rewrite `?` placeholders to `$1, $2, ...`, leaving quoted text alone
#[must_use]
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(q), _) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

/// Database value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

impl DbValue {
    /// Check for `NULL`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer value; numeric strings are parsed
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Float value
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// String value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value; integers are truthy when non-zero
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for DbValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<Value> for DbValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::String(n.to_string())),
            Value::String(s) => Self::String(s),
            other => Self::String(other.to_string()),
        }
    }
}

impl From<&Value> for DbValue {
    fn from(v: &Value) -> Self {
        Self::from(v.clone())
    }
}

/// Convert SQLite row to HashMap
fn sqlite_row_to_map(row: &SqliteRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "INTEGER" | "INT8" | "BIGINT" => row
                .try_get::<i64, _>(i)
                .map(DbValue::Int)
                .unwrap_or(DbValue::Null),
            "REAL" => row
                .try_get::<f64, _>(i)
                .map(DbValue::Float)
                .unwrap_or(DbValue::Null),
            "BOOLEAN" => row
                .try_get::<bool, _>(i)
                .map(DbValue::Bool)
                .unwrap_or(DbValue::Null),
            "BLOB" => row
                .try_get::<Vec<u8>, _>(i)
                .map(DbValue::Bytes)
                .unwrap_or(DbValue::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(DbValue::String)
                .unwrap_or(DbValue::Null),
        };

        map.insert(name, value);
    }

    map
}

/// Convert PostgreSQL row to HashMap
fn pg_row_to_map(row: &PgRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "INT2" => row
                .try_get::<i16, _>(i)
                .map(|v| DbValue::Int(i64::from(v)))
                .unwrap_or(DbValue::Null),
            "INT4" => row
                .try_get::<i32, _>(i)
                .map(|v| DbValue::Int(i64::from(v)))
                .unwrap_or(DbValue::Null),
            "INT8" => row
                .try_get::<i64, _>(i)
                .map(DbValue::Int)
                .unwrap_or(DbValue::Null),
            "FLOAT4" => row
                .try_get::<f32, _>(i)
                .map(|v| DbValue::Float(f64::from(v)))
                .unwrap_or(DbValue::Null),
            "FLOAT8" => row
                .try_get::<f64, _>(i)
                .map(DbValue::Float)
                .unwrap_or(DbValue::Null),
            "BOOL" => row
                .try_get::<bool, _>(i)
                .map(DbValue::Bool)
                .unwrap_or(DbValue::Null),
            "BYTEA" => row
                .try_get::<Vec<u8>, _>(i)
                .map(DbValue::Bytes)
                .unwrap_or(DbValue::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(DbValue::String)
                .unwrap_or(DbValue::Null),
        };

        map.insert(name, value);
    }

    map
}

/// Convert MySQL row to HashMap
fn mysql_row_to_map(row: &MySqlRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "BOOLEAN" => row
                .try_get::<bool, _>(i)
                .map(DbValue::Bool)
                .unwrap_or(DbValue::Null),
            t if t.ends_with("INT UNSIGNED") => row
                .try_get::<u64, _>(i)
                .ok()
                .and_then(|v| i64::try_from(v).ok())
                .map_or(DbValue::Null, DbValue::Int),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
                .try_get::<i64, _>(i)
                .map(DbValue::Int)
                .unwrap_or(DbValue::Null),
            "FLOAT" => row
                .try_get::<f32, _>(i)
                .map(|v| DbValue::Float(f64::from(v)))
                .unwrap_or(DbValue::Null),
            "DOUBLE" => row
                .try_get::<f64, _>(i)
                .map(DbValue::Float)
                .unwrap_or(DbValue::Null),
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => row
                .try_get::<Vec<u8>, _>(i)
                .map(DbValue::Bytes)
                .unwrap_or(DbValue::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(DbValue::String)
                .unwrap_or(DbValue::Null),
        };

        map.insert(name, value);
    }

    map
}
