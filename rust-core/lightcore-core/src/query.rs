//! # Query Builder
//!
//! Fluent SQL builder over one table. Clauses accumulate on the builder and
//! a terminal call (`get`, `first`, `insert`, `update`, `delete`) renders
//! and runs exactly one statement through the [`Connection`].
//!
//! Every WHERE predicate contributes exactly one `?` and one binding, in
//! append order, so `wheres[i]` always lines up with `bindings[i]`. Join
//! conditions, column names and operators are emitted as-is and must come
//! from trusted code.
//!
//! ```ignore
//! let rows = conn
//!     .table("users")
//!     .select(["users.id", "users.name"])
//!     .left_join("tasks", "tasks.user_id", "=", "users.id")
//!     .and_where("users.active", "=", true)
//!     .order_by_asc("users.name")
//!     .limit(10)
//!     .get()
//!     .await?;
//! ```

use crate::config::Driver;
use crate::connection::Connection;
use crate::database::{DbValue, Row};
use crate::error::{Error, Result};
use std::str::FromStr;

/// Boolean connector attached to a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Connector {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone)]
struct Predicate {
    connector: Connector,
    column: String,
    operator: String,
}

/// Join flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

impl JoinKind {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// `ASC`
    #[default]
    Asc,
    /// `DESC`
    Desc,
}

impl Direction {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(Error::InvalidQuery {
                reason: format!("unknown sort direction '{s}'"),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    first: String,
    operator: String,
    second: String,
}

/// Fluent query over one table
#[derive(Debug, Clone)]
pub struct QueryBuilder<'c> {
    conn: &'c Connection,
    table: String,
    selects: Vec<String>,
    joins: Vec<Join>,
    wheres: Vec<Predicate>,
    bindings: Vec<DbValue>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u64>,
}

impl<'c> QueryBuilder<'c> {
    /// Empty query on `table`
    #[must_use]
    pub fn new(conn: &'c Connection, table: &str) -> Self {
        Self {
            conn,
            table: table.to_string(),
            selects: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            bindings: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Set the projection; `*` when never called
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selects = columns.into_iter().map(Into::into).collect();
        self
    }

    fn push_where(mut self, connector: Connector, column: &str, operator: &str, value: DbValue) -> Self {
        self.wheres.push(Predicate {
            connector,
            column: column.to_string(),
            operator: operator.to_string(),
        });
        self.bindings.push(value);
        self
    }

    /// Add an `AND` predicate
    #[must_use]
    pub fn and_where(self, column: &str, operator: &str, value: impl Into<DbValue>) -> Self {
        self.push_where(Connector::And, column, operator, value.into())
    }

    /// Add an `OR` predicate
    #[must_use]
    pub fn or_where(self, column: &str, operator: &str, value: impl Into<DbValue>) -> Self {
        self.push_where(Connector::Or, column, operator, value.into())
    }

    fn push_join(mut self, kind: JoinKind, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
        });
        self
    }

    /// Add an inner join
    #[must_use]
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Inner, table, first, operator, second)
    }

    /// Add a left join
    #[must_use]
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Left, table, first, operator, second)
    }

    /// Add a right join
    #[must_use]
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Right, table, first, operator, second)
    }

    /// Add an ORDER BY term
    ///
    /// Directions coming from user input go through `str::parse::<Direction>`.
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Add an ascending ORDER BY term
    #[must_use]
    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, Direction::Asc)
    }

    /// Add a descending ORDER BY term
    #[must_use]
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Set the row limit
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Accumulated WHERE bindings, in predicate order
    #[must_use]
    pub fn bindings(&self) -> &[DbValue] {
        &self.bindings
    }

    /// Table name
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn where_clause(&self) -> String {
        if self.wheres.is_empty() {
            return String::new();
        }
        let mut sql = String::from(" WHERE ");
        for (i, predicate) in self.wheres.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(predicate.connector.as_sql());
                sql.push(' ');
            }
            sql.push_str(&predicate.column);
            sql.push(' ');
            sql.push_str(&predicate.operator);
            sql.push_str(" ?");
        }
        sql
    }

    /// Render the SELECT statement without running it
    #[must_use]
    pub fn to_sql(&self) -> String {
        let columns = if self.selects.is_empty() {
            "*".to_string()
        } else {
            self.selects.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);

        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {} {} {}",
                join.kind.as_sql(),
                join.table,
                join.first,
                join.operator,
                join.second
            ));
        }

        sql.push_str(&self.where_clause());

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    /// Render `INSERT INTO <table> (<cols>) VALUES (?, ...)` and its bindings
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload.
    pub fn insert_statement<I, K, V>(&self, data: I) -> Result<(String, Vec<DbValue>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let (columns, values) = split_payload(data, "insert")?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.table,
            columns.join(", ")
        );
        Ok((sql, values))
    }

    /// Render `UPDATE <table> SET col = ?, ...` plus the WHERE clause
    ///
    /// Bindings are the data values followed by the WHERE bindings, matching
    /// placeholder order.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload.
    pub fn update_statement<I, K, V>(&self, data: I) -> Result<(String, Vec<DbValue>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let (columns, mut values) = split_payload(data, "update")?;
        let sets: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.table,
            sets.join(", "),
            self.where_clause()
        );
        values.extend(self.bindings.iter().cloned());
        Ok((sql, values))
    }

    /// Render `DELETE FROM <table>` plus the WHERE clause
    #[must_use]
    pub fn delete_statement(&self) -> (String, Vec<DbValue>) {
        (
            format!("DELETE FROM {}{}", self.table, self.where_clause()),
            self.bindings.clone(),
        )
    }

    /// Run the SELECT and return every row
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` or `Error::SqlExecution`.
    pub async fn get(self) -> Result<Vec<Row>> {
        let sql = self.to_sql();
        self.conn.fetch_all(&sql, &self.bindings).await
    }

    /// Run the SELECT with `LIMIT 1`
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseConnection` or `Error::SqlExecution`.
    pub async fn first(self) -> Result<Option<Row>> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }

    /// Insert one row; `true` if a row was written
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload, or a database error.
    pub async fn insert<I, K, V>(self, data: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let (sql, values) = self.insert_statement(data)?;
        Ok(self.conn.execute(&sql, &values).await?.rows_affected > 0)
    }

    /// Insert one row and return its generated `id`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload, or a database error.
    pub async fn insert_get_id<I, K, V>(self, data: I) -> Result<Option<i64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        self.insert_get_key(data, "id").await
    }

    /// Insert one row and return the generated value of `key`
    ///
    /// PostgreSQL reports no insert id, so the statement gets a
    /// `RETURNING <key>` suffix there.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload, or a database error.
    pub async fn insert_get_key<I, K, V>(self, data: I, key: &str) -> Result<Option<i64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let (sql, values) = self.insert_statement(data)?;
        if self.conn.driver() == Driver::Postgres {
            let rows = self
                .conn
                .fetch_all(&format!("{sql} RETURNING {key}"), &values)
                .await?;
            return Ok(rows
                .first()
                .and_then(|row| row.get(key))
                .and_then(DbValue::as_i64));
        }
        let result = self.conn.execute(&sql, &values).await?;
        Ok(if result.rows_affected > 0 {
            result.last_insert_id
        } else {
            None
        })
    }

    /// Update rows matching the accumulated predicates; `true` if any changed
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload, or a database error.
    pub async fn update<I, K, V>(self, data: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let (sql, values) = self.update_statement(data)?;
        Ok(self.conn.execute(&sql, &values).await?.rows_affected > 0)
    }

    /// Delete rows matching the accumulated predicates; `true` if any went
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn delete(self) -> Result<bool> {
        let (sql, values) = self.delete_statement();
        Ok(self.conn.execute(&sql, &values).await?.rows_affected > 0)
    }
}

fn split_payload<I, K, V>(data: I, operation: &str) -> Result<(Vec<String>, Vec<DbValue>)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DbValue>,
{
    let (columns, values): (Vec<String>, Vec<DbValue>) = data
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .unzip();
    if columns.is_empty() {
        return Err(Error::InvalidQuery {
            reason: format!("{operation} needs at least one column"),
        });
    }
    Ok((columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    fn conn() -> Connection {
        Connection::new(DatabaseConfig::sqlite_memory())
    }

    async fn seeded() -> Connection {
        let conn = conn();
        conn.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)",
            &[],
        )
        .await
        .unwrap();
        conn.execute("CREATE TABLE tasks (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)", &[])
            .await
            .unwrap();
        for (name, age) in [("ann", 30), ("bob", 25), ("cid", 41)] {
            conn.table("users")
                .insert([("name", DbValue::from(name)), ("age", DbValue::from(age))])
                .await
                .unwrap();
        }
        conn.execute("INSERT INTO tasks (user_id, title) VALUES (1, 'write')", &[])
            .await
            .unwrap();
        conn
    }

    #[test]
    fn test_select_defaults_to_star() {
        let conn = conn();
        assert_eq!(conn.table("users").to_sql(), "SELECT * FROM users");
    }

    #[test]
    fn test_where_or_where_rendering() {
        let conn = conn();
        let query = conn
            .table("users")
            .and_where("a", "=", 1)
            .or_where("b", ">", 2);
        assert_eq!(query.to_sql(), "SELECT * FROM users WHERE a = ? OR b > ?");
        assert_eq!(query.bindings(), &[DbValue::Int(1), DbValue::Int(2)]);
    }

    #[test]
    fn test_connector_belongs_to_following_predicate() {
        let conn = conn();
        let query = conn
            .table("t")
            .or_where("a", "=", 1)
            .and_where("b", "=", 2)
            .or_where("c", "=", 3);
        assert_eq!(query.to_sql(), "SELECT * FROM t WHERE a = ? AND b = ? OR c = ?");
    }

    #[test]
    fn test_full_select() {
        let conn = conn();
        let sql = conn
            .table("users")
            .select(["users.id", "tasks.title"])
            .join("a", "a.id", "=", "users.a_id")
            .left_join("tasks", "tasks.user_id", "=", "users.id")
            .right_join("b", "b.id", "=", "users.b_id")
            .and_where("users.age", ">=", 18)
            .order_by_asc("users.name")
            .order_by_desc("users.id")
            .limit(5)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT users.id, tasks.title FROM users \
             JOIN a ON a.id = users.a_id \
             LEFT JOIN tasks ON tasks.user_id = users.id \
             RIGHT JOIN b ON b.id = users.b_id \
             WHERE users.age >= ? ORDER BY users.name ASC, users.id DESC LIMIT 5"
        );
    }

    #[test]
    fn test_insert_statement() {
        let conn = conn();
        let (sql, values) = conn
            .table("users")
            .insert_statement([("name", "x")])
            .unwrap();
        assert_eq!(sql, "INSERT INTO users (name) VALUES (?)");
        assert_eq!(values, vec![DbValue::from("x")]);
    }

    #[test]
    fn test_update_binds_data_before_where() {
        let conn = conn();
        let (sql, values) = conn
            .table("users")
            .and_where("id", "=", 7)
            .update_statement([("name", "y")])
            .unwrap();
        assert_eq!(sql, "UPDATE users SET name = ? WHERE id = ?");
        assert_eq!(values, vec![DbValue::from("y"), DbValue::Int(7)]);
    }

    #[test]
    fn test_delete_statement() {
        let conn = conn();
        let (sql, values) = conn
            .table("users")
            .and_where("id", "=", 3)
            .or_where("name", "=", "z")
            .delete_statement();
        assert_eq!(sql, "DELETE FROM users WHERE id = ? OR name = ?");
        assert_eq!(values, vec![DbValue::Int(3), DbValue::from("z")]);
    }

    #[test]
    fn test_empty_payload_rejected() {
        let conn = conn();
        let empty: Vec<(String, DbValue)> = Vec::new();
        assert!(matches!(
            conn.table("users").insert_statement(empty.clone()),
            Err(Error::InvalidQuery { .. })
        ));
        assert!(matches!(
            conn.table("users").update_statement(empty),
            Err(Error::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("asc".parse::<Direction>().unwrap(), Direction::Asc);
        assert_eq!("Desc".parse::<Direction>().unwrap(), Direction::Desc);
        assert_eq!(Direction::default(), Direction::Asc);

        let err = "ascc".parse::<Direction>().unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn test_order_by_renders_known_directions_only() {
        let conn = conn();
        let sql = conn
            .table("users")
            .order_by("age", Direction::default())
            .order_by("name", Direction::Desc)
            .to_sql();
        assert_eq!(sql, "SELECT * FROM users ORDER BY age ASC, name DESC");
    }

    #[tokio::test]
    async fn test_get_first_with_bindings() {
        let conn = seeded().await;

        let rows = conn
            .table("users")
            .and_where("age", ">", 26)
            .order_by("name", "DESC".parse().unwrap())
            .get()
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
        assert_eq!(names, ["cid", "ann"]);

        let first = conn
            .table("users")
            .and_where("name", "=", "bob")
            .first()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["age"], DbValue::Int(25));

        let none = conn.table("users").and_where("name", "=", "zed").first().await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_left_join_keeps_unmatched_rows() {
        let conn = seeded().await;
        let rows = conn
            .table("users")
            .select(["users.name", "tasks.title"])
            .left_join("tasks", "tasks.user_id", "=", "users.id")
            .order_by_asc("users.id")
            .get()
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["title"], DbValue::from("write"));
        assert!(rows[1]["title"].is_null());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let conn = seeded().await;

        let changed = conn
            .table("users")
            .and_where("name", "=", "bob")
            .update([("age", 26)])
            .await
            .unwrap();
        assert!(changed);

        let unchanged = conn
            .table("users")
            .and_where("name", "=", "nobody")
            .update([("age", 1)])
            .await
            .unwrap();
        assert!(!unchanged);

        assert!(conn.table("users").and_where("age", "<", 27).delete().await.unwrap());
        let left = conn.table("users").get().await.unwrap();
        assert_eq!(left.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_get_id() {
        let conn = seeded().await;
        let id = conn
            .table("users")
            .insert_get_id([("name", DbValue::from("dee")), ("age", DbValue::Null)])
            .await
            .unwrap();
        assert_eq!(id, Some(4));
    }

    #[tokio::test]
    async fn test_bad_column_is_sql_error() {
        let conn = seeded().await;
        let err = conn
            .table("users")
            .and_where("missing", "=", 1)
            .get()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SqlExecution { .. }));
    }
}
