//! # Models
//!
//! Table-backed records. A [`Model`] names its table, primary key and
//! mass-assignable columns; a [`Record`] holds one row's attributes and
//! knows whether that row already exists in the database.
//!
//! ```ignore
//! struct User;
//!
//! impl Model for User {
//!     const TABLE: &'static str = "users";
//!     fn fillable() -> &'static [&'static str] {
//!         &["name", "email"]
//!     }
//! }
//!
//! let user = Record::<User>::create(&conn, [("name", "ann")]).await?;
//! let again = Record::<User>::find(&conn, user.key().cloned()).await?;
//! ```

use crate::connection::Connection;
use crate::database::DbValue;
use crate::error::{Error, Result};
use crate::query::QueryBuilder;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Attribute map of a record, ordered by column name
pub type Attributes = BTreeMap<String, DbValue>;

/// Table metadata for a record type
pub trait Model: Send + Sync + 'static {
    /// Backing table
    const TABLE: &'static str;

    /// Primary key column
    const PRIMARY_KEY: &'static str = "id";

    /// Columns accepted by [`Record::fill`]; empty accepts everything
    fn fillable() -> &'static [&'static str] {
        &[]
    }
}

/// One row of `M`'s table
pub struct Record<M: Model> {
    attributes: Attributes,
    exists: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Record<M> {
    /// Unsaved record filled through the fillable guard
    #[must_use]
    pub fn make<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let mut record = Self {
            attributes: Attributes::new(),
            exists: false,
            _model: PhantomData,
        };
        record.fill(attributes);
        record
    }

    /// Record loaded from the database; every column is kept
    fn hydrate<I, K, V>(row: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        Self {
            attributes: row.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            exists: true,
            _model: PhantomData,
        }
    }

    /// Assign attributes, skipping columns outside `M::fillable()`
    pub fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let fillable = M::fillable();
        for (key, value) in attributes {
            let key = key.into();
            if fillable.is_empty() || fillable.contains(&key.as_str()) {
                self.attributes.insert(key, value.into());
            }
        }
        self
    }

    /// Attribute value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DbValue> {
        self.attributes.get(key)
    }

    /// Set one attribute, bypassing the fillable guard
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DbValue>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Primary key value, if set and not null
    #[must_use]
    pub fn key(&self) -> Option<&DbValue> {
        self.get(M::PRIMARY_KEY).filter(|value| !value.is_null())
    }

    /// All attributes
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Consume the record, keeping its attributes
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Whether the row is known to be stored
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Query builder over `M::TABLE`
    #[must_use]
    pub fn query(conn: &Connection) -> QueryBuilder<'_> {
        conn.table(M::TABLE)
    }

    /// Fill, insert, and return the stored record
    ///
    /// A key supplied in `attributes` is kept; otherwise the generated one
    /// is read back.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` if nothing fillable was given or no row
    /// was written, or a database error.
    pub async fn create<I, K, V>(conn: &Connection, attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let mut record = Self::make(attributes);
        if !record.insert(conn).await? {
            return Err(Error::InvalidQuery {
                reason: format!("no row inserted into {}", M::TABLE),
            });
        }
        Ok(record)
    }

    async fn insert(&mut self, conn: &Connection) -> Result<bool> {
        if self.key().is_some() {
            let inserted = Self::query(conn).insert(self.attributes.clone()).await?;
            self.exists = inserted;
            return Ok(inserted);
        }
        let id = Self::query(conn)
            .insert_get_key(self.attributes.clone(), M::PRIMARY_KEY)
            .await?;
        match id {
            Some(id) => {
                self.attributes
                    .insert(M::PRIMARY_KEY.to_string(), DbValue::Int(id));
                self.exists = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert a new row or update the stored one by primary key
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty record, or a database error.
    pub async fn save(&mut self, conn: &Connection) -> Result<bool> {
        match self.key().cloned() {
            Some(key) if self.exists => {
                Self::query(conn)
                    .and_where(M::PRIMARY_KEY, "=", key)
                    .update(self.attributes.clone())
                    .await
            }
            _ => self.insert(conn).await,
        }
    }

    /// Every row of the table
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn all(conn: &Connection) -> Result<Vec<Self>> {
        let rows = Self::query(conn).get().await?;
        Ok(rows.into_iter().map(Self::hydrate).collect())
    }

    /// Row whose primary key equals `key`
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find(conn: &Connection, key: impl Into<DbValue>) -> Result<Option<Self>> {
        let row = Self::query(conn)
            .and_where(M::PRIMARY_KEY, "=", key)
            .first()
            .await?;
        Ok(row.map(Self::hydrate))
    }

    /// Write `attributes` to this record's row; `false` without a key
    ///
    /// On success the values are merged into the record as well.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for an empty payload, or a database error.
    pub async fn update<I, K, V>(&mut self, conn: &Connection, attributes: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DbValue>,
    {
        let Some(key) = self.key().cloned() else {
            return Ok(false);
        };
        let changes: Attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let updated = Self::query(conn)
            .and_where(M::PRIMARY_KEY, "=", key)
            .update(changes.clone())
            .await?;
        if updated {
            self.attributes.extend(changes);
        }
        Ok(updated)
    }

    /// Delete this record's row; `false` without a key
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn delete(&mut self, conn: &Connection) -> Result<bool> {
        let Some(key) = self.key().cloned() else {
            return Ok(false);
        };
        let deleted = Self::query(conn)
            .and_where(M::PRIMARY_KEY, "=", key)
            .delete()
            .await?;
        if deleted {
            self.exists = false;
        }
        Ok(deleted)
    }

    /// Reload this record's row; `None` without a key or once the row is gone
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn fresh(&self, conn: &Connection) -> Result<Option<Self>> {
        match self.key() {
            Some(key) => Self::find(conn, key.clone()).await,
            None => Ok(None),
        }
    }
}

impl<M: Model> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            exists: self.exists,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &M::TABLE)
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .finish()
    }
}

impl<M: Model> Serialize for Record<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}
