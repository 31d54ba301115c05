//! # Service Providers
//!
//! Providers populate the [`Container`] during boot. Every provider's
//! `register` runs before any provider's `boot`, so `boot` may resolve
//! services registered by providers listed after it.

use crate::config::{Config, DatabaseConfig, ServerConfig};
use crate::connection::Connection;
use crate::container::Container;
use crate::error::Result;
use tracing::debug;

/// Container id of the application [`Config`]
pub const CONFIG: &str = "config";

/// Container id of the [`ServerConfig`]
pub const SERVER_CONFIG: &str = "config.server";

/// Container id of the [`DatabaseConfig`]
pub const DATABASE_CONFIG: &str = "config.database";

/// Container id of the shared [`Connection`]
pub const CONNECTION: &str = "db.connection";

/// Boot-time container population
pub trait ServiceProvider: Send + Sync {
    /// Name used in boot logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Bind services
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's configuration is invalid.
    fn register(&self, container: &mut Container, config: &Config) -> Result<()>;

    /// Finish setup once every provider has registered
    ///
    /// # Errors
    ///
    /// Returns an error if a required service cannot be resolved.
    fn boot(&self, _container: &Container) -> Result<()> {
        Ok(())
    }
}

/// Registers the configuration views
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreServiceProvider;

impl ServiceProvider for CoreServiceProvider {
    fn register(&self, container: &mut Container, config: &Config) -> Result<()> {
        let server = ServerConfig::from_config(config)?;
        container.instance(CONFIG, config.clone());
        container.instance(SERVER_CONFIG, server);
        Ok(())
    }
}

/// Binds a lazily opened [`Connection`] singleton
#[derive(Debug, Clone, Default)]
pub struct DatabaseServiceProvider {
    config: Option<DatabaseConfig>,
}

impl DatabaseServiceProvider {
    /// Provider reading `DB_*` settings from the application config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with explicit connection settings
    #[must_use]
    pub const fn with_config(config: DatabaseConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl ServiceProvider for DatabaseServiceProvider {
    fn register(&self, container: &mut Container, config: &Config) -> Result<()> {
        let db = match &self.config {
            Some(db) => db.clone(),
            None => DatabaseConfig::from_config(config)?,
        };
        let for_connection = db.clone();
        container.instance(DATABASE_CONFIG, db);
        container.singleton(CONNECTION, move |_| Connection::new(for_connection.clone()));
        Ok(())
    }

    fn boot(&self, container: &Container) -> Result<()> {
        let conn = container.get::<Connection>(CONNECTION)?;
        debug!(dsn = %conn.dsn(), "Database connection bound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Arc;

    #[test]
    fn test_core_provider_binds_config() {
        let config = Config::from_pairs([("APP_BASE_PATH", "/app")]);
        let mut container = Container::new();
        CoreServiceProvider.register(&mut container, &config).unwrap();

        let stored = container.get::<Config>(CONFIG).unwrap();
        assert_eq!(stored.get("APP_BASE_PATH"), Some("/app"));
        assert!(container.has(SERVER_CONFIG));
    }

    #[test]
    fn test_database_provider_binds_singleton() {
        let provider = DatabaseServiceProvider::with_config(DatabaseConfig::sqlite_memory());
        let mut container = Container::new();
        provider.register(&mut container, &Config::new()).unwrap();
        provider.boot(&container).unwrap();

        let a = container.get::<Connection>(CONNECTION).unwrap();
        let b = container.get::<Connection>(CONNECTION).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_connected());
    }

    #[test]
    fn test_database_provider_rejects_bad_config() {
        let mut container = Container::new();
        let err = DatabaseServiceProvider::new()
            .register(&mut container, &Config::from_pairs([("DB_DRIVER", "mysql")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(!container.has(CONNECTION));
    }
}
