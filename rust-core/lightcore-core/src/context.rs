//! Application context handed to every handler.

use crate::config::Config;
use crate::connection::Connection;
use crate::container::Container;
use crate::error::Result;
use crate::provider::CONNECTION;
use std::sync::Arc;

/// Shared, read-only application state
///
/// Built once at boot and cloned into each request. Cloning only bumps
/// reference counts.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    container: Arc<Container>,
    config: Arc<Config>,
}

impl AppContext {
    /// Create a context from a booted container and its config
    #[must_use]
    pub const fn new(container: Arc<Container>, config: Arc<Config>) -> Self {
        Self { container, config }
    }

    /// Service container
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Application configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a service by id
    ///
    /// # Errors
    ///
    /// See [`Container::get`].
    pub fn get<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        self.container.get(id)
    }

    /// The database connection bound by the database provider
    ///
    /// # Errors
    ///
    /// Returns `Error::BindingNotFound` if no database provider was registered.
    pub fn connection(&self) -> Result<Arc<Connection>> {
        self.container.get(CONNECTION)
    }
}
