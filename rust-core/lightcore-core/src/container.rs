//! # Service Container
//!
//! Named service registry with transient and singleton resolution.
//!
//! Services are stored type-erased behind `Arc<dyn Any + Send + Sync>` and
//! handed back as `Arc<T>`. A singleton is built on its first `get` and the
//! same `Arc` is returned for the rest of the container's life; a transient
//! binding runs its factory on every `get`.

use crate::error::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type Service = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Service + Send + Sync>;

enum Binding {
    /// Factory invoked on every resolution
    Transient(Factory),
    /// Factory invoked once, result memoized
    Singleton {
        factory: Factory,
        instance: OnceLock<Service>,
    },
    /// Pre-built value shared on every resolution
    Instance(Service),
}

/// Type-derived service id, used by [`Container::resolve`]
#[must_use]
pub fn service_id<T: ?Sized + 'static>() -> &'static str {
    std::any::type_name::<T>()
}

/// Dependency container
///
/// Bindings are registered during application boot through `&mut self`
/// and resolved afterwards through `&self`, usually behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// let mut container = Container::new();
/// container.singleton("db", |_| Connection::new(config.clone()));
/// let conn = container.get::<Connection>("db")?;
/// ```
#[derive(Default)]
pub struct Container {
    bindings: HashMap<String, Binding>,
}

impl Container {
    /// Create an empty container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transient factory
    ///
    /// Overwrites any existing binding with the same id.
    pub fn bind<T, F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Self) -> T + Send + Sync + 'static,
    {
        self.bindings
            .insert(id.into(), Binding::Transient(erase(factory)));
        self
    }

    /// Register a factory whose first result is cached
    ///
    /// Overwrites any existing binding with the same id.
    pub fn singleton<T, F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Self) -> T + Send + Sync + 'static,
    {
        self.bindings.insert(
            id.into(),
            Binding::Singleton {
                factory: erase(factory),
                instance: OnceLock::new(),
            },
        );
        self
    }

    /// Register a plain value, returned as the same instance on every `get`
    pub fn instance<T: Send + Sync + 'static>(&mut self, id: impl Into<String>, value: T) -> &mut Self {
        self.bindings
            .insert(id.into(), Binding::Instance(Arc::new(value)));
        self
    }

    /// Resolve a service by id
    ///
    /// # Errors
    ///
    /// Returns `Error::BindingNotFound` if `id` was never bound, and
    /// `Error::BindingTypeMismatch` if the bound service is not a `T`.
    pub fn get<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        let binding = self
            .bindings
            .get(id)
            .ok_or_else(|| Error::BindingNotFound { id: id.to_string() })?;

        let service = match binding {
            Binding::Transient(factory) => factory(self),
            Binding::Singleton { factory, instance } => {
                Arc::clone(instance.get_or_init(|| factory(self)))
            }
            Binding::Instance(value) => Arc::clone(value),
        };

        service
            .downcast::<T>()
            .map_err(|_| Error::BindingTypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolve a service registered under its type-derived id
    ///
    /// # Errors
    ///
    /// See [`Container::get`].
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get(service_id::<T>())
    }

    /// Check if an id is bound
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if the container has no bindings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Send + Sync + 'static,
    F: Fn(&Container) -> T + Send + Sync + 'static,
{
    Arc::new(move |container| Arc::new(factory(container)) as Service)
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.bindings.keys().collect();
        ids.sort();
        f.debug_struct("Container").field("ids", &ids).finish()
    }
}
