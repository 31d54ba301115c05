//! # Router
//!
//! Ordered route registry. Routes are tried in registration order and the
//! first one whose method and path both match wins.
//!
//! The registry is filled once during boot and only read while matching.

use crate::controller::{Controller, ControllerRegistry};
use crate::error::{Error, Result};
use crate::request::Request;
use crate::route::{Route, Target};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// HTTP GET
    #[default]
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP PATCH
    Patch,
    /// HTTP DELETE
    Delete,
}

impl Method {
    /// Every supported method
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Patch, Self::Delete];

    /// Uppercase method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Lenient parse used for incoming requests: unknown verbs become `GET`
    #[must_use]
    pub fn from_server(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or(Error::UnsupportedMethod { method: upper })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered route registry plus the controllers its routes refer to
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    base_path: String,
    controllers: ControllerRegistry,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix stripped from request paths, e.g. `/lightcore`
    ///
    /// Applies to routes already registered and to later ones.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.set_base_path(base_path);
        self
    }

    /// Set the base path in place
    pub fn set_base_path(&mut self, base_path: &str) -> &mut Self {
        self.base_path = base_path.to_string();
        for route in &mut self.routes {
            route.set_base_path(base_path);
        }
        self
    }

    /// Configured base path
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Append a compiled route
    pub fn push(&mut self, mut route: Route) -> &mut Self {
        route.set_base_path(&self.base_path);
        self.routes.push(route);
        self
    }

    /// Compile and append a route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn route(&mut self, method: Method, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        let route = Route::new(method, pattern, target.into())?;
        Ok(self.push(route))
    }

    /// Register a route from a method name
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMethod` for an unknown verb and
    /// `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn add(&mut self, method: &str, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        let method = method.parse()?;
        self.route(method, pattern, target)
    }

    /// Register a GET route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn get(&mut self, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        self.route(Method::Get, pattern, target)
    }

    /// Register a POST route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn post(&mut self, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        self.route(Method::Post, pattern, target)
    }

    /// Register a PUT route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn put(&mut self, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        self.route(Method::Put, pattern, target)
    }

    /// Register a PATCH route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn patch(&mut self, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        self.route(Method::Patch, pattern, target)
    }

    /// Register a DELETE route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    pub fn delete(&mut self, pattern: &str, target: impl Into<Target>) -> Result<&mut Self> {
        self.route(Method::Delete, pattern, target)
    }

    /// Make controller `C` available to controller targets
    pub fn register_controller<C: Controller + Default>(&mut self) -> &mut Self {
        self.controllers.register::<C>();
        self
    }

    /// Controller registry
    #[must_use]
    pub const fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Mutable controller registry, for custom factories
    pub fn controllers_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    /// First registered route matching the request
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if nothing matches.
    pub fn match_request(&self, request: &Request) -> Result<&Route> {
        let route = self
            .routes
            .iter()
            .find(|route| route.matches(request))
            .ok_or_else(|| Error::RouteNotFound {
                method: request.method().to_string(),
                path: request.path().to_string(),
            })?;
        debug!(pattern = route.pattern(), path = request.path(), "Matched route");
        Ok(route)
    }

    /// Registered routes in order
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if no routes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
