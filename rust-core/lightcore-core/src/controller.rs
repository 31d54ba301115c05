//! # Controllers
//!
//! A controller is a type with named async actions. Routes refer to an
//! action through a [`ControllerRef`] (type id plus action name); the
//! [`ControllerRegistry`] turns that reference into a fresh controller
//! instance for each request.
//!
//! ```ignore
//! #[derive(Default)]
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn call(self: Box<Self>, action: &str, req: Request, ctx: AppContext) -> Option<HandlerFuture> {
//!         match action {
//!             "index" => action_future(self.index(req, ctx)),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::route::{HandlerFuture, Target};
use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A request-scoped controller
pub trait Controller: Send + 'static {
    /// Start the named action, `None` if the controller has no such action
    fn call(self: Box<Self>, action: &str, request: Request, ctx: AppContext) -> Option<HandlerFuture>;

    /// Route target for one of this controller's actions
    fn action(name: &str) -> Target
    where
        Self: Sized,
    {
        Target::Controller(ControllerRef::new::<Self>(name))
    }
}

/// Box an action future for [`Controller::call`]
pub fn action_future<F>(future: F) -> Option<HandlerFuture>
where
    F: Future<Output = Result<Response>> + Send + 'static,
{
    Some(Box::pin(future))
}

/// Reference to a controller action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    /// Controller type
    pub type_id: TypeId,
    /// Controller type name, for diagnostics
    pub type_name: &'static str,
    /// Action name
    pub action: String,
}

impl ControllerRef {
    /// Reference action `action` on controller `C`
    #[must_use]
    pub fn new<C: Controller>(action: &str) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            action: action.to_string(),
        }
    }
}

impl std::fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.type_name, self.action)
    }
}

type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Zero-argument controller factories keyed by type
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    factories: HashMap<TypeId, ControllerFactory>,
}

impl ControllerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller built with `Default`
    pub fn register<C: Controller + Default>(&mut self) -> &mut Self {
        self.register_with::<C, _>(C::default)
    }

    /// Register a controller with a custom factory
    pub fn register_with<C, F>(&mut self, factory: F) -> &mut Self
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.factories.insert(
            TypeId::of::<C>(),
            Arc::new(move || Box::new(factory()) as Box<dyn Controller>),
        );
        self
    }

    /// Check if `C` is registered
    #[must_use]
    pub fn contains<C: Controller>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<C>())
    }

    /// Instantiate the controller and start the referenced action
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRouteCallback` if the controller was never
    /// registered or has no such action.
    pub fn invoke(&self, target: &ControllerRef, request: Request, ctx: AppContext) -> Result<HandlerFuture> {
        let factory = self
            .factories
            .get(&target.type_id)
            .ok_or_else(|| Error::InvalidRouteCallback {
                target: target.to_string(),
                reason: "controller is not registered".to_string(),
            })?;

        factory()
            .call(&target.action, request, ctx)
            .ok_or_else(|| Error::InvalidRouteCallback {
                target: target.to_string(),
                reason: "controller has no such action".to_string(),
            })
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;
    use serde_json::Map;

    #[derive(Default)]
    struct EchoController {
        prefix: &'static str,
    }

    impl EchoController {
        async fn show(self, request: Request) -> Result<Response> {
            Ok(Response::text(
                format!("{}{}", self.prefix, request.path()),
                StatusCode::OK,
            ))
        }
    }

    impl Controller for EchoController {
        fn call(self: Box<Self>, action: &str, request: Request, _ctx: AppContext) -> Option<HandlerFuture> {
            match action {
                "show" => action_future(self.show(request)),
                _ => None,
            }
        }
    }

    fn request() -> Request {
        Request::create("GET", "/echo", Map::new(), &[]).unwrap()
    }

    #[tokio::test]
    async fn test_invoke_registered_action() {
        let mut registry = ControllerRegistry::new();
        registry.register_with(|| EchoController { prefix: "at " });
        assert!(registry.contains::<EchoController>());

        let target = ControllerRef::new::<EchoController>("show");
        let response = registry
            .invoke(&target, request(), AppContext::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(response.content().as_ref(), b"at /echo");
    }

    #[test]
    fn test_unregistered_controller() {
        let registry = ControllerRegistry::new();
        let target = ControllerRef::new::<EchoController>("show");
        let result = registry.invoke(&target, request(), AppContext::default());
        assert!(matches!(result, Err(Error::InvalidRouteCallback { .. })));
    }

    #[test]
    fn test_unknown_action() {
        let mut registry = ControllerRegistry::new();
        registry.register::<EchoController>();
        let target = ControllerRef::new::<EchoController>("missing");
        let result = registry.invoke(&target, request(), AppContext::default());
        assert!(matches!(
            result,
            Err(Error::InvalidRouteCallback { ref target, .. }) if target.ends_with("EchoController::missing")
        ));
    }

    #[test]
    fn test_action_target() {
        match EchoController::action("show") {
            Target::Controller(r) => assert_eq!(r.action, "show"),
            Target::Closure(_) => panic!("expected controller target"),
        }
    }
}
