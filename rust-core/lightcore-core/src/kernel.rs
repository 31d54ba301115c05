//! # Kernel
//!
//! Boots the service providers, builds the route table and owns the
//! resulting [`AppContext`] and [`Dispatcher`]. One kernel serves every
//! request of the process.
//!
//! ```ignore
//! let kernel = Kernel::builder(Config::load(".env")?)
//!     .provider(DatabaseServiceProvider::new())
//!     .routes(|router| {
//!         router.get("/", HomeController::action("index"))?;
//!         Ok(())
//!     })
//!     .build()?;
//! kernel.serve().await?;
//! ```

use crate::config::{Config, ServerConfig};
use crate::container::Container;
use crate::context::AppContext;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::provider::{CoreServiceProvider, ServiceProvider};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

type RouteTable = Box<dyn FnOnce(&mut Router) -> Result<()> + Send>;

/// Booted application
#[derive(Debug, Clone)]
pub struct Kernel {
    ctx: AppContext,
    dispatcher: Dispatcher,
    server: ServerConfig,
}

impl Kernel {
    /// Start building a kernel over `config`
    ///
    /// The core provider is always registered first.
    #[must_use]
    pub fn builder(config: Config) -> KernelBuilder {
        KernelBuilder::new(config)
    }

    /// Dispatch one request
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when no route matches, or whatever the
    /// handler failed with.
    pub async fn handle(&self, request: Request) -> Result<Response> {
        self.dispatcher.dispatch(request, self.ctx.clone()).await
    }

    /// Dispatch one request, turning a failure into an error response
    pub async fn respond(&self, request: Request) -> Response {
        let method = request.method().to_string();
        let path = request.path().to_string();
        match self.handle(request).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    error!(%method, %path, error = %err, "Request failed");
                } else {
                    warn!(%method, %path, error = %err, "Request rejected");
                }
                error_response(&err)
            }
        }
    }

    /// Shared application context
    #[must_use]
    pub const fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Route table
    #[must_use]
    pub fn router(&self) -> &Router {
        self.dispatcher.router()
    }

    /// Server settings read at boot
    #[must_use]
    pub const fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Serve over HTTP until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be opened.
    pub async fn serve(self) -> Result<()> {
        crate::server::Server::new(self).serve().await
    }
}

/// JSON error body for a failed dispatch
///
/// Validation failures carry the offending field and rule.
#[must_use]
pub fn error_response(err: &Error) -> Response {
    let status = err.status_code();
    match err {
        Error::Validation(field) => Response::json(
            &json!({
                "error": field.message,
                "field": field.field,
                "rule": field.rule,
                "code": field.code,
            }),
            status,
        )
        .unwrap_or_else(|_| Response::error(&err.to_string(), status)),
        _ => Response::error(&err.to_string(), status),
    }
}

/// Builder for [`Kernel`]
pub struct KernelBuilder {
    config: Config,
    providers: Vec<Box<dyn ServiceProvider>>,
    routes: Vec<RouteTable>,
}

impl KernelBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            providers: vec![Box::new(CoreServiceProvider)],
            routes: Vec::new(),
        }
    }

    /// Add a service provider; providers register and boot in insertion order
    #[must_use]
    pub fn provider(mut self, provider: impl ServiceProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Add a route table; tables run in insertion order during `build`
    #[must_use]
    pub fn routes<F>(mut self, table: F) -> Self
    where
        F: FnOnce(&mut Router) -> Result<()> + Send + 'static,
    {
        self.routes.push(Box::new(table));
        self
    }

    /// Register and boot every provider, then build the route table
    ///
    /// # Errors
    ///
    /// Returns the first provider or route-table failure.
    pub fn build(self) -> Result<Kernel> {
        let server = ServerConfig::from_config(&self.config)?;

        let mut container = Container::new();
        for provider in &self.providers {
            provider.register(&mut container, &self.config)?;
            debug!(provider = provider.name(), "Provider registered");
        }
        for provider in &self.providers {
            provider.boot(&container)?;
            debug!(provider = provider.name(), "Provider booted");
        }

        let mut router = Router::new().with_base_path(&server.base_path);
        for table in self.routes {
            table(&mut router)?;
        }
        debug!(routes = router.len(), "Route table built");

        Ok(Kernel {
            ctx: AppContext::new(Arc::new(container), Arc::new(self.config)),
            dispatcher: Dispatcher::new(router),
            server,
        })
    }
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("KernelBuilder")
            .field("providers", &providers)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::connection::Connection;
    use crate::provider::{DatabaseServiceProvider, CONFIG, CONNECTION};
    use crate::route::Target;
    use hyper::StatusCode;
    use serde_json::{Map, Value};

    fn request(method: &str, uri: &str) -> Request {
        Request::create(method, uri, Map::new(), &[]).unwrap()
    }

    fn kernel(config: Config) -> Kernel {
        Kernel::builder(config)
            .provider(DatabaseServiceProvider::with_config(DatabaseConfig::sqlite_memory()))
            .routes(|router| {
                router.get(
                    "ping",
                    Target::closure(|_, _, _| async { Ok::<_, Error>(Response::text("pong", StatusCode::OK)) }),
                )?;
                router.get(
                    "count",
                    Target::closure(|_, _, ctx: AppContext| async move {
                        let conn = ctx.connection()?;
                        let rows = conn.fetch_all("SELECT 2 AS n", &[]).await?;
                        Response::json(&rows, StatusCode::OK)
                    }),
                )?;
                router.post(
                    "items",
                    Target::closure(|req: Request, _, _| async move {
                        req.validate(&[("name", "required|string")])?;
                        Ok::<_, Error>(Response::text("created", StatusCode::CREATED))
                    }),
                )?;
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_registers_providers() {
        let kernel = kernel(Config::new());
        assert!(kernel.context().container().has(CONFIG));
        assert!(kernel.context().container().has(CONNECTION));
        assert_eq!(kernel.router().len(), 3);
    }

    #[test]
    fn test_base_path_comes_from_config() {
        let kernel = kernel(Config::from_pairs([("APP_BASE_PATH", "/app")]));
        assert_eq!(kernel.router().base_path(), "/app");
        assert!(kernel.router().match_request(&request("GET", "/app/ping")).is_ok());
    }

    #[test]
    fn test_route_table_error_aborts_build() {
        let err = Kernel::builder(Config::new())
            .routes(|router| {
                router.get("bad/{", Target::closure(|_, _, _| async { Ok::<_, Error>(Response::default()) }))?;
                Ok(())
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRoutePattern { .. }));
    }

    #[tokio::test]
    async fn test_handle_uses_shared_connection() {
        let kernel = kernel(Config::new());
        let response = kernel.handle(request("GET", "/count")).await.unwrap();
        assert_eq!(response.content().as_ref(), br#"[{"n":2}]"#);

        let conn = kernel.context().get::<Connection>(CONNECTION).unwrap();
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_respond_maps_errors() {
        let kernel = kernel(Config::new());

        let missing = kernel.respond(request("GET", "/nope")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = kernel.respond(request("POST", "/items")).await;
        assert_eq!(invalid.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(invalid.content()).unwrap();
        assert_eq!(body["field"], "name");
        assert_eq!(body["code"], "REQUIRED");

        let ok = kernel.respond(request("GET", "/ping")).await;
        assert_eq!(ok.content().as_ref(), b"pong");
    }
}
