//! Request dispatch: match a route, then let it handle the request.

use crate::context::AppContext;
use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use std::sync::Arc;

/// Runs requests through a read-only [`Router`]
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
}

impl Dispatcher {
    /// Dispatcher over a finished route table
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Route table
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Match the request and invoke the route's target
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when nothing matches; handler errors
    /// are passed through unchanged.
    pub async fn dispatch(&self, request: Request, ctx: AppContext) -> Result<Response> {
        let route = self.router.match_request(&request)?;
        route.handle(request, ctx, self.router.controllers()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::route::Target;
    use hyper::StatusCode;
    use serde_json::{json, Map, Value};

    fn dispatcher() -> Dispatcher {
        let mut router = Router::new();
        router
            .get(
                "users/{id}",
                Target::closure(|req: Request, _, _| async move {
                    let id = req.input("id").cloned().unwrap_or(Value::Null);
                    Response::json(&json!({ "id": id }), StatusCode::OK)
                }),
            )
            .unwrap();
        router
            .get(
                "fail",
                Target::closure(|_, _, _| async {
                    Err::<Response, _>(Error::InvalidQuery {
                        reason: "boom".to_string(),
                    })
                }),
            )
            .unwrap();
        Dispatcher::new(router)
    }

    fn get(path: &str) -> Request {
        Request::create("GET", path, Map::new(), &[]).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_injects_params() {
        let response = dispatcher()
            .dispatch(get("/users/42"), AppContext::default())
            .await
            .unwrap();
        assert_eq!(response.content().as_ref(), br#"{"id":"42"}"#);
    }

    #[tokio::test]
    async fn test_dispatch_route_not_found() {
        let err = dispatcher()
            .dispatch(get("/nope"), AppContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RouteNotFound { .. }));
    }

    #[tokio::test]
    async fn test_handler_errors_propagate_unchanged() {
        let err = dispatcher()
            .dispatch(get("/fail"), AppContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }
}
