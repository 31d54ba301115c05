//! Web route table.

use crate::controllers::{HomeController, PostController, UserController};
use lightcore_core::{AppContext, Controller, Response, Result, Router, StatusCode, Target, VERSION};
use serde_json::json;

/// Register the application's controllers and routes
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a pattern is malformed.
pub fn web(router: &mut Router) -> Result<()> {
    router
        .register_controller::<HomeController>()
        .register_controller::<PostController>()
        .register_controller::<UserController>();

    router.get("/", HomeController::action("index"))?;
    router.get("posts/{id:int}", PostController::action("show"))?;

    router.get("users", UserController::action("index"))?;
    router.post("users", UserController::action("store"))?;
    router.get("users/{id:int}", UserController::action("show"))?;
    router.put("users/{id:int}", UserController::action("update"))?;
    router.delete("users/{id:int}", UserController::action("delete"))?;

    router.get("health", Target::closure(health))?;
    Ok(())
}

async fn health(_request: lightcore_core::Request, _values: Vec<String>, ctx: AppContext) -> Result<Response> {
    let database = ctx.connection().is_ok_and(|conn| conn.is_connected());
    Response::json(
        &json!({ "status": "ok", "version": VERSION, "database": database }),
        StatusCode::OK,
    )
}
