//! Application controllers.

use crate::models::User;
use lightcore_core::{
    action_future, AppContext, Connection, Controller, DbValue, HandlerFuture, Model, Record,
    Request, Response, Result, StatusCode,
};
use serde_json::Value;

/// Landing page
#[derive(Debug, Default)]
pub struct HomeController;

impl HomeController {
    async fn index(_request: Request, _ctx: AppContext) -> Result<Response> {
        Ok(Response::html("<h1>Hello World</h1>", StatusCode::OK))
    }
}

impl Controller for HomeController {
    fn call(self: Box<Self>, action: &str, request: Request, ctx: AppContext) -> Option<HandlerFuture> {
        match action {
            "index" => action_future(Self::index(request, ctx)),
            _ => None,
        }
    }
}

/// Blog posts
#[derive(Debug, Default)]
pub struct PostController;

impl PostController {
    async fn show(request: Request, _ctx: AppContext) -> Result<Response> {
        let Some(id) = route_id(&request) else {
            return Ok(Response::not_found("Post not found"));
        };
        Ok(Response::html(format!("This is post {id}"), StatusCode::OK))
    }
}

impl Controller for PostController {
    fn call(self: Box<Self>, action: &str, request: Request, ctx: AppContext) -> Option<HandlerFuture> {
        match action {
            "show" => action_future(Self::show(request, ctx)),
            _ => None,
        }
    }
}

const STORE_RULES: [(&str, &str); 2] = [
    ("name", "required|string|max:100"),
    ("email", "required|string|max:255"),
];

const UPDATE_RULES: [(&str, &str); 2] = [("name", "string|max:100"), ("email", "string|max:255")];

/// CRUD over the `users` table
#[derive(Debug, Default)]
pub struct UserController;

impl UserController {
    /// Users with their tasks, one row per user/task pair
    async fn index(request: Request, ctx: AppContext) -> Result<Response> {
        let conn = ctx.connection()?;
        let mut query = Record::<User>::query(&conn)
            .select(["users.id", "users.name", "users.email", "tasks.title AS task"])
            .left_join("tasks", "users.id", "=", "tasks.user_id")
            .order_by_asc("users.id");
        if let Some(limit) = request.query("limit").and_then(as_u64) {
            query = query.limit(limit);
        }
        let rows = query.get().await?;
        Response::json(&rows, StatusCode::OK)
    }

    async fn show(request: Request, ctx: AppContext) -> Result<Response> {
        let conn = ctx.connection()?;
        match find_user(&conn, &request).await? {
            Some(user) => Response::json(&user, StatusCode::OK),
            None => Ok(Response::not_found("User not found")),
        }
    }

    async fn store(request: Request, ctx: AppContext) -> Result<Response> {
        request.validate(&STORE_RULES)?;
        let conn = ctx.connection()?;
        let user = Record::<User>::create(&conn, request.all()).await?;
        Response::json(&user, StatusCode::CREATED)
    }

    async fn update(request: Request, ctx: AppContext) -> Result<Response> {
        let payload = request.all();
        let rules: Vec<_> = UPDATE_RULES
            .into_iter()
            .filter(|(field, _)| payload.contains_key(*field))
            .collect();
        request.validate(&rules)?;

        let changes: Vec<(String, DbValue)> = payload
            .into_iter()
            .filter(|(key, _)| User::fillable().contains(&key.as_str()))
            .map(|(key, value)| (key, DbValue::from(value)))
            .collect();
        if changes.is_empty() {
            return Ok(Response::error("Nothing to update", StatusCode::BAD_REQUEST));
        }

        let conn = ctx.connection()?;
        let Some(mut user) = find_user(&conn, &request).await? else {
            return Ok(Response::not_found("User not found"));
        };
        user.update(&conn, changes).await?;
        Response::json(&user, StatusCode::OK)
    }

    async fn delete(request: Request, ctx: AppContext) -> Result<Response> {
        let conn = ctx.connection()?;
        let Some(mut user) = find_user(&conn, &request).await? else {
            return Ok(Response::not_found("User not found"));
        };
        user.delete(&conn).await?;
        Ok(Response::new("", StatusCode::NO_CONTENT))
    }
}

impl Controller for UserController {
    fn call(self: Box<Self>, action: &str, request: Request, ctx: AppContext) -> Option<HandlerFuture> {
        match action {
            "index" => action_future(Self::index(request, ctx)),
            "show" => action_future(Self::show(request, ctx)),
            "store" => action_future(Self::store(request, ctx)),
            "update" => action_future(Self::update(request, ctx)),
            "delete" => action_future(Self::delete(request, ctx)),
            _ => None,
        }
    }
}

fn route_id(request: &Request) -> Option<i64> {
    request.input("id").and_then(Value::as_i64)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

async fn find_user(conn: &Connection, request: &Request) -> Result<Option<Record<User>>> {
    match route_id(request) {
        Some(id) => Record::<User>::find(conn, id).await,
        None => Ok(None),
    }
}
