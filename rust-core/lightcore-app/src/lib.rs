//! # Lightcore App
//!
//! Example application on top of `lightcore-core`: a few controllers, the
//! models they read and write, and the route table wiring them together.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod controllers;
pub mod models;
pub mod routes;

use lightcore_core::{Config, DatabaseServiceProvider, Kernel, Result};

/// Boot the application kernel with the database provider and web routes
///
/// # Errors
///
/// Returns `Error::Config` for invalid settings, or a route-table error.
pub fn kernel(config: Config) -> Result<Kernel> {
    build(config, DatabaseServiceProvider::new())
}

/// Boot with an explicit database provider
///
/// # Errors
///
/// See [`kernel`].
pub fn build(config: Config, database: DatabaseServiceProvider) -> Result<Kernel> {
    Kernel::builder(config)
        .provider(database)
        .routes(routes::web)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, User};
    use lightcore_core::{DatabaseConfig, DbValue, Record, Request, StatusCode};
    use serde_json::{json, Map, Value};

    async fn app() -> Kernel {
        let kernel = build(
            Config::new(),
            DatabaseServiceProvider::with_config(DatabaseConfig::sqlite_memory()),
        )
        .unwrap();
        let conn = kernel.context().connection().unwrap();
        conn.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT)",
            &[],
        )
        .await
        .unwrap();
        conn.execute(
            "CREATE TABLE tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, title TEXT)",
            &[],
        )
        .await
        .unwrap();
        kernel
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn request(method: &str, uri: &str, body: Value) -> Request {
        Request::create(method, uri, params(body), &[]).unwrap()
    }

    fn body(response: &lightcore_core::Response) -> Value {
        serde_json::from_slice(response.content()).unwrap()
    }

    #[tokio::test]
    async fn test_home_and_post_pages() {
        let kernel = app().await;

        let home = kernel.respond(request("GET", "/", json!({}))).await;
        assert_eq!(home.status(), StatusCode::OK);
        assert_eq!(home.content().as_ref(), b"<h1>Hello World</h1>");
        assert_eq!(home.header("content-type"), Some("text/html; charset=utf-8"));

        let post = kernel.respond(request("GET", "/posts/7", json!({}))).await;
        assert_eq!(post.content().as_ref(), b"This is post 7");

        let not_numeric = kernel.respond(request("GET", "/posts/seven", json!({}))).await;
        assert_eq!(not_numeric.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_lazy_connection() {
        let kernel = build(
            Config::new(),
            DatabaseServiceProvider::with_config(DatabaseConfig::sqlite_memory()),
        )
        .unwrap();
        let response = kernel.respond(request("GET", "/health", json!({}))).await;
        assert_eq!(body(&response), json!({ "status": "ok", "version": "0.1.0", "database": false }));
    }

    #[tokio::test]
    async fn test_store_validates_then_creates() {
        let kernel = app().await;

        let rejected = kernel
            .respond(request("POST", "/users", json!({ "name": "ann" })))
            .await;
        assert_eq!(body(&rejected)["field"], "email");

        let created = kernel
            .respond(request(
                "POST",
                "/users",
                json!({ "name": "ann", "email": "ann@example.com", "admin": "1" }),
            ))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(
            body(&created),
            json!({ "id": 1, "name": "ann", "email": "ann@example.com" })
        );
    }

    #[tokio::test]
    async fn test_show_update_delete() {
        let kernel = app().await;
        let conn = kernel.context().connection().unwrap();
        Record::<User>::create(&conn, [("name", "bob"), ("email", "bob@example.com")])
            .await
            .unwrap();

        let shown = kernel.respond(request("GET", "/users/1", json!({}))).await;
        assert_eq!(body(&shown)["name"], "bob");

        let updated = kernel
            .respond(request("PUT", "/users/1", json!({ "name": "robert" })))
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body(&updated)["name"], "robert");

        let empty = kernel
            .respond(request("PUT", "/users/1", json!({ "admin": true })))
            .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let deleted = kernel.respond(request("DELETE", "/users/1", json!({}))).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let gone = kernel.respond(request("GET", "/users/1", json!({}))).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        let stored = Record::<User>::find(&conn, 1).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_index_left_joins_tasks() {
        let kernel = app().await;
        let conn = kernel.context().connection().unwrap();
        for name in ["ann", "bob"] {
            Record::<User>::create(&conn, [("name", name), ("email", "x@example.com")])
                .await
                .unwrap();
        }
        Record::<Task>::create(&conn, [("user_id", DbValue::Int(1)), ("title", DbValue::from("write"))])
            .await
            .unwrap();

        let response = kernel.respond(request("GET", "/users", json!({}))).await;
        let rows = body(&response);
        assert_eq!(rows.as_array().map(Vec::len), Some(2));
        assert_eq!(rows[0]["task"], "write");
        assert_eq!(rows[1]["task"], Value::Null);

        let limited = kernel.respond(request("GET", "/users?limit=1", json!({}))).await;
        assert_eq!(body(&limited).as_array().map(Vec::len), Some(1));
    }
}
