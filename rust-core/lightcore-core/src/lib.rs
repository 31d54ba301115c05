//! # Lightcore Core
//!
//! Core runtime library for the Lightcore web framework.
//! Provides the service container, HTTP request/response types, routing and
//! dispatch, the hyper-based server, and a fluent SQL query builder.
//!
//! ## Architecture
//!
//! A [`Kernel`] boots the service providers into a [`Container`], builds the
//! [`Router`], and hands every request to the [`Dispatcher`] together with a
//! shared [`AppContext`]. Handlers are async and return a [`Response`].
//!
//! ## Modules
//!
//! - `container` - Named service registry (transient and singleton)
//! - `config` - `.env` and environment configuration
//! - `logging` - Tracing subscriber setup
//! - `request` - HTTP request wrapper with lazy parsing
//! - `response` - HTTP response and transports
//! - `route` / `router` - Route compilation and first-match routing
//! - `controller` - Controller trait and registry
//! - `dispatcher` - Match-then-handle orchestration
//! - `kernel` / `provider` - Application boot
//! - `server` - HTTP server built on Hyper
//! - `database` / `connection` - SQLx pools behind a lazy connection
//! - `query` - Fluent SQL query builder
//! - `model` - Table-backed records
//! - `validation` - Request validation rules
//! - `json` - JSON parsing with simd-json
//! - `types` - Path parameter types and conversion
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod connection;
pub mod container;
pub mod context;
pub mod controller;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod json;
pub mod kernel;
pub mod logging;
pub mod model;
pub mod provider;
pub mod query;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod types;
pub mod validation;

pub use config::{Config, DatabaseConfig, Driver, LogFormat, ServerConfig};
pub use connection::Connection;
pub use container::Container;
pub use context::AppContext;
pub use controller::{action_future, Controller, ControllerRef, ControllerRegistry};
pub use database::{DatabasePool, DbValue, Row};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use json::{parse_json, to_json};
pub use kernel::{Kernel, KernelBuilder};
pub use model::{Model, Record};
pub use provider::{CoreServiceProvider, DatabaseServiceProvider, ServiceProvider};
pub use query::{Direction, QueryBuilder};
pub use request::{Params, Request, RequestSource, UploadedFile};
pub use response::{HyperTransport, Response, Transport, WriterTransport};
pub use route::{HandlerFuture, Route, Target};
pub use router::{Method, Router};
pub use server::Server;
pub use types::ParamType;
pub use validation::{FieldError, ValidationCode, Validator};

/// Re-exported so handlers can name status codes without a direct hyper dependency
pub use hyper::StatusCode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
