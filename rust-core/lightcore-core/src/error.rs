//! # Error Handling
//!
//! Centralized error types for Lightcore core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Nothing in the core recovers from these internally. They travel up to
//! the server boundary, which is the only place that turns them into HTTP
//! responses (see [`Error::status_code`]).

use crate::validation::FieldError;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for Lightcore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Lightcore runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Container has no binding for the requested id
    #[error("Container entry not found for: {id}")]
    BindingNotFound {
        /// The service id that was requested
        id: String,
    },

    /// Container binding resolved to a different type than requested
    #[error("Container entry {id} is not a {expected}")]
    BindingTypeMismatch {
        /// The service id that was requested
        id: String,
        /// The type name the caller asked for
        expected: &'static str,
    },

    /// No registered route matched the request
    #[error("Route '{method} {path}' not found")]
    RouteNotFound {
        /// Request method
        method: String,
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Route target could not be invoked
    #[error("Invalid route callback for {target}: {reason}")]
    InvalidRouteCallback {
        /// Human-readable description of the target
        target: String,
        /// Why the target could not be invoked
        reason: String,
    },

    /// HTTP verb not recognised by the router
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The verb as given
        method: String,
    },

    /// A validation rule failed for a field
    #[error("{0}")]
    Validation(FieldError),

    /// A validation rule string named a rule nobody registered
    #[error("Unknown validation rule: '{rule}' for parameter '{field}'")]
    UnknownValidationRule {
        /// Field the rule was attached to
        field: String,
        /// The unrecognised rule name
        rule: String,
    },

    /// Request payload too large
    #[error("Request body too large: limit={limit} bytes, received={actual} bytes")]
    RequestBodyTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size, or `limit + 1` when a stream was cut off at the cap
        actual: usize,
    },

    /// Response status outside the valid HTTP range
    #[error("Invalid HTTP status code: {0}")]
    InvalidStatusCode(u16),

    /// Response was emitted on a transport that already sent headers
    #[error("Headers already sent")]
    ResponseAlreadySent,

    /// Database connection could not be established or was lost
    #[error("Database connection error: {message}")]
    DatabaseConnection {
        /// Error message from the driver
        message: String,
    },

    /// Statement failed to execute
    #[error("SQL execution error: {message} (query: {sql})")]
    SqlExecution {
        /// The SQL text that failed
        sql: String,
        /// Error message from the driver
        message: String,
    },

    /// Query builder state cannot be rendered into a valid statement
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Why the query was rejected
        reason: String,
    },

    /// Missing or malformed configuration
    #[error("Configuration error: {key}: {reason}")]
    Config {
        /// The configuration key at fault
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status the server boundary reports for this error.
    ///
    /// Only a missing route and an oversized body carry HTTP meaning;
    /// everything else is an unhandled fault.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RequestBodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<FieldError> for Error {
    fn from(err: FieldError) -> Self {
        Self::Validation(err)
    }
}
