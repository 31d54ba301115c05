//! # Path Parameter Types
//!
//! Route tokens may carry a specifier: `{id:int}`, `{price:float}`,
//! `{flag:bool}`, `{slug:string}`, or an inline regex such as `{id:\d+}`.
//! Known type names narrow the capture and convert the captured text into
//! a typed JSON value; anything else is treated as a regex constraint.

use serde_json::Value;
use std::fmt;

/// Capture used by an unconstrained token: one or more non-separator chars
pub const SEGMENT_PATTERN: &str = "[^/]+";

/// Supported path parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// String type (default) - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    Int,
    /// Float type - parses to f64
    Float,
    /// Boolean type - "true"/"false", "1"/"0", "yes"/"no"
    Bool,
}

impl ParamType {
    /// Map a known type specifier, `None` for anything else
    #[must_use]
    pub fn from_specifier(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "int" | "integer" | "i64" => Some(Self::Int),
            "float" | "f64" | "number" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Regex body (no capture groups) matching one value of this type
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::String => SEGMENT_PATTERN,
            Self::Int => "-?[0-9]+",
            Self::Float => r"-?[0-9]+(?:\.[0-9]+)?",
            Self::Bool => "(?i:true|false|yes|no|1|0)",
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// What a route token accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A named type with its own pattern and conversion
    Typed(ParamType),
    /// An inline regex; the captured text stays a string
    Regex(String),
}

impl Constraint {
    /// Regex body for the token's capture group
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::Typed(t) => t.pattern(),
            Self::Regex(r) => r,
        }
    }

    /// Convert captured text into the injected value
    #[must_use]
    pub fn convert(&self, raw: &str) -> Value {
        match self {
            Self::Typed(t) => convert_param(raw, *t),
            Self::Regex(_) => Value::String(raw.to_string()),
        }
    }
}

/// A `{name}` / `{name:kind}` token parsed out of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Parameter name
    pub name: String,
    /// What the token accepts
    pub constraint: Constraint,
}

/// Parse the inside of a `{...}` token
///
/// Examples:
/// - `id` -> ("id", String)
/// - `id:int` -> ("id", Int)
/// - `id:\d+` -> ("id", Regex(`\d+`))
#[must_use]
pub fn parse_token(inner: &str) -> Token {
    match inner.split_once(':') {
        Some((name, kind)) => Token {
            name: name.trim().to_string(),
            constraint: ParamType::from_specifier(kind.trim())
                .map_or_else(|| Constraint::Regex(kind.to_string()), Constraint::Typed),
        },
        None => Token {
            name: inner.trim().to_string(),
            constraint: Constraint::Typed(ParamType::String),
        },
    }
}

/// Convert raw captured text to a typed JSON value
///
/// Falls back to the raw string when the text doesn't fit the type.
#[must_use]
pub fn convert_param(raw: &str, param_type: ParamType) -> Value {
    let fallback = || Value::String(raw.to_string());
    match param_type {
        ParamType::String => fallback(),
        ParamType::Int => raw.parse::<i64>().map_or_else(|_| fallback(), Value::from),
        ParamType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(fallback, Value::Number),
        ParamType::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => fallback(),
        },
    }
}
