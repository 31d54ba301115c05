//! # Route
//!
//! A single `(method, pattern, target)` entry, compiled once at
//! registration.
//!
//! Patterns are slash-trimmed paths with `{name}` tokens. Each token becomes
//! exactly one capture group, in declaration order, and the compiled regex
//! is anchored at both ends:
//!
//! - `users/{id}` captures one run of non-`/` characters
//! - `posts/{id:int}` narrows the capture and injects a JSON integer
//! - `files/{name:[a-z]+\.txt}` uses an inline regex (no capture groups)

use crate::context::AppContext;
use crate::controller::{ControllerRef, ControllerRegistry};
use crate::error::{Error, Result};
use crate::request::{Params, Request};
use crate::response::Response;
use crate::router::Method;
use crate::types::{parse_token, Constraint, Token};
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Boxed future produced by every handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

/// Closure handler: request, raw captured values in declared order, context
pub type ClosureHandler = Arc<dyn Fn(Request, Vec<String>, AppContext) -> HandlerFuture + Send + Sync>;

/// What a matched route invokes
#[derive(Clone)]
pub enum Target {
    /// A closure receiving the request and the captured values
    Closure(ClosureHandler),
    /// A controller action resolved through the [`ControllerRegistry`]
    Controller(ControllerRef),
}

impl Target {
    /// Wrap an async closure
    pub fn closure<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request, Vec<String>, AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        Self::Closure(Arc::new(move |request, values, ctx| {
            Box::pin(handler(request, values, ctx)) as HandlerFuture
        }))
    }
}

impl From<ControllerRef> for Target {
    fn from(target: ControllerRef) -> Self {
        Self::Controller(target)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("Closure"),
            Self::Controller(r) => write!(f, "Controller({r})"),
        }
    }
}

/// A compiled route
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    regex: Regex,
    tokens: Vec<Token>,
    target: Target,
    base_path: String,
}

impl Route {
    /// Compile a route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for unbalanced braces, empty or
    /// duplicate parameter names, invalid inline regexes, or inline regexes
    /// that contain their own capture groups.
    pub fn new(method: Method, pattern: &str, target: Target) -> Result<Self> {
        let pattern = normalize(pattern);
        let (regex, tokens) = compile(&pattern)?;
        Ok(Self {
            method,
            pattern,
            regex,
            tokens,
            target,
            base_path: String::new(),
        })
    }

    /// Set the prefix stripped from request paths before matching
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.set_base_path(base_path);
        self
    }

    pub(crate) fn set_base_path(&mut self, base_path: &str) {
        self.base_path = base_path.trim_end_matches('/').to_string();
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Normalized pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Compiled, anchored regex
    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Parameter names in declaration order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.name.as_str())
    }

    /// Route target
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Request path with the base prefix stripped and slashes trimmed
    #[must_use]
    pub fn clean_path(&self, path: &str) -> String {
        let stripped = if self.base_path.is_empty() {
            path
        } else {
            match path.strip_prefix(self.base_path.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => path,
            }
        };
        normalize(stripped)
    }

    fn captures(&self, request: &Request) -> Option<Vec<String>> {
        if request.method() != self.method {
            return None;
        }
        let path = self.clean_path(request.path());
        let caps = self.regex.captures(&path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Whether method and cleaned path both match
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        self.captures(request).is_some()
    }

    /// Raw captured values by name, empty on a non-match
    #[must_use]
    pub fn parameters(&self, request: &Request) -> HashMap<String, String> {
        self.captures(request)
            .map(|values| {
                self.param_names()
                    .map(str::to_string)
                    .zip(values)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inject parameters into the request and run the target
    ///
    /// Typed tokens are injected as typed JSON values. Closures also
    /// receive the raw captured strings in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRouteCallback` if a controller target cannot
    /// be resolved, or whatever the handler returns.
    pub async fn handle(
        &self,
        mut request: Request,
        ctx: AppContext,
        controllers: &ControllerRegistry,
    ) -> Result<Response> {
        let values = self.captures(&request).unwrap_or_default();
        let params: Params = self
            .tokens
            .iter()
            .zip(&values)
            .map(|(token, raw)| (token.name.clone(), token.constraint.convert(raw)))
            .collect();
        request.set_params(params);

        debug!(method = %self.method, pattern = %self.pattern, "Route matched");

        match &self.target {
            Target::Closure(handler) => handler(request, values, ctx).await,
            Target::Controller(target) => controllers.invoke(target, request, ctx)?.await,
        }
    }
}

/// Trim leading/trailing `/`; the empty path becomes `/`
fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRoutePattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

/// Compile a normalized pattern into an anchored regex plus its tokens
fn compile(pattern: &str) -> Result<(Regex, Vec<Token>)> {
    let mut source = String::from("^");
    let mut tokens: Vec<Token> = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices();

    while let Some((start, c)) = chars.next() {
        if c != '{' {
            literal.push(c);
            continue;
        }
        source.push_str(&regex::escape(&literal));
        literal.clear();

        // Inline regexes may contain quantifier braces: track depth
        let mut depth = 1;
        let mut end = None;
        for (i, c) in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| invalid(pattern, "unclosed '{'"))?;
        let token = parse_token(&pattern[start + 1..end]);

        if token.name.is_empty() || !token.name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid(pattern, format!("invalid parameter name '{}'", token.name)));
        }
        if tokens.iter().any(|t| t.name == token.name) {
            return Err(invalid(pattern, format!("duplicate parameter '{}'", token.name)));
        }
        if let Constraint::Regex(inline) = &token.constraint {
            let inner = Regex::new(inline).map_err(|e| invalid(pattern, e.to_string()))?;
            if inner.captures_len() > 1 {
                return Err(invalid(
                    pattern,
                    format!("parameter '{}' regex must not contain capture groups", token.name),
                ));
            }
        }

        source.push('(');
        source.push_str(token.constraint.pattern());
        source.push(')');
        tokens.push(token);
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| invalid(pattern, e.to_string()))?;
    if regex.captures_len() - 1 != tokens.len() {
        return Err(invalid(pattern, "capture groups do not line up with parameters"));
    }
    Ok((regex, tokens))
}
