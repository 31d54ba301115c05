//! # HTTP Request
//!
//! Request wrapper built from a CGI-style server map (`REQUEST_METHOD`,
//! `REQUEST_URI`, `HTTP_*` headers, ...) plus separately sourced query,
//! form, file and raw-body collections.
//!
//! Everything derived from the source is computed lazily and at most once.
//! Route parameters are injected after matching through
//! [`Request::set_params`]; handlers observe the injected state.

use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::router::Method;
use crate::validation::Validator;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

/// Decoded parameter map (query, form, JSON object or route params)
pub type Params = Map<String, Value>;

/// A file uploaded with the request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadedFile {
    /// Client-side file name
    pub name: String,
    /// Declared MIME type
    pub content_type: String,
    /// File contents
    pub content: Bytes,
    /// Upload failure reported by the transport, if any
    pub error: Option<String>,
}

impl UploadedFile {
    /// Size of the uploaded content in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether the upload completed without error
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Raw snapshot a [`Request`] is derived from
#[derive(Debug, Clone, Default)]
pub struct RequestSource {
    /// CGI-style server variables
    pub server: HashMap<String, String>,
    /// Pre-parsed query parameters; parsed from `QUERY_STRING` when absent
    pub query: Option<Params>,
    /// Pre-parsed form body for form-encoded POSTs
    pub form: Option<Params>,
    /// Uploaded files by field name
    pub files: HashMap<String, UploadedFile>,
    /// Raw request body
    pub body: Bytes,
}

impl RequestSource {
    /// Source with only server variables
    #[must_use]
    pub fn from_server<I, K, V>(server: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            server: server
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Attach a raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach pre-parsed form parameters
    #[must_use]
    pub fn with_form(mut self, form: Params) -> Self {
        self.form = Some(form);
        self
    }

    /// Attach pre-parsed query parameters
    #[must_use]
    pub fn with_query(mut self, query: Params) -> Self {
        self.query = Some(query);
        self
    }

    /// Attach an uploaded file
    #[must_use]
    pub fn with_file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    source: RequestSource,
    method: OnceLock<Method>,
    uri: OnceLock<String>,
    path: OnceLock<String>,
    scheme: OnceLock<&'static str>,
    headers: OnceLock<HashMap<String, String>>,
    query: OnceLock<Params>,
    body: OnceLock<Params>,
    json: OnceLock<Option<Value>>,
    params: Params,
}

impl Request {
    /// Build a request, enforcing the default 5 MiB body cap
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestBodyTooLarge` if the raw body exceeds the cap.
    pub fn new(source: RequestSource) -> Result<Self> {
        Self::with_limit(source, DEFAULT_MAX_BODY_SIZE)
    }

    /// Build a request with a custom body cap
    ///
    /// The size check runs before anything is parsed.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestBodyTooLarge` if the raw body exceeds `limit`.
    pub fn with_limit(source: RequestSource, limit: usize) -> Result<Self> {
        if source.body.len() > limit {
            return Err(Error::RequestBodyTooLarge {
                limit,
                actual: source.body.len(),
            });
        }
        Ok(Self {
            source,
            method: OnceLock::new(),
            uri: OnceLock::new(),
            path: OnceLock::new(),
            scheme: OnceLock::new(),
            headers: OnceLock::new(),
            query: OnceLock::new(),
            body: OnceLock::new(),
            json: OnceLock::new(),
            params: Params::new(),
        })
    }

    /// Build a request from a hyper request
    ///
    /// The declared Content-Length is checked against `limit` before the
    /// body is read. Bodies without one are read through a [`Limited`]
    /// wrapper, so reading stops at the first frame that crosses the cap.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestBodyTooLarge` for oversized bodies and
    /// `Error::Io` if the body stream fails.
    pub async fn from_hyper<B>(
        req: hyper::Request<B>,
        remote_addr: Option<SocketAddr>,
        limit: usize,
    ) -> Result<Self>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if let Some(len) = req
            .headers()
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
        {
            if len > limit {
                return Err(Error::RequestBodyTooLarge { limit, actual: len });
            }
        }

        let (parts, body) = req.into_parts();
        let server = server_vars(&parts, remote_addr);

        let body = BodyExt::collect(Limited::new(body, limit))
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    Error::RequestBodyTooLarge {
                        limit,
                        actual: limit.saturating_add(1),
                    }
                } else {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                }
            })?
            .to_bytes();

        Self::with_limit(RequestSource::from_server(server).with_body(body), limit)
    }

    /// Build a request by hand, mostly for tests
    ///
    /// `params` become the query source for GET, the form source for POST
    /// and a JSON body for other methods. `headers` use plain header names.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestBodyTooLarge` if the encoded params exceed the cap.
    pub fn create(method: &str, uri: &str, params: Params, headers: &[(&str, &str)]) -> Result<Self> {
        let query_string = uri.split_once('?').map_or("", |(_, q)| q);
        let mut server: HashMap<String, String> = HashMap::from([
            ("REQUEST_METHOD".to_string(), method.to_uppercase()),
            ("REQUEST_URI".to_string(), uri.to_string()),
            ("QUERY_STRING".to_string(), query_string.to_string()),
            ("SERVER_PORT".to_string(), "80".to_string()),
            ("HTTP_HOST".to_string(), "localhost".to_string()),
            ("REMOTE_ADDR".to_string(), "127.0.0.1".to_string()),
        ]);
        for (name, value) in headers {
            server.insert(server_key(name), (*value).to_string());
        }

        let mut source = RequestSource::default();
        match Method::from_server(method) {
            Method::Get => {
                let mut query = parse_urlencoded(query_string);
                query.extend(params);
                source.query = Some(query);
            }
            Method::Post => {
                server
                    .entry("CONTENT_TYPE".to_string())
                    .or_insert_with(|| FORM_CONTENT_TYPE.to_string());
                source.form = Some(params);
            }
            _ => {
                server
                    .entry("CONTENT_TYPE".to_string())
                    .or_insert_with(|| JSON_CONTENT_TYPE.to_string());
                source.body = Bytes::from(serde_json::to_vec(&params)?);
            }
        }
        source.server = server;
        Self::new(source)
    }

    fn server(&self, key: &str) -> Option<&str> {
        self.source.server.get(key).map(String::as_str)
    }

    /// Request method, `GET` when absent or unrecognized
    pub fn method(&self) -> Method {
        *self
            .method
            .get_or_init(|| Method::from_server(self.server("REQUEST_METHOD").unwrap_or("GET")))
    }

    /// Check the method case-insensitively
    #[must_use]
    pub fn is_method(&self, method: &str) -> bool {
        method.eq_ignore_ascii_case(self.method().as_str())
    }

    /// Full URI: `scheme://host` followed by the request URI
    pub fn uri(&self) -> &str {
        self.uri.get_or_init(|| {
            format!(
                "{}://{}{}",
                self.scheme(),
                self.server("HTTP_HOST").unwrap_or("localhost"),
                self.server("REQUEST_URI").unwrap_or("/"),
            )
        })
    }

    /// Request path: the URI up to the first `?`, `/` when empty
    pub fn path(&self) -> &str {
        self.path.get_or_init(|| {
            let uri = self.server("REQUEST_URI").unwrap_or("/");
            match uri.split('?').next() {
                Some(p) if !p.is_empty() => p.to_string(),
                _ => "/".to_string(),
            }
        })
    }

    /// `https` if the HTTPS flag is on or the port is 443, else `http`
    pub fn scheme(&self) -> &str {
        self.scheme.get_or_init(|| {
            let https = self.server("HTTPS").is_some_and(|v| v.eq_ignore_ascii_case("on"));
            let port = self
                .server("SERVER_PORT")
                .and_then(|p| p.trim().parse::<u16>().ok());
            if https || port == Some(443) {
                "https"
            } else {
                "http"
            }
        })
    }

    /// Whether the request came over HTTPS
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme() == "https"
    }

    /// Raw query string, empty when absent
    #[must_use]
    pub fn query_string(&self) -> &str {
        self.server("QUERY_STRING").unwrap_or_else(|| {
            self.server("REQUEST_URI")
                .and_then(|u| u.split_once('?'))
                .map_or("", |(_, q)| q)
        })
    }

    /// All headers, keyed by lowercase hyphenated name
    pub fn headers(&self) -> &HashMap<String, String> {
        self.headers.get_or_init(|| {
            self.source
                .server
                .iter()
                .filter_map(|(key, value)| {
                    let name = match key.strip_prefix("HTTP_") {
                        Some(name) => name,
                        None if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" => key.as_str(),
                        None => return None,
                    };
                    Some((name.to_lowercase().replace('_', "-"), value.clone()))
                })
                .collect()
        })
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .get(&name.to_lowercase().replace('_', "-"))
            .map(String::as_str)
    }

    /// Header value or `default`
    #[must_use]
    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    fn content_type(&self) -> &str {
        self.header_or("content-type", "")
    }

    fn is_json_content(&self) -> bool {
        self.content_type().contains("application/json")
    }

    fn is_form_content(&self) -> bool {
        self.content_type().contains(FORM_CONTENT_TYPE)
    }

    /// All query parameters
    pub fn query_params(&self) -> &Params {
        self.query.get_or_init(|| {
            self.source
                .query
                .clone()
                .unwrap_or_else(|| parse_urlencoded(self.query_string()))
        })
    }

    /// One query parameter
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query_params().get(key)
    }

    /// All body parameters
    ///
    /// GET requests have none. A form-encoded POST uses the pre-parsed form
    /// source when present. Otherwise the raw body is decoded as JSON or
    /// form data according to Content-Type; anything else yields nothing.
    pub fn post_params(&self) -> &Params {
        self.body.get_or_init(|| self.parse_body())
    }

    /// One body parameter
    #[must_use]
    pub fn post(&self, key: &str) -> Option<&Value> {
        self.post_params().get(key)
    }

    fn parse_body(&self) -> Params {
        if self.method() == Method::Get {
            return Params::new();
        }
        if self.method() == Method::Post && self.is_form_content() {
            if let Some(form) = &self.source.form {
                return form.clone();
            }
        }
        if self.source.body.is_empty() {
            return Params::new();
        }
        if self.is_json_content() {
            return match parse_json_bytes::<Value>(&self.source.body) {
                Ok(Value::Object(map)) => map,
                _ => Params::new(),
            };
        }
        if self.is_form_content() {
            return parse_urlencoded(&String::from_utf8_lossy(&self.source.body));
        }
        Params::new()
    }

    /// Query and body parameters merged; body wins on conflicts
    #[must_use]
    pub fn all(&self) -> Params {
        let mut merged = self.query_params().clone();
        merged.extend(self.post_params().clone());
        merged
    }

    /// Body decoded as JSON
    ///
    /// `None` unless Content-Type is JSON and the body parses.
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| {
                if !self.is_json_content() || self.source.body.is_empty() {
                    return None;
                }
                parse_json_bytes(&self.source.body).ok()
            })
            .as_ref()
    }

    /// Raw request body
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.source.body
    }

    /// One injected route parameter
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// All injected route parameters
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Replace the route parameters
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// All uploaded files
    #[must_use]
    pub const fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.source.files
    }

    /// One uploaded file
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.source.files.get(name)
    }

    /// Whether `name` was uploaded without error
    #[must_use]
    pub fn has_file(&self, name: &str) -> bool {
        self.file(name).is_some_and(UploadedFile::is_valid)
    }

    /// Whether the request was sent by `XMLHttpRequest`
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header_or("x-requested-with", "")
            .eq_ignore_ascii_case("xmlhttprequest")
    }

    /// Whether the client asked for a JSON response
    #[must_use]
    pub fn expects_json(&self) -> bool {
        self.header_or("accept", "").contains("application/json") || self.is_ajax()
    }

    /// Client address
    ///
    /// The first entry of a proxy header is used when it is a valid IP,
    /// then `REMOTE_ADDR`, then `0.0.0.0`.
    #[must_use]
    pub fn ip(&self) -> &str {
        ["HTTP_X_FORWARDED_FOR", "HTTP_X_REAL_IP", "HTTP_CLIENT_IP"]
            .iter()
            .filter_map(|key| self.server(key))
            .filter_map(|value| value.split(',').next().map(str::trim))
            .find(|candidate| candidate.parse::<IpAddr>().is_ok())
            .or_else(|| self.server("REMOTE_ADDR"))
            .unwrap_or("0.0.0.0")
    }

    /// User-Agent header, empty when absent
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.header_or("user-agent", "")
    }

    /// Validate fields with the built-in rules
    ///
    /// Each field is looked up in the route parameters first, then the body.
    ///
    /// # Errors
    ///
    /// See [`Validator::validate`].
    pub fn validate(&self, rules: &[(&str, &str)]) -> Result<()> {
        self.validate_with(&Validator::default(), rules)
    }

    /// Validate fields with a custom rule set
    ///
    /// # Errors
    ///
    /// See [`Validator::validate`].
    pub fn validate_with(&self, validator: &Validator, rules: &[(&str, &str)]) -> Result<()> {
        validator.validate(rules, |key| {
            self.input(key)
                .filter(|v| !v.is_null())
                .or_else(|| self.post(key))
                .cloned()
        })
    }
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Server-map key for a header name: `Content-Type` -> `CONTENT_TYPE`,
/// `X-Token` -> `HTTP_X_TOKEN`
fn server_key(name: &str) -> String {
    let upper = name.to_uppercase().replace('-', "_");
    if upper == "CONTENT_TYPE" || upper == "CONTENT_LENGTH" {
        upper
    } else {
        format!("HTTP_{upper}")
    }
}

fn server_vars(parts: &hyper::http::request::Parts, remote_addr: Option<SocketAddr>) -> HashMap<String, String> {
    let uri = &parts.uri;
    let mut server = HashMap::new();
    server.insert("REQUEST_METHOD".to_string(), parts.method.as_str().to_string());
    server.insert(
        "REQUEST_URI".to_string(),
        uri.path_and_query().map_or("/", |pq| pq.as_str()).to_string(),
    );
    server.insert("QUERY_STRING".to_string(), uri.query().unwrap_or("").to_string());
    server.insert("SERVER_PROTOCOL".to_string(), format!("{:?}", parts.version));

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            server.insert(server_key(name.as_str()), value.to_string());
        }
    }
    if !server.contains_key("HTTP_HOST") {
        if let Some(authority) = uri.authority() {
            server.insert("HTTP_HOST".to_string(), authority.to_string());
        }
    }
    if uri.scheme_str() == Some("https") {
        server.insert("HTTPS".to_string(), "on".to_string());
    }
    if let Some(port) = uri.port_u16() {
        server.insert("SERVER_PORT".to_string(), port.to_string());
    }
    if let Some(addr) = remote_addr {
        server.insert("REMOTE_ADDR".to_string(), addr.ip().to_string());
        server.insert("REMOTE_PORT".to_string(), addr.port().to_string());
    }
    server
}

/// Decode one `application/x-www-form-urlencoded` component
fn url_decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), std::borrow::Cow::into_owned)
}

/// Parse `a=1&b=2` style data
///
/// Duplicate keys: last value wins, except `key[]` which collects an array.
#[must_use]
pub fn parse_urlencoded(data: &str) -> Params {
    let mut params = Params::new();
    for pair in data.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = url_decode(key);
        let value = Value::String(url_decode(value));
        match key.strip_suffix("[]") {
            Some(list) => {
                let entry = params
                    .entry(list.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(value);
                } else {
                    *entry = Value::Array(vec![value]);
                }
            }
            None => {
                params.insert(key, value);
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Frame;
    use serde_json::json;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    fn request(server: &[(&str, &str)]) -> Request {
        Request::new(RequestSource::from_server(server.iter().copied())).unwrap()
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn test_method_normalization() {
        assert_eq!(request(&[("REQUEST_METHOD", "post")]).method(), Method::Post);
        assert_eq!(request(&[("REQUEST_METHOD", "OPTIONS")]).method(), Method::Get);
        assert_eq!(request(&[]).method(), Method::Get);
        assert!(request(&[("REQUEST_METHOD", "delete")]).is_method("DELETE"));
    }

    #[test]
    fn test_path_strips_query() {
        let req = request(&[("REQUEST_URI", "/users/42?tab=posts")]);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.query_string(), "tab=posts");
        assert_eq!(request(&[("REQUEST_URI", "?x=1")]).path(), "/");
        assert_eq!(request(&[]).path(), "/");
    }

    #[test]
    fn test_scheme_and_uri() {
        assert_eq!(request(&[("HTTPS", "on")]).scheme(), "https");
        assert_eq!(request(&[("SERVER_PORT", "443")]).scheme(), "https");
        assert_eq!(request(&[("SERVER_PORT", "8080")]).scheme(), "http");

        let req = request(&[("HTTP_HOST", "example.com"), ("REQUEST_URI", "/a?b=1")]);
        assert_eq!(req.uri(), "http://example.com/a?b=1");
        assert!(!req.is_secure());
    }

    #[test]
    fn test_headers_normalized() {
        let req = request(&[
            ("HTTP_X_REQUESTED_WITH", "XMLHttpRequest"),
            ("CONTENT_TYPE", "text/plain"),
            ("SERVER_NAME", "ignored"),
        ]);
        assert_eq!(req.header("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.headers().len(), 2);
        assert_eq!(req.header_or("accept", "*/*"), "*/*");
        assert!(req.is_ajax());
        assert!(req.expects_json());
    }

    #[test]
    fn test_query_parsed_from_query_string() {
        let req = request(&[("QUERY_STRING", "name=John+Doe&city=New%20York&n=1&n=2")]);
        assert_eq!(req.query("name"), Some(&json!("John Doe")));
        assert_eq!(req.query("city"), Some(&json!("New York")));
        assert_eq!(req.query("n"), Some(&json!("2")));
    }

    #[test]
    fn test_pre_parsed_query_wins() {
        let source = RequestSource::from_server([("QUERY_STRING", "a=1")])
            .with_query(params(json!({"b": "2"})));
        let req = Request::new(source).unwrap();
        assert_eq!(req.query("a"), None);
        assert_eq!(req.query("b"), Some(&json!("2")));
    }

    #[test]
    fn test_get_has_no_body_params() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "GET"),
            ("CONTENT_TYPE", "application/json"),
        ])
        .with_body(r#"{"a":1}"#);
        let req = Request::new(source).unwrap();
        assert!(req.post_params().is_empty());
        assert_eq!(req.json(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_post_form_uses_form_source() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
        ])
        .with_form(params(json!({"name": "from-form"})))
        .with_body("name=from-body");
        let req = Request::new(source).unwrap();
        assert_eq!(req.post("name"), Some(&json!("from-form")));
    }

    #[test]
    fn test_put_form_parses_raw_body() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "PUT"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded; charset=UTF-8"),
        ])
        .with_body("name=a+b&tags[]=x&tags[]=y");
        let req = Request::new(source).unwrap();
        assert_eq!(req.post("name"), Some(&json!("a b")));
        assert_eq!(req.post("tags"), Some(&json!(["x", "y"])));
    }

    #[test]
    fn test_json_body() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "PATCH"),
            ("CONTENT_TYPE", "application/json"),
        ])
        .with_body(r#"{"name": "x", "age": 3}"#);
        let req = Request::new(source).unwrap();
        assert_eq!(req.post("age"), Some(&json!(3)));
    }

    #[test]
    fn test_malformed_json_is_empty_not_error() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/json"),
        ])
        .with_body("{not json");
        let req = Request::new(source).unwrap();
        assert!(req.post_params().is_empty());
        assert_eq!(req.json(), None);
    }

    #[test]
    fn test_non_object_json_is_empty() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/json"),
        ])
        .with_body("[1,2]");
        let req = Request::new(source).unwrap();
        assert!(req.post_params().is_empty());
        assert_eq!(req.json(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_unknown_content_type_is_empty() {
        let source = RequestSource::from_server([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "text/plain"),
        ])
        .with_body("a=1");
        let req = Request::new(source).unwrap();
        assert!(req.post_params().is_empty());
        assert_eq!(req.json(), None);
    }

    #[test]
    fn test_all_body_wins() {
        let req = Request::create(
            "POST",
            "/x?a=query&b=query",
            params(json!({"b": "body"})),
            &[],
        )
        .unwrap();
        let all = req.all();
        assert_eq!(all.get("a"), Some(&json!("query")));
        assert_eq!(all.get("b"), Some(&json!("body")));
    }

    #[test]
    fn test_body_too_large_for_every_combination() {
        for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            for content_type in ["application/json", "application/x-www-form-urlencoded", "text/plain"] {
                let source = RequestSource::from_server([
                    ("REQUEST_METHOD", method),
                    ("CONTENT_TYPE", content_type),
                ])
                .with_body(vec![b'a'; 11]);
                let err = Request::with_limit(source, 10).unwrap_err();
                assert!(matches!(
                    err,
                    Error::RequestBodyTooLarge { limit: 10, actual: 11 }
                ));
            }
        }
    }

    #[test]
    fn test_default_limit_is_five_mib() {
        let at_limit = RequestSource::default().with_body(vec![0u8; DEFAULT_MAX_BODY_SIZE]);
        assert!(Request::new(at_limit).is_ok());

        let over = RequestSource::default().with_body(vec![0u8; DEFAULT_MAX_BODY_SIZE + 1]);
        assert!(Request::new(over).is_err());
    }

    #[test]
    fn test_set_params_and_input() {
        let mut req = request(&[]);
        assert_eq!(req.input("id"), None);
        req.set_params(params(json!({"id": 42})));
        assert_eq!(req.input("id"), Some(&json!(42)));
        assert_eq!(req.params().len(), 1);
    }

    #[test]
    fn test_validate_checks_route_params_then_body() {
        let mut req = Request::create("POST", "/users", params(json!({"name": "Ann"})), &[]).unwrap();
        req.set_params(params(json!({"id": "7"})));

        assert!(req.validate(&[("id", "required|integer"), ("name", "required|string")]).is_ok());
        let err = req.validate(&[("email", "required")]).unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.field == "email" && e.rule == "required"));
    }

    #[test]
    fn test_ip_resolution() {
        let req = request(&[
            ("HTTP_X_FORWARDED_FOR", "not-an-ip, 10.0.0.1"),
            ("HTTP_X_REAL_IP", "10.0.0.2"),
            ("REMOTE_ADDR", "10.0.0.3"),
        ]);
        assert_eq!(req.ip(), "10.0.0.2");
        assert_eq!(request(&[("REMOTE_ADDR", "10.0.0.3")]).ip(), "10.0.0.3");
        assert_eq!(request(&[]).ip(), "0.0.0.0");
    }

    #[test]
    fn test_files() {
        let file = UploadedFile {
            name: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            content: Bytes::from_static(b"hello"),
            error: None,
        };
        let broken = UploadedFile {
            error: Some("partial upload".to_string()),
            ..UploadedFile::default()
        };
        let source = RequestSource::default()
            .with_file("doc", file)
            .with_file("broken", broken);
        let req = Request::new(source).unwrap();

        assert!(req.has_file("doc"));
        assert!(!req.has_file("broken"));
        assert!(!req.has_file("missing"));
        assert_eq!(req.file("doc").map(UploadedFile::size), Some(5));
        assert_eq!(req.files().len(), 2);
    }

    #[test]
    fn test_create_put_encodes_json_body() {
        let req = Request::create("PUT", "/users/1", params(json!({"name": "y"})), &[("X-Token", "t")]).unwrap();
        assert_eq!(req.method(), Method::Put);
        assert_eq!(req.post("name"), Some(&json!("y")));
        assert_eq!(req.header("x-token"), Some("t"));
    }

    #[tokio::test]
    async fn test_from_hyper() {
        let hyper_req = hyper::Request::builder()
            .method("POST")
            .uri("/users?page=2")
            .header("host", "api.local")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(br#"{"name":"Ann"}"#)))
            .unwrap();
        let addr: SocketAddr = "192.168.1.5:5000".parse().unwrap();

        let req = Request::from_hyper(hyper_req, Some(addr), 1024).await.unwrap();
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query("page"), Some(&json!("2")));
        assert_eq!(req.post("name"), Some(&json!("Ann")));
        assert_eq!(req.uri(), "http://api.local/users?page=2");
        assert_eq!(req.ip(), "192.168.1.5");
    }

    #[tokio::test]
    async fn test_from_hyper_rejects_declared_oversize() {
        let hyper_req = hyper::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-length", "2048")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = Request::from_hyper(hyper_req, None, 1024).await.unwrap_err();
        assert!(matches!(err, Error::RequestBodyTooLarge { actual: 2048, .. }));
    }

    #[tokio::test]
    async fn test_from_hyper_rejects_collected_oversize() {
        let hyper_req = hyper::Request::builder()
            .method("POST")
            .uri("/")
            .body(Full::new(Bytes::from(vec![1u8; 100])))
            .unwrap();

        let err = Request::from_hyper(hyper_req, None, 10).await.unwrap_err();
        assert!(matches!(err, Error::RequestBodyTooLarge { limit: 10, .. }));
    }

    /// Chunked body of `frames` one-MiB frames that counts how many were pulled
    struct ChunkedBody {
        frames: usize,
        pulled: Arc<AtomicUsize>,
    }

    impl Body for ChunkedBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<Frame<Bytes>, Self::Error>>> {
            let this = self.get_mut();
            if this.pulled.load(Ordering::SeqCst) >= this.frames {
                return Poll::Ready(None);
            }
            this.pulled.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Some(Ok(Frame::data(Bytes::from(vec![b'x'; 1024 * 1024])))))
        }
    }

    #[tokio::test]
    async fn test_from_hyper_stops_reading_chunked_body_at_limit() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let hyper_req = hyper::Request::builder()
            .method("POST")
            .uri("/upload")
            .header("transfer-encoding", "chunked")
            .body(ChunkedBody {
                frames: 200,
                pulled: Arc::clone(&pulled),
            })
            .unwrap();

        let err = Request::from_hyper(hyper_req, None, 1024).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RequestBodyTooLarge {
                limit: 1024,
                actual: 1025
            }
        ));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }
}
