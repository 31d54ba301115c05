//! # HTTP Response
//!
//! Status, ordered headers and a byte body, built with factory helpers and
//! fluent setters, then emitted once through a [`Transport`].
//!
//! Header names are compared case-insensitively. Replacing a header keeps
//! its original position.

use crate::error::{Error, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use tracing::warn;

const JSON: &str = "application/json; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";
const XML: &str = "application/xml; charset=utf-8";

/// HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    content: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new("", StatusCode::OK)
    }
}

impl Response {
    /// Response with a body, a status and no headers
    #[must_use]
    pub fn new(content: impl Into<Bytes>, status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content: content.into(),
        }
    }

    /// JSON response
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `data` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(data: &T, status: StatusCode) -> Result<Self> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::new(body, status).with_header("Content-Type", JSON))
    }

    /// HTML response
    #[must_use]
    pub fn html(content: impl Into<Bytes>, status: StatusCode) -> Self {
        Self::new(content, status).with_header("Content-Type", HTML)
    }

    /// Plain-text response
    #[must_use]
    pub fn text(content: impl Into<Bytes>, status: StatusCode) -> Self {
        Self::new(content, status).with_header("Content-Type", TEXT)
    }

    /// XML response
    #[must_use]
    pub fn xml(content: impl Into<Bytes>, status: StatusCode) -> Self {
        Self::new(content, status).with_header("Content-Type", XML)
    }

    /// `302 Found` redirect; use [`Response::with_status`] for other codes
    #[must_use]
    pub fn redirect(url: &str) -> Self {
        Self::new("", StatusCode::FOUND).with_header("Location", url)
    }

    /// `404` with a JSON `{"error": message}` body
    #[must_use]
    pub fn not_found(message: &str) -> Self {
        Self::error(message, StatusCode::NOT_FOUND)
    }

    /// JSON `{"error": message}` body with the given status
    #[must_use]
    pub fn error(message: &str, status: StatusCode) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(body, status).with_header("Content-Type", JSON)
    }

    /// Replace the status
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any existing one with the same name
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    /// Replace the body in place
    pub fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.content = content.into();
        self
    }

    /// Replace the status in place
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Replace the status from a raw code
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStatusCode` outside `100..=599`.
    pub fn set_status_code(&mut self, code: u16) -> Result<&mut Self> {
        if !(100..=599).contains(&code) {
            return Err(Error::InvalidStatusCode(code));
        }
        self.status = StatusCode::from_u16(code).map_err(|_| Error::InvalidStatusCode(code))?;
        Ok(self)
    }

    /// Set a header in place
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match self.position(name) {
            Some(i) => self.headers[i].1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    /// Merge several headers; later values replace earlier ones
    pub fn set_headers<'a, I>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    /// Remove a header
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Check for a header
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Header value by name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.headers[i].1.as_str())
    }

    /// Headers in insertion order
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Status code
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes
    #[must_use]
    pub const fn content(&self) -> &Bytes {
        &self.content
    }

    /// Body length in bytes
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    /// 2xx
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    /// 3xx
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// 4xx or 5xx
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }

    /// Emit status, headers and body
    ///
    /// A `Content-Length` header is added when missing and the body is not
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::ResponseAlreadySent` if the transport has already
    /// sent headers, or whatever the transport reports while writing.
    pub fn send(&mut self, transport: &mut dyn Transport) -> Result<()> {
        if transport.headers_sent() {
            return Err(Error::ResponseAlreadySent);
        }
        if !self.content.is_empty() && !self.has_header("Content-Length") {
            let len = self.content.len().to_string();
            self.set_header("Content-Length", &len);
        }
        transport.emit(self.status, &self.headers, &self.content)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HTTP/1.1 {}", self.status.as_u16())?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}: {value}")?;
        }
        write!(f, "\n{}", String::from_utf8_lossy(&self.content))
    }
}

/// Destination a [`Response`] is emitted to
pub trait Transport {
    /// Whether status and headers have gone out already
    fn headers_sent(&self) -> bool;

    /// Write one complete response
    ///
    /// # Errors
    ///
    /// Implementation-specific write failures.
    fn emit(&mut self, status: StatusCode, headers: &[(String, String)], body: &Bytes) -> Result<()>;
}

/// Parse a header pair, dropping it with a warning when either half is invalid
///
/// Values carrying CR or LF are rejected, so a header can never split the
/// response.
fn checked_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!(header = %name, "Dropping invalid response header");
            None
        }
    }
}

/// Writes raw HTTP/1.1 bytes to any [`Write`]
#[derive(Debug)]
pub struct WriterTransport<W: Write> {
    writer: W,
    sent: bool,
}

impl<W: Write> WriterTransport<W> {
    /// Wrap a writer
    pub const fn new(writer: W) -> Self {
        Self { writer, sent: false }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for WriterTransport<W> {
    fn headers_sent(&self) -> bool {
        self.sent
    }

    fn emit(&mut self, status: StatusCode, headers: &[(String, String)], body: &Bytes) -> Result<()> {
        write!(
            self.writer,
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )?;
        for (name, value) in headers {
            if checked_header(name, value).is_some() {
                write!(self.writer, "{name}: {value}\r\n")?;
            }
        }
        self.sent = true;
        self.writer.write_all(b"\r\n")?;
        self.writer.write_all(body)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Builds a hyper response for the server loop
#[derive(Debug, Default)]
pub struct HyperTransport {
    response: Option<hyper::Response<Full<Bytes>>>,
}

impl HyperTransport {
    /// Empty transport
    #[must_use]
    pub const fn new() -> Self {
        Self { response: None }
    }

    /// The emitted response, if any
    #[must_use]
    pub fn into_response(self) -> Option<hyper::Response<Full<Bytes>>> {
        self.response
    }
}

impl Transport for HyperTransport {
    fn headers_sent(&self) -> bool {
        self.response.is_some()
    }

    fn emit(&mut self, status: StatusCode, headers: &[(String, String)], body: &Bytes) -> Result<()> {
        let mut response = hyper::Response::new(Full::new(body.clone()));
        *response.status_mut() = status;
        for (name, value) in headers {
            if let Some((name, value)) = checked_header(name, value) {
                response.headers_mut().append(name, value);
            }
        }
        self.response = Some(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_factory() {
        let resp = Response::json(&json!({"status": "ok"}), StatusCode::CREATED).unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.header("content-type"), Some(JSON));
        assert_eq!(resp.content().as_ref(), br#"{"status":"ok"}"#);
    }

    #[test]
    fn test_not_found_and_error() {
        let resp = Response::not_found("Not Found");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.content().as_ref(), br#"{"error":"Not Found"}"#);
        assert!(resp.is_error());

        let resp = Response::error("boom", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.status().as_u16(), 500);
    }

    #[test]
    fn test_redirect() {
        let resp = Response::redirect("/login");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.header("Location"), Some("/login"));
        assert!(resp.is_redirect());

        let permanent = Response::redirect("/new").with_status(StatusCode::MOVED_PERMANENTLY);
        assert_eq!(permanent.status().as_u16(), 301);
    }

    #[test]
    fn test_headers_case_insensitive_and_ordered() {
        let mut resp = Response::text("hi", StatusCode::OK);
        resp.set_header("X-One", "1").set_header("X-Two", "2");
        resp.set_header("content-type", "text/csv");

        let names: Vec<_> = resp.headers().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Content-Type", "X-One", "X-Two"]);
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/csv"));

        resp.remove_header("x-one");
        assert!(!resp.has_header("X-One"));

        resp.set_headers([("X-Three", "3"), ("X-Two", "two")]);
        assert_eq!(resp.header("x-two"), Some("two"));
        assert_eq!(resp.headers().len(), 3);
    }

    #[test]
    fn test_set_status_code_range() {
        let mut resp = Response::default();
        assert!(resp.set_status_code(204).is_ok());
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(matches!(resp.set_status_code(99), Err(Error::InvalidStatusCode(99))));
        assert!(matches!(resp.set_status_code(600), Err(Error::InvalidStatusCode(600))));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_send_writes_http_and_content_length() {
        let mut resp = Response::html("<p>hi</p>", StatusCode::OK);
        let mut transport = WriterTransport::new(Vec::new());
        resp.send(&mut transport).unwrap();

        let raw = String::from_utf8(transport.into_inner()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Length: 9\r\n"));
        assert!(raw.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_empty_body_has_no_content_length() {
        let mut resp = Response::redirect("/");
        let mut transport = WriterTransport::new(Vec::new());
        resp.send(&mut transport).unwrap();
        assert!(!resp.has_header("Content-Length"));
    }

    #[test]
    fn test_explicit_content_length_kept() {
        let mut resp = Response::text("abc", StatusCode::OK).with_header("Content-Length", "3");
        let mut transport = WriterTransport::new(Vec::new());
        resp.send(&mut transport).unwrap();
        let count = resp
            .headers()
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_writer_drops_header_with_line_break() {
        let mut resp = Response::redirect("/next\r\nSet-Cookie: session=evil")
            .with_header("X-Ok", "yes");
        let mut transport = WriterTransport::new(Vec::new());
        resp.send(&mut transport).unwrap();

        let raw = String::from_utf8(transport.into_inner()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(raw.contains("X-Ok: yes\r\n"));
        assert!(!raw.contains("Location"));
        assert!(!raw.contains("Set-Cookie"));
    }

    #[test]
    fn test_send_twice_fails() {
        let mut transport = WriterTransport::new(Vec::new());
        Response::text("a", StatusCode::OK).send(&mut transport).unwrap();
        let err = Response::text("b", StatusCode::OK).send(&mut transport).unwrap_err();
        assert!(matches!(err, Error::ResponseAlreadySent));
    }

    #[test]
    fn test_hyper_transport() {
        let mut transport = HyperTransport::new();
        Response::json(&json!([1]), StatusCode::OK)
            .unwrap()
            .with_header("X-Bad\n", "x")
            .send(&mut transport)
            .unwrap();
        assert!(transport.headers_sent());

        let resp = transport.into_response().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-length"], "3");
        assert!(resp.headers().get("x-bad\n").is_none());
    }

    #[test]
    fn test_display() {
        let resp = Response::text("body", StatusCode::OK);
        let dump = resp.to_string();
        assert!(dump.starts_with("HTTP/1.1 200\n"));
        assert!(dump.ends_with("\n\nbody"));
    }
}
