//! HTTP message types
//!
//! This module defines the immutable request and response types. Both embed
//! a [`BaseMessage`] (protocol version, headers, body) and share its
//! behaviour through the [`Message`] trait; every `with_*` method returns a
//! new message that shares the untouched parts with the receiver.

use super::headers::{HeaderBag, IntoHeaderValues};
use super::stream::{Body, BodySource};
use super::uri::Uri;
use super::validate::is_token_byte;
use super::{Error, Result, DEFAULT_PROTOCOL_VERSION};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(code))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the registered reason phrase, or `""` for unregistered codes
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            102 => "Processing",
            103 => "Early Hints",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            207 => "Multi-Status",
            208 => "Already Reported",
            226 => "IM Used",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            306 => "Switch Proxy",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Range Not Satisfiable",
            417 => "Expectation Failed",
            418 => "I'm a teapot",
            421 => "Misdirected Request",
            422 => "Unprocessable Entity",
            423 => "Locked",
            424 => "Failed Dependency",
            425 => "Too Early",
            426 => "Upgrade Required",
            428 => "Precondition Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            444 => "Connection Closed Without Response",
            451 => "Unavailable For Legal Reasons",
            499 => "Client Closed Request",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            506 => "Variant Also Negotiates",
            507 => "Insufficient Storage",
            508 => "Loop Detected",
            510 => "Not Extended",
            511 => "Network Authentication Required",
            599 => "Network Connect Timeout Error",
            _ => "",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if this is a redirection status (3xx)
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    // Common status codes as constants
    pub const OK: Status = Status { code: 200 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Check a protocol version: digits, optionally `.` and more digits
pub(crate) fn validate_protocol_version(version: &str) -> Result<()> {
    let valid = match version.split_once('.') {
        Some((major, minor)) => is_digits(major) && is_digits(minor),
        None => is_digits(version),
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidVersion(version.to_string()))
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Check a request method: a non-empty token
pub(crate) fn validate_method(method: &str) -> Result<()> {
    if !method.is_empty() && method.bytes().all(is_token_byte) {
        Ok(())
    } else {
        Err(Error::InvalidMethod(method.to_string()))
    }
}

/// Parts shared by requests and responses
#[derive(Debug, Clone)]
pub struct BaseMessage {
    protocol_version: Arc<str>,
    headers: Arc<HeaderBag>,
    body: Body,
}

impl BaseMessage {
    pub fn new(headers: HeaderBag, body: Body) -> Self {
        BaseMessage {
            protocol_version: Arc::from(DEFAULT_PROTOCOL_VERSION),
            headers: Arc::new(headers),
            body,
        }
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn with_protocol_version(&self, version: &str) -> Result<Self> {
        validate_protocol_version(version)?;
        let mut base = self.clone();
        base.protocol_version = Arc::from(version);
        Ok(base)
    }

    pub fn with_headers(&self, headers: HeaderBag) -> Self {
        let mut base = self.clone();
        base.headers = Arc::new(headers);
        base
    }

    pub fn with_body(&self, body: Body) -> Self {
        let mut base = self.clone();
        base.body = body;
        base
    }

    /// Whether two messages share the same header bag instance
    pub fn shares_headers(&self, other: &BaseMessage) -> bool {
        Arc::ptr_eq(&self.headers, &other.headers)
    }
}

/// Behaviour shared by requests and responses
///
/// Implementors only expose their [`BaseMessage`]; header, body and
/// protocol handling is provided here.
pub trait Message: Sized {
    fn base(&self) -> &BaseMessage;

    /// Copy of `self` with `base` swapped in
    fn with_base(&self, base: BaseMessage) -> Self;

    fn protocol_version(&self) -> &str {
        self.base().protocol_version()
    }

    /// Headers as seen by a reader of the message
    fn headers(&self) -> Cow<'_, HeaderBag> {
        Cow::Borrowed(self.base().headers())
    }

    /// All values of a header (case-insensitive)
    fn header(&self, name: &str) -> Vec<String> {
        self.headers().get(name).to_vec()
    }

    /// Values of a header joined with `,`, or `""`
    fn header_line(&self, name: &str) -> String {
        self.headers().line(name)
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers().contains(name)
    }

    fn body(&self) -> &Body {
        self.base().body()
    }

    fn with_protocol_version(&self, version: &str) -> Result<Self> {
        Ok(self.with_base(self.base().with_protocol_version(version)?))
    }

    /// Replace a header; see [`HeaderBag::set`]
    fn with_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let headers = self.base().headers().set(name, values)?;
        Ok(self.with_base(self.base().with_headers(headers)))
    }

    /// Append to a header; see [`HeaderBag::add`]
    fn with_added_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let headers = self.base().headers().add(name, values)?;
        Ok(self.with_base(self.base().with_headers(headers)))
    }

    /// Drop a header; absent names return an equal copy
    fn without_header(&self, name: &str) -> Self {
        if !self.base().headers().contains(name) {
            return self.with_base(self.base().clone());
        }
        let headers = self.base().headers().remove(name);
        self.with_base(self.base().with_headers(headers))
    }

    fn with_body(&self, body: Body) -> Self {
        self.with_base(self.base().with_body(body))
    }
}

/// Conversion into a [`Uri`]
pub trait IntoUri {
    fn into_uri(self) -> Result<Uri>;
}

impl IntoUri for Uri {
    fn into_uri(self) -> Result<Uri> {
        Ok(self)
    }
}

impl IntoUri for &str {
    fn into_uri(self) -> Result<Uri> {
        Uri::parse(self)
    }
}

impl IntoUri for String {
    fn into_uri(self) -> Result<Uri> {
        Uri::parse(&self)
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    base: BaseMessage,
    method: Arc<str>,
    uri: Arc<Uri>,
    request_target: Option<Arc<str>>,
}

impl Request {
    /// Create a request with an empty in-memory body
    pub fn new(method: &str, uri: impl IntoUri) -> Result<Self> {
        Request::builder().method(method).uri(uri).build()
    }

    /// Create a builder for constructing requests
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub(crate) fn from_parts(
        base: BaseMessage,
        method: &str,
        uri: Uri,
    ) -> Result<Self> {
        validate_method(method)?;
        Ok(Request {
            base,
            method: Arc::from(method),
            uri: Arc::new(uri),
            request_target: None,
        })
    }

    /// Get the request method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request target: the explicit one, else derived from the URI
    ///
    /// The derived target is the URI path (or `/`) plus `?query`.
    pub fn request_target(&self) -> String {
        if let Some(target) = &self.request_target {
            return target.to_string();
        }

        let mut target = if self.uri.path().is_empty() {
            "/".to_string()
        } else {
            self.uri.path().to_string()
        };
        if !self.uri.query().is_empty() {
            target.push('?');
            target.push_str(self.uri.query());
        }
        target
    }

    pub fn with_method(&self, method: &str) -> Result<Self> {
        validate_method(method)?;
        let mut request = self.clone();
        request.method = Arc::from(method);
        Ok(request)
    }

    /// Return a copy targeting `uri`
    ///
    /// Unless `preserve_host` is set, an explicit Host header is dropped
    /// when the new URI carries a host, so that the Host seen by readers
    /// follows the URI.
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        let mut request = self.clone();
        if !preserve_host && !uri.host().is_empty() && self.base.headers().contains("host") {
            request.base = self.base.with_headers(self.base.headers().remove("host"));
        }
        request.uri = Arc::new(uri);
        request
    }

    /// Return a copy with an explicit request target
    ///
    /// Targets containing whitespace fail with
    /// [`Error::InvalidRequestTarget`].
    pub fn with_request_target(&self, target: &str) -> Result<Self> {
        if target.chars().any(char::is_whitespace) {
            return Err(Error::InvalidRequestTarget(target.to_string()));
        }
        let mut request = self.clone();
        request.request_target = Some(Arc::from(target));
        Ok(request)
    }

    /// Host value derived from the URI, if it has a host
    fn host_from_uri(&self) -> Option<String> {
        let host = self.uri.host();
        if host.is_empty() {
            return None;
        }
        match self.uri.port() {
            Some(port) if self.uri.is_non_standard_port() => Some(format!("{}:{}", host, port)),
            _ => Some(host.to_string()),
        }
    }

    /// Whether two requests share the same URI instance
    pub fn shares_uri(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.uri, &other.uri)
    }

    /// Convert the request to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        super::serialize::request_to_bytes(self)
    }
}

impl Message for Request {
    fn base(&self) -> &BaseMessage {
        &self.base
    }

    fn with_base(&self, base: BaseMessage) -> Self {
        let mut request = self.clone();
        request.base = base;
        request
    }

    /// Headers with `Host` synthesized from the URI when none was set
    ///
    /// The synthesized value is never stored.
    fn headers(&self) -> Cow<'_, HeaderBag> {
        let stored = self.base.headers();
        if stored.contains("host") {
            return Cow::Borrowed(stored);
        }
        let Some(host) = self.host_from_uri() else {
            return Cow::Borrowed(stored);
        };

        let mut headers = HeaderBag::new();
        // Both came from validated sources; a failure just skips the Host
        if headers.insert_mut("Host", host).is_err() {
            return Cow::Borrowed(stored);
        }
        for (name, values) in stored.iter() {
            if headers.append_mut(name, values).is_err() {
                return Cow::Borrowed(stored);
            }
        }
        Cow::Owned(headers)
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    uri: Option<Uri>,
    version: Option<String>,
    headers: HeaderBag,
    body: Option<BodySource>,
    error: Option<Error>,
}

impl RequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// Set the URI
    pub fn uri(mut self, uri: impl IntoUri) -> Self {
        match uri.into_uri() {
            Ok(uri) => self.uri = Some(uri),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Set the protocol version
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Add a header
    pub fn header(mut self, name: &str, values: impl IntoHeaderValues) -> Self {
        if let Err(e) = self.headers.append_mut(name, values) {
            self.fail(e);
        }
        self
    }

    /// Set the body source
    pub fn body(mut self, body: impl Into<BodySource>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set an in-memory body holding `content`
    pub fn body_str(self, content: &str) -> Self {
        self.body(Body::from_bytes(content))
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Build the request, reporting the first invalid part
    pub fn build(self) -> Result<Request> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let body = match self.body {
            Some(source) => Body::from_source(source)?,
            None => Body::empty(),
        };
        let mut base = BaseMessage::new(self.headers, body);
        if let Some(version) = self.version {
            base = base.with_protocol_version(&version)?;
        }
        Request::from_parts(
            base,
            self.method.as_deref().unwrap_or("GET"),
            self.uri.unwrap_or_default(),
        )
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    base: BaseMessage,
    status: Status,
    reason: Option<Arc<str>>,
}

impl Response {
    /// Create a response with an empty in-memory body
    pub fn new(code: u16) -> Result<Self> {
        Response::builder().status(code).build()
    }

    /// Create a builder for constructing responses
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Get the status code
    pub fn status_code(&self) -> u16 {
        self.status.code()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Reason phrase; the registered one unless a custom one was set
    pub fn reason_phrase(&self) -> &str {
        match &self.reason {
            Some(reason) if !reason.is_empty() => reason,
            _ => self.status.reason_phrase(),
        }
    }

    /// Return a copy with a new status
    ///
    /// The reason phrase is always replaced: by `reason` when given, by the
    /// registered phrase of `code` otherwise.
    pub fn with_status(&self, code: u16, reason: Option<&str>) -> Result<Self> {
        let status = Status::new(code)?;
        if let Some(reason) = reason {
            if reason.contains(['\r', '\n']) {
                return Err(Error::InvalidArgument(format!(
                    "reason phrase {:?} contains a line break",
                    reason
                )));
            }
        }
        let mut response = self.clone();
        response.status = status;
        response.reason = reason.map(Arc::from);
        Ok(response)
    }

    /// Convert the response to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        super::serialize::response_to_bytes(self)
    }
}

impl Message for Response {
    fn base(&self) -> &BaseMessage {
        &self.base
    }

    fn with_base(&self, base: BaseMessage) -> Self {
        let mut response = self.clone();
        response.base = base;
        response
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<u16>,
    reason: Option<String>,
    version: Option<String>,
    headers: HeaderBag,
    body: Option<BodySource>,
    error: Option<Error>,
}

impl ResponseBuilder {
    /// Set the protocol version
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Set the status code
    pub fn status(mut self, code: u16) -> Self {
        self.status = Some(code);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: &str, values: impl IntoHeaderValues) -> Self {
        if let Err(e) = self.headers.append_mut(name, values) {
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
        self
    }

    /// Set the body source
    pub fn body(mut self, body: impl Into<BodySource>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set an in-memory body holding `content`
    pub fn body_str(self, content: &str) -> Self {
        self.body(Body::from_bytes(content))
    }

    /// Build the response, reporting the first invalid part
    pub fn build(self) -> Result<Response> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let body = match self.body {
            Some(source) => Body::from_source(source)?,
            None => Body::empty(),
        };
        let mut base = BaseMessage::new(self.headers, body);
        if let Some(version) = self.version {
            base = base.with_protocol_version(&version)?;
        }
        let response = Response {
            base,
            status: Status::OK,
            reason: None,
        };
        response.with_status(self.status.unwrap_or(200), self.reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stream::ByteStream;

    #[test]
    fn test_status() {
        let status = Status::new(200).unwrap();
        assert_eq!(status.code(), 200);
        assert_eq!(status.reason_phrase(), "OK");
        assert!(status.is_success());
        assert!(!status.is_client_error());
        assert_eq!(Status::new(299).unwrap().reason_phrase(), "");
    }

    #[test]
    fn test_status_bounds() {
        assert!(matches!(Status::new(99), Err(Error::InvalidStatus(99))));
        assert!(matches!(Status::new(600), Err(Error::InvalidStatus(600))));
        assert!(Status::new(100).is_ok());
        assert!(Status::new(599).is_ok());

        assert!(Response::new(99).is_err());
        assert!(Response::new(600).is_err());
        let response = Response::new(100).unwrap();
        assert!(response.with_status(599, None).is_ok());
        assert!(response.with_status(600, None).is_err());
        assert!(response.with_status(99, None).is_err());
    }

    #[test]
    fn test_protocol_version() {
        let request = Request::new("GET", "/").unwrap();
        assert_eq!(request.protocol_version(), "1.1");

        let v2 = request.with_protocol_version("2").unwrap();
        assert_eq!(v2.protocol_version(), "2");
        assert_eq!(request.protocol_version(), "1.1");
        assert_eq!(request.with_protocol_version("1.0").unwrap().protocol_version(), "1.0");

        for bad in ["", "1.", ".1", "1.1.1", "HTTP/1.1", "one"] {
            assert!(matches!(
                request.with_protocol_version(bad),
                Err(Error::InvalidVersion(_))
            ));
        }
    }

    #[test]
    fn test_request_builder() {
        let req = Request::builder()
            .method("POST")
            .uri("/test")
            .header("Content-Type", "text/plain")
            .body_str("Hello")
            .build()
            .unwrap();

        assert_eq!(req.method(), "POST");
        assert_eq!(req.uri().path(), "/test");
        assert_eq!(req.body().to_bytes(), "Hello");
        assert_eq!(req.header("content-type"), ["text/plain"]);
    }

    #[test]
    fn test_request_builder_reports_errors() {
        assert!(matches!(
            Request::builder().uri("ftp://example.com").build(),
            Err(Error::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Request::builder().header("Bad Name", "x").build(),
            Err(Error::InvalidHeaderName(_))
        ));
        assert!(matches!(
            Request::builder().method("BAD METHOD").build(),
            Err(Error::InvalidMethod(_))
        ));
        assert!(matches!(
            Request::builder().method("").build(),
            Err(Error::InvalidMethod(_))
        ));
        assert!(matches!(
            Request::builder().body("").build(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_with_method() {
        let request = Request::new("GET", "/").unwrap();
        let patched = request.with_method("PATCH").unwrap();
        assert_eq!(patched.method(), "PATCH");
        assert_eq!(request.method(), "GET");
        assert!(request.with_method("GET /").is_err());
        assert_eq!(request.method(), "GET");
    }

    #[test]
    fn test_request_target() {
        let request = Request::new("GET", "http://example.com/foo?bar=baz").unwrap();
        assert_eq!(request.request_target(), "/foo?bar=baz");

        let empty = Request::new("GET", "http://example.com").unwrap();
        assert_eq!(empty.request_target(), "/");

        let options = request.with_request_target("*").unwrap();
        assert_eq!(options.request_target(), "*");
        assert_eq!(request.request_target(), "/foo?bar=baz");

        assert!(matches!(
            request.with_request_target("/foo bar"),
            Err(Error::InvalidRequestTarget(_))
        ));
    }

    #[test]
    fn test_host_is_synthesized_on_read() {
        let request = Request::new("GET", "http://example.com:8080/foo").unwrap();

        assert!(request.has_header("host"));
        assert_eq!(request.header_line("Host"), "example.com:8080");
        assert_eq!(request.headers().iter().next().unwrap().0, "Host");
        assert!(!request.base().headers().contains("host"));

        let standard = Request::new("GET", "https://example.com:443/").unwrap();
        assert_eq!(standard.header_line("host"), "example.com");

        let no_host = Request::new("GET", "/foo").unwrap();
        assert!(!no_host.has_header("host"));
    }

    #[test]
    fn test_explicit_host_wins() {
        let request = Request::builder()
            .uri("http://example.com/")
            .header("Host", "explicit.test")
            .build()
            .unwrap();
        assert_eq!(request.header("host"), ["explicit.test"]);
    }

    #[test]
    fn test_with_uri_host_handling() {
        let request = Request::builder()
            .uri("http://example.com/")
            .header("Host", "example.com")
            .build()
            .unwrap();
        let other = Uri::parse("http://other.test/path").unwrap();

        let moved = request.with_uri(other.clone(), false);
        assert_eq!(moved.header_line("Host"), "other.test");
        assert_eq!(moved.uri().path(), "/path");

        let preserved = request.with_uri(other, true);
        assert_eq!(preserved.header_line("Host"), "example.com");

        let hostless = request.with_uri(Uri::parse("/local").unwrap(), false);
        assert_eq!(hostless.header_line("Host"), "example.com");

        assert_eq!(request.uri().host(), "example.com");
    }

    #[test]
    fn test_with_header_is_copy_on_write() {
        let request = Request::new("GET", "/").unwrap();
        let with = request.with_header("X-Foo", "bar").unwrap();

        assert!(with.has_header("x-foo"));
        assert!(!request.has_header("x-foo"));
        assert!(with.body().ptr_eq(request.body()));
        assert!(with.shares_uri(&request));
        assert!(!with.base().shares_headers(request.base()));

        let failed = with.with_header("X-Foo", "bad\nvalue");
        assert!(failed.is_err());
        assert_eq!(with.header("X-Foo"), ["bar"]);
    }

    #[test]
    fn test_added_and_removed_headers() {
        let response = Response::new(200)
            .unwrap()
            .with_header("Vary", "Accept")
            .unwrap()
            .with_added_header("vary", "Accept-Encoding")
            .unwrap();
        assert_eq!(response.header_line("Vary"), "Accept,Accept-Encoding");

        let removed = response.without_header("VARY");
        assert!(!removed.has_header("vary"));
        assert!(response.has_header("vary"));

        let untouched = removed.without_header("absent");
        assert!(untouched.base().shares_headers(removed.base()));
    }

    #[test]
    fn test_with_body() {
        let response = Response::new(200).unwrap();
        let body = Body::from_bytes("new body");
        let replaced = response.with_body(body.clone());

        assert!(replaced.body().ptr_eq(&body));
        assert!(!response.body().ptr_eq(&body));
        assert!(response.body().to_bytes().is_empty());
        assert!(replaced.base().shares_headers(response.base()));
    }

    #[test]
    fn test_reason_phrase() {
        let response = Response::new(404).unwrap();
        assert_eq!(response.reason_phrase(), "Not Found");

        let custom = response.with_status(404, Some("Nowhere")).unwrap();
        assert_eq!(custom.reason_phrase(), "Nowhere");

        let reset = custom.with_status(404, None).unwrap();
        assert_eq!(reset.reason_phrase(), "Not Found");

        let moved = custom.with_status(201, None).unwrap();
        assert_eq!(moved.status_code(), 201);
        assert_eq!(moved.reason_phrase(), "Created");

        assert_eq!(custom.status_code(), 404);
        assert_eq!(custom.reason_phrase(), "Nowhere");

        assert!(response.with_status(200, Some("OK\r\nX: y")).is_err());
    }

    #[test]
    fn test_response_builder() {
        let resp = Response::builder()
            .status(404)
            .header("Content-Type", "text/html")
            .body_str("Not Found")
            .build()
            .unwrap();

        assert_eq!(resp.status_code(), 404);
        assert_eq!(resp.body().to_bytes(), "Not Found");
        assert_eq!(resp.header_line("content-type"), "text/html");
        assert_eq!(Response::builder().build().unwrap().status_code(), 200);
    }

    #[test]
    fn test_body_stream_is_shared_between_copies() {
        let request = Request::builder().body_str("abc").build().unwrap();
        let copy = request.with_method("PUT").unwrap();
        copy.body().lock().read(1).unwrap();
        assert_eq!(request.body().lock().tell().unwrap(), 1);
    }
}
