//! Server-side request
//!
//! [`ServerRequest`] is a [`Request`] as seen by the application receiving
//! it: alongside the message it carries the server variables, cookies,
//! query parameters, parsed body, uploaded files and free-form attributes.

use super::headers::HeaderBag;
use super::marshal::{InputValue, ServerVars};
use super::message::{BaseMessage, Message, Request};
use super::upload::UploadedFiles;
use super::uri::Uri;
use super::Result;
use indexmap::IndexMap;
use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

/// Value stored as a request attribute
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// Flat string parameters (query string, cookies)
pub type Params = IndexMap<String, String>;

/// Incoming request with its server-side context
#[derive(Debug, Clone)]
pub struct ServerRequest {
    request: Request,
    server_params: Arc<ServerVars>,
    cookie_params: Arc<Params>,
    query_params: Arc<Params>,
    parsed_body: Option<Arc<InputValue>>,
    uploaded_files: Arc<IndexMap<String, UploadedFiles>>,
    attributes: Arc<IndexMap<String, Attribute>>,
}

impl ServerRequest {
    /// Wrap a request with the server variables it was received with
    pub fn new(request: Request, server_params: ServerVars) -> Self {
        ServerRequest {
            request,
            server_params: Arc::new(server_params),
            cookie_params: Arc::default(),
            query_params: Arc::default(),
            parsed_body: None,
            uploaded_files: Arc::default(),
            attributes: Arc::default(),
        }
    }

    /// The underlying request
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn request_target(&self) -> String {
        self.request.request_target()
    }

    pub fn server_params(&self) -> &ServerVars {
        &self.server_params
    }

    pub fn cookie_params(&self) -> &Params {
        &self.cookie_params
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    pub fn parsed_body(&self) -> Option<&InputValue> {
        self.parsed_body.as_deref()
    }

    pub fn uploaded_files(&self) -> &IndexMap<String, UploadedFiles> {
        &self.uploaded_files
    }

    pub fn attributes(&self) -> &IndexMap<String, Attribute> {
        &self.attributes
    }

    /// Typed attribute lookup; `None` if absent or of another type
    pub fn attribute<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name).and_then(|a| a.downcast_ref::<T>())
    }

    fn with_request(&self, request: Request) -> Self {
        let mut server_request = self.clone();
        server_request.request = request;
        server_request
    }

    pub fn with_method(&self, method: &str) -> Result<Self> {
        Ok(self.with_request(self.request.with_method(method)?))
    }

    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        self.with_request(self.request.with_uri(uri, preserve_host))
    }

    pub fn with_request_target(&self, target: &str) -> Result<Self> {
        Ok(self.with_request(self.request.with_request_target(target)?))
    }

    pub fn with_cookie_params(&self, cookies: Params) -> Self {
        let mut request = self.clone();
        request.cookie_params = Arc::new(cookies);
        request
    }

    pub fn with_query_params(&self, query: Params) -> Self {
        let mut request = self.clone();
        request.query_params = Arc::new(query);
        request
    }

    /// Replace the parsed body; `None` means no parsed body
    pub fn with_parsed_body(&self, body: Option<InputValue>) -> Self {
        let mut request = self.clone();
        request.parsed_body = body.map(Arc::new);
        request
    }

    pub fn with_uploaded_files(&self, files: IndexMap<String, UploadedFiles>) -> Self {
        let mut request = self.clone();
        request.uploaded_files = Arc::new(files);
        request
    }

    pub fn with_attribute<T: Any + Send + Sync>(&self, name: &str, value: T) -> Self {
        let mut attributes = (*self.attributes).clone();
        attributes.insert(name.to_string(), Arc::new(value));
        let mut request = self.clone();
        request.attributes = Arc::new(attributes);
        request
    }

    /// Drop an attribute; absent names return an equal copy
    pub fn without_attribute(&self, name: &str) -> Self {
        if !self.attributes.contains_key(name) {
            return self.clone();
        }
        let mut attributes = (*self.attributes).clone();
        attributes.shift_remove(name);
        let mut request = self.clone();
        request.attributes = Arc::new(attributes);
        request
    }
}

impl Message for ServerRequest {
    fn base(&self) -> &BaseMessage {
        self.request.base()
    }

    fn with_base(&self, base: BaseMessage) -> Self {
        self.with_request(self.request.with_base(base))
    }

    fn headers(&self) -> Cow<'_, HeaderBag> {
        self.request.headers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::upload::UploadedFile;
    use crate::http::Body;

    fn server_request() -> ServerRequest {
        let request = Request::new("GET", "http://example.com/search?q=rust").unwrap();
        let mut server = ServerVars::new();
        server.insert("SERVER_NAME".to_string(), "example.com".to_string());
        ServerRequest::new(request, server)
    }

    #[test]
    fn test_delegates_to_request() {
        let request = server_request();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.uri().host(), "example.com");
        assert_eq!(request.request_target(), "/search?q=rust");
        assert_eq!(request.header_line("host"), "example.com");
        assert_eq!(request.server_params()["SERVER_NAME"], "example.com");
    }

    #[test]
    fn test_params_are_copy_on_write() {
        let request = server_request();
        let mut query = Params::new();
        query.insert("q".to_string(), "rust".to_string());
        let mut cookies = Params::new();
        cookies.insert("session".to_string(), "abc".to_string());

        let updated = request
            .with_query_params(query)
            .with_cookie_params(cookies)
            .with_parsed_body(Some(InputValue::from("raw")));

        assert_eq!(updated.query_params()["q"], "rust");
        assert_eq!(updated.cookie_params()["session"], "abc");
        assert_eq!(updated.parsed_body(), Some(&InputValue::from("raw")));
        assert!(request.query_params().is_empty());
        assert!(request.cookie_params().is_empty());
        assert!(request.parsed_body().is_none());
        assert!(updated.with_parsed_body(None).parsed_body().is_none());
    }

    #[test]
    fn test_attributes() {
        let request = server_request();
        let with = request.with_attribute("user_id", 42u32);

        assert_eq!(with.attribute::<u32>("user_id"), Some(&42));
        assert_eq!(with.attribute::<String>("user_id"), None);
        assert!(request.attribute::<u32>("user_id").is_none());

        let without = with.without_attribute("user_id");
        assert!(without.attributes().is_empty());
        assert_eq!(with.attributes().len(), 1);
        assert!(without.without_attribute("absent").attributes().is_empty());
    }

    #[test]
    fn test_uploaded_files() {
        let request = server_request();
        let mut files = IndexMap::new();
        files.insert(
            "avatar".to_string(),
            UploadedFiles::File(UploadedFile::new(Body::empty(), Some(0), 0, None, None).unwrap()),
        );
        let with = request.with_uploaded_files(files);
        assert_eq!(with.uploaded_files().len(), 1);
        assert!(request.uploaded_files().is_empty());
    }

    #[test]
    fn test_message_methods() {
        let request = server_request();
        let with = request.with_header("X-Trace", "1").unwrap();
        assert_eq!(with.header_line("x-trace"), "1");
        assert!(!request.has_header("x-trace"));
        assert_eq!(with.cookie_params().len(), 0);

        let moved = with.with_uri(Uri::parse("http://other.test/").unwrap(), false);
        assert_eq!(moved.header_line("host"), "other.test");
        assert_eq!(moved.header_line("x-trace"), "1");
    }
}
