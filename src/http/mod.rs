//! Immutable HTTP message model
//!
//! Messages, headers and URIs are values: every `with_*` call returns a new
//! instance and leaves the receiver untouched. Unchanged parts (header bag,
//! URI, body) are shared between the old and the new value.
//!
//! The only mutable state in the model is the cursor of a body stream.
//! Streams are not meant to be driven from several threads at once; the
//! [`Body`] handle serializes access but interleaved `read`/`seek` calls from
//! different owners still race on the cursor.
//!
//! # Examples
//!
//! ```
//! use httpmsg::http::{Message, Request, Uri};
//!
//! let request = Request::builder()
//!     .method("POST")
//!     .uri("https://example.com:8443/api?x=1")
//!     .header("Content-Type", "application/json")
//!     .body_str("{}")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.header_line("host"), "example.com:8443");
//! assert_eq!(request.request_target(), "/api?x=1");
//!
//! let moved = request.with_uri(Uri::parse("http://other.test/").unwrap(), false);
//! assert_eq!(moved.header_line("Host"), "other.test");
//! assert_eq!(request.header_line("Host"), "example.com:8443");
//! ```

pub mod config;
pub mod headers;
pub mod marshal;
pub mod message;
pub mod serialize;
pub mod server_request;
pub mod stream;
pub mod upload;
pub mod uri;
pub mod validate;

pub use config::{MarshalConfig, SchemeRegistry};
pub use headers::{HeaderBag, IntoHeaderValues};
pub use marshal::{Environment, HeaderSource, InputValue, NoHeaderSource, ServerVars};
pub use message::{
    BaseMessage, IntoUri, Message, Request, RequestBuilder, Response, ResponseBuilder, Status,
};
pub use server_request::ServerRequest;
pub use stream::{
    Body, BodySource, ByteStream, CallbackStream, Detached, InputStream, RelativeStream, Stream,
};
pub use upload::{UploadErrorCode, UploadedFile, UploadedFiles};
pub use uri::Uri;

/// Result type for HTTP message operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP message errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),

    #[error("Unsupported scheme: {0:?}")]
    UnsupportedScheme(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Malformed URI: {0:?}")]
    InvalidUri(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(u16),

    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("Invalid request target: {0:?}")]
    InvalidRequestTarget(String),

    #[error("Invalid HTTP version: {0:?}")]
    InvalidVersion(String),

    #[error("Stream unusable: {0}")]
    StreamUnusable(&'static str),

    #[error("Invalid pointer position: cursor {position} is before offset {offset}")]
    InvalidPointerPosition { position: u64, offset: u64 },

    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default protocol version of new messages
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.1";

/// CRLF line ending
pub const CRLF: &str = "\r\n";
