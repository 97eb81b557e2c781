//! Environment marshaling
//!
//! This module turns a CGI-style server environment into message parts:
//! canonical headers, the request URI as the client intended it, uploaded
//! file trees, and finally a complete [`ServerRequest`].
//!
//! Environments are full of contradictory hints (rewrite proxies, IIS
//! variables, forwarded headers, misreported IPv6 hosts). Every helper here
//! degrades missing data to a default instead of failing; errors only come
//! from values the resulting [`Uri`] or message refuses.

use super::config::MarshalConfig;
use super::headers::HeaderBag;
use super::message::{validate_protocol_version, BaseMessage, Request};
use super::server_request::{Params, ServerRequest};
use super::stream::{Body, InputStream};
use super::upload::{UploadedFile, UploadedFiles};
use super::uri::Uri;
use super::{Error, Result};
use indexmap::IndexMap;
use std::io::{self, Read};
use tracing::debug;

/// Server variables, in the order the server reported them
pub type ServerVars = IndexMap<String, String>;

/// Nested form-style value (query, parsed body, raw file descriptors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Scalar(String),
    List(Vec<InputValue>),
    Map(IndexMap<String, InputValue>),
}

impl InputValue {
    /// Child by key, or by index for lists
    pub fn get(&self, key: &str) -> Option<&InputValue> {
        match self {
            InputValue::Scalar(_) => None,
            InputValue::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            InputValue::Map(map) => map.get(key),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Keys of a list (`0..n`) or map, in order
    fn keys(&self) -> Vec<String> {
        match self {
            InputValue::Scalar(_) => Vec::new(),
            InputValue::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            InputValue::Map(map) => map.keys().cloned().collect(),
        }
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Scalar(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        InputValue::Scalar(s)
    }
}

/// Source of raw request headers outside the server variables
///
/// Some servers hide headers such as `Authorization` from the CGI
/// variables; a source lets the caller supply them explicitly.
pub trait HeaderSource {
    fn raw_headers(&self) -> Vec<(String, String)>;
}

/// Header source that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeaderSource;

impl HeaderSource for NoHeaderSource {
    fn raw_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

impl HeaderSource for Vec<(String, String)> {
    fn raw_headers(&self) -> Vec<(String, String)> {
        self.clone()
    }
}

impl HeaderSource for IndexMap<String, String> {
    fn raw_headers(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Fill in `HTTP_AUTHORIZATION` from `source` when the server hid it
pub fn normalize_server(server: &ServerVars, source: &dyn HeaderSource) -> ServerVars {
    let mut server = server.clone();
    if server.contains_key("HTTP_AUTHORIZATION") {
        return server;
    }

    let authorization = source
        .raw_headers()
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"));
    if let Some((_, value)) = authorization {
        server.insert("HTTP_AUTHORIZATION".to_string(), value);
    }
    server
}

/// Extract headers from server variables
///
/// `HTTP_X_FOO_BAR` becomes `X-Foo-Bar` and `CONTENT_TYPE` becomes
/// `Content-Type`. `REDIRECT_`-prefixed variables count unless the plain
/// variable exists. Empty values and `HTTP_COOKIE` are skipped.
pub fn marshal_headers(server: &ServerVars) -> IndexMap<String, String> {
    let mut headers = IndexMap::new();

    for (key, value) in server {
        if value.is_empty() {
            continue;
        }

        let key = match key.strip_prefix("REDIRECT_") {
            Some(plain) if server.contains_key(plain) => continue,
            Some(plain) => plain,
            None => key.as_str(),
        };

        if key == "HTTP_COOKIE" {
            continue;
        }

        if let Some(name) = key.strip_prefix("HTTP_") {
            headers.insert(canonical_name(name), value.clone());
        } else if let Some(name) = key.strip_prefix("CONTENT_") {
            headers.insert(format!("Content-{}", canonical_name(name)), value.clone());
        }
    }

    headers
}

/// `X_FOO_BAR` -> `X-Foo-Bar`; `MD5` stays upper-case
fn canonical_name(raw: &str) -> String {
    raw.split('_')
        .map(|word| {
            if word.eq_ignore_ascii_case("md5") {
                return "MD5".to_string();
            }
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Case-insensitive header lookup with a fallback
pub fn find_header<'a>(
    headers: &'a IndexMap<String, String>,
    name: &str,
    default: &'a str,
) -> &'a str {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .unwrap_or(default)
}

/// Derive the request URI with the default [`MarshalConfig`]
pub fn marshal_uri(server: &ServerVars, headers: &IndexMap<String, String>) -> Result<Uri> {
    marshal_uri_with(server, headers, &MarshalConfig::default())
}

/// Derive the request URI from server variables and marshaled headers
pub fn marshal_uri_with(
    server: &ServerVars,
    headers: &IndexMap<String, String>,
    config: &MarshalConfig,
) -> Result<Uri> {
    let scheme = marshal_scheme(server, headers, config);
    let (host, port) = marshal_host_and_port(server, headers, config);
    let (path, fragment) = split_fragment(marshal_request_path(server));
    let query = server.get("QUERY_STRING").map(String::as_str).unwrap_or("");

    let mut uri = Uri::new().with_scheme(scheme)?.with_host(&host);
    if let Some(port) = port {
        uri = uri.with_port_str(&port)?;
    }
    uri = uri.with_path(&path)?.with_query(query)?;
    if let Some(fragment) = fragment {
        uri = uri.with_fragment(&fragment);
    }
    Ok(uri)
}

fn marshal_scheme(
    server: &ServerVars,
    headers: &IndexMap<String, String>,
    config: &MarshalConfig,
) -> &'static str {
    let https = server.get("HTTPS").map(String::as_str).unwrap_or("");
    let https_on = !https.is_empty() && https != "0" && !https.eq_ignore_ascii_case("off");

    let forwarded = config.trust_forwarded_proto
        && find_header(headers, "x-forwarded-proto", "").eq_ignore_ascii_case("https");

    if https_on || forwarded {
        "https"
    } else {
        "http"
    }
}

fn marshal_host_and_port(
    server: &ServerVars,
    headers: &IndexMap<String, String>,
    config: &MarshalConfig,
) -> (String, Option<String>) {
    let host_header = find_header(headers, "host", "");
    if !host_header.is_empty() {
        return split_host_header(host_header);
    }

    let server_name = match server.get("SERVER_NAME") {
        Some(name) if !name.is_empty() => name.clone(),
        _ => return (String::new(), None),
    };
    let port = server.get("SERVER_PORT").filter(|p| !p.is_empty()).cloned();

    match server.get("SERVER_ADDR") {
        Some(addr) if is_bracketed_ipv6(&server_name) => repair_ipv6_host(addr, port, config),
        _ => (server_name, port),
    }
}

/// Split `host[:port]` on a trailing `:digits`
///
/// A bracketed IPv6 literal ends in `]`, so its inner colons never match.
fn split_host_header(value: &str) -> (String, Option<String>) {
    if let Some((host, port)) = value.rsplit_once(':') {
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            return (host.to_string(), Some(port.to_string()));
        }
    }
    (value.to_string(), None)
}

fn is_bracketed_ipv6(host: &str) -> bool {
    host.len() > 2
        && host.starts_with('[')
        && host.ends_with(']')
        && host[1..host.len() - 1]
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b':')
}

/// Rebuild the host from `SERVER_ADDR` for browsers that misreport IPv6
/// hosts, dropping the port when it was really the address's last group
fn repair_ipv6_host(
    addr: &str,
    port: Option<String>,
    config: &MarshalConfig,
) -> (String, Option<String>) {
    let host = format!("[{}]", addr);
    let port = port.unwrap_or_else(|| config.ipv6_default_port.to_string());

    let tail = host.rsplit_once(':').map(|(_, tail)| tail).unwrap_or("");
    let absorbed = format!("{}]", port) == tail;
    debug!(%host, %port, absorbed, "repaired IPv6 host from SERVER_ADDR");

    if absorbed {
        (host, None)
    } else {
        (host, Some(port))
    }
}

/// Pick the request path, trusting rewrite hints over `REQUEST_URI`
fn marshal_request_path(server: &ServerVars) -> String {
    let get = |key: &str| server.get(key).filter(|v| !v.is_empty());

    if server.get("IIS_WasUrlRewritten").map(String::as_str) == Some("1") {
        if let Some(unencoded) = get("UNENCODED_URL") {
            debug!(source = "UNENCODED_URL", "using IIS rewritten path");
            return strip_query(unencoded);
        }
    }

    for key in ["HTTP_X_ORIGINAL_URL", "HTTP_X_REWRITE_URL", "REQUEST_URI"] {
        if let Some(value) = get(key) {
            debug!(source = key, "using request path");
            return strip_query(strip_scheme_and_host(value));
        }
    }

    if let Some(orig) = get("ORIG_PATH_INFO") {
        debug!(source = "ORIG_PATH_INFO", "using request path");
        return strip_query(orig);
    }

    "/".to_string()
}

/// Drop a leading `scheme://host` some proxies leave in the request URI
fn strip_scheme_and_host(uri: &str) -> &str {
    let Some(pos) = uri.find("://") else {
        return uri;
    };
    let scheme = &uri[..pos];
    if scheme.is_empty() || scheme.contains(['/', ':']) {
        return uri;
    }
    let rest = &uri[pos + 3..];
    match rest.find('/') {
        Some(slash) if slash > 0 => &rest[slash..],
        Some(_) => uri,
        None if rest.is_empty() => uri,
        None => "",
    }
}

fn strip_query(uri: &str) -> String {
    match uri.split_once('?') {
        Some((path, _)) => path.to_string(),
        None => uri.to_string(),
    }
}

fn split_fragment(path: String) -> (String, Option<String>) {
    match path.split_once('#') {
        Some((path, fragment)) => (path.to_string(), Some(fragment.to_string())),
        None => (path, None),
    }
}

/// `REQUEST_METHOD`, defaulting to `GET`
pub fn marshal_method(server: &ServerVars) -> String {
    server
        .get("REQUEST_METHOD")
        .filter(|m| !m.is_empty())
        .cloned()
        .unwrap_or_else(|| "GET".to_string())
}

/// Protocol version from `SERVER_PROTOCOL` (`HTTP/1.1` -> `1.1`)
pub fn marshal_protocol_version(server: &ServerVars) -> Result<String> {
    let Some(protocol) = server.get("SERVER_PROTOCOL") else {
        return Ok(super::DEFAULT_PROTOCOL_VERSION.to_string());
    };
    let version = protocol.strip_prefix("HTTP/").unwrap_or(protocol);
    validate_protocol_version(version)
        .map_err(|_| Error::InvalidVersion(protocol.clone()))?;
    Ok(version.to_string())
}

/// Parse a `Cookie` header into name/value pairs
///
/// Values may be quoted and are URL-decoded. Malformed pairs are skipped.
pub fn parse_cookie_header(header: &str) -> Params {
    let mut cookies = Params::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if name.is_empty() || !name.bytes().all(super::validate::is_token_byte) {
            continue;
        }
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let value = value.replace('+', " ");
        let value = urlencoding::decode(&value)
            .map(|v| v.into_owned())
            .unwrap_or(value);
        cookies.insert(name.to_string(), value);
    }

    cookies
}

/// Parse a query string into an ordered map; later keys win
pub fn parse_query(query: &str) -> Params {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Turn raw file descriptors into uploaded files
///
/// Wherever a map holds a `tmp_name` entry it describes an upload. A scalar
/// `tmp_name` yields one file; a list or map `tmp_name` describes several
/// uploads side by side (`name[i]`, `size[i]`, ...) and yields a parallel
/// tree. Other maps and lists are walked recursively.
pub fn normalize_files(
    files: &IndexMap<String, InputValue>,
) -> Result<IndexMap<String, UploadedFiles>> {
    files
        .iter()
        .map(|(key, value)| Ok((key.clone(), normalize_file_value(value)?)))
        .collect()
}

fn normalize_file_value(value: &InputValue) -> Result<UploadedFiles> {
    match value {
        InputValue::Map(map) if map.contains_key("tmp_name") => upload_from_descriptor(map),
        InputValue::Map(map) => Ok(UploadedFiles::Map(normalize_files(map)?)),
        InputValue::List(items) => Ok(UploadedFiles::List(
            items
                .iter()
                .map(normalize_file_value)
                .collect::<Result<_>>()?,
        )),
        InputValue::Scalar(s) => Err(Error::InvalidArgument(format!(
            "invalid value {:?} in file descriptors",
            s
        ))),
    }
}

fn upload_from_descriptor(descriptor: &IndexMap<String, InputValue>) -> Result<UploadedFiles> {
    let field = |name: &str| descriptor.get(name).and_then(InputValue::as_str);

    match descriptor.get("tmp_name") {
        Some(InputValue::Scalar(tmp_name)) => {
            let size = field("size").and_then(|s| s.trim().parse::<u64>().ok());
            let error = match field("error").map(str::trim) {
                None | Some("") => 0,
                Some(code) => code.parse::<u8>().map_err(|_| {
                    Error::InvalidArgument(format!("invalid upload error code {:?}", code))
                })?,
            };
            let file = UploadedFile::new(
                tmp_name.as_str(),
                size,
                error,
                field("name").map(str::to_string),
                field("type").map(str::to_string),
            )?;
            Ok(UploadedFiles::File(file))
        }
        Some(nested @ (InputValue::List(_) | InputValue::Map(_))) => {
            upload_from_nested_descriptor(descriptor, nested)
        }
        None => Err(Error::InvalidArgument(
            "file descriptor has no tmp_name".to_string(),
        )),
    }
}

/// One upload per index of `tmp_name`, each built from the same index of
/// the sibling fields
fn upload_from_nested_descriptor(
    descriptor: &IndexMap<String, InputValue>,
    tmp_names: &InputValue,
) -> Result<UploadedFiles> {
    let mut children = IndexMap::new();

    for key in tmp_names.keys() {
        let mut child = IndexMap::new();
        for field in ["tmp_name", "size", "error", "name", "type"] {
            if let Some(value) = descriptor.get(field).and_then(|v| v.get(&key)) {
                child.insert(field.to_string(), value.clone());
            }
        }
        children.insert(key, upload_from_descriptor(&child)?);
    }

    Ok(match tmp_names {
        InputValue::List(_) => UploadedFiles::List(children.into_values().collect()),
        _ => UploadedFiles::Map(children),
    })
}

/// Everything a server hands over about one incoming request
#[derive(Default)]
pub struct Environment {
    pub server: ServerVars,
    /// Query parameters; parsed from `QUERY_STRING` when `None`
    pub query: Option<Params>,
    pub parsed_body: Option<InputValue>,
    /// Cookies; parsed from `HTTP_COOKIE` when `None`
    pub cookies: Option<Params>,
    pub files: IndexMap<String, InputValue>,
    /// Raw request body
    pub input: Option<Box<dyn Read + Send>>,
    pub config: MarshalConfig,
}

/// Build a [`ServerRequest`] from a server environment
pub fn server_request_from_environment(
    env: Environment,
    source: &dyn HeaderSource,
) -> Result<ServerRequest> {
    let server = normalize_server(&env.server, source);
    let headers = marshal_headers(&server);
    let uri = marshal_uri_with(&server, &headers, &env.config)?;
    let method = marshal_method(&server);
    let version = marshal_protocol_version(&server)?;
    let files = normalize_files(&env.files)?;

    let cookies = env.cookies.unwrap_or_else(|| {
        server
            .get("HTTP_COOKIE")
            .map(|c| parse_cookie_header(c))
            .unwrap_or_default()
    });
    let query = env.query.unwrap_or_else(|| {
        server
            .get("QUERY_STRING")
            .map(|q| parse_query(q))
            .unwrap_or_default()
    });

    let input: Box<dyn Read + Send> = match env.input {
        Some(input) => input,
        None => Box::new(io::empty()),
    };
    let body = Body::new(InputStream::new(input));

    let base = BaseMessage::new(HeaderBag::from_pairs(headers)?, body)
        .with_protocol_version(&version)?;
    let request = Request::from_parts(base, &method, uri)?;

    Ok(ServerRequest::new(request, server)
        .with_cookie_params(cookies)
        .with_query_params(query)
        .with_parsed_body(env.parsed_body)
        .with_uploaded_files(files))
}
