//! URI value object
//!
//! [`Uri`] holds the seven components of a URI reference (scheme, user
//! info, host, port, path, query, fragment). It is immutable: every
//! `with_*` method validates its argument and returns a new value.

use super::config::SchemeRegistry;
use super::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Parsed, immutable URI
#[derive(Clone)]
pub struct Uri {
    scheme: String,
    user_info: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
    registry: Arc<SchemeRegistry>,
}

impl Uri {
    /// Create an empty URI using the default scheme registry
    pub fn new() -> Self {
        Uri::empty_with(SchemeRegistry::shared_default())
    }

    fn empty_with(registry: Arc<SchemeRegistry>) -> Self {
        Uri {
            scheme: String::new(),
            user_info: String::new(),
            host: String::new(),
            port: None,
            path: String::new(),
            query: String::new(),
            fragment: String::new(),
            registry,
        }
    }

    /// Parse a URI string using the default scheme registry
    pub fn parse(s: &str) -> Result<Self> {
        Uri::parse_with(s, SchemeRegistry::shared_default())
    }

    /// Parse a URI string, accepting the schemes of `registry`
    ///
    /// Components missing from the source become empty strings (or `None`
    /// for the port). The scheme, port and query go through the same
    /// validation as their `with_*` setters.
    pub fn parse_with(s: &str, registry: Arc<SchemeRegistry>) -> Result<Self> {
        let parts = split_reference(s)?;
        let mut uri = Uri::empty_with(registry);

        uri.scheme = filter_scheme(parts.scheme, &uri.registry)?;
        if let Some(authority) = parts.authority {
            let (user_info, host, port) = split_authority(authority, s)?;
            uri.user_info = user_info.to_string();
            uri.host = host.to_ascii_lowercase();
            uri.port = match port {
                Some(p) => Some(filter_port_str(p)?),
                None => None,
            };
            if uri.host.is_empty() && uri.scheme != "file" {
                return Err(Error::InvalidUri(s.to_string()));
            }
        }
        uri.path = parts.path.to_string();
        uri.query = filter_query(parts.query.unwrap_or(""))?;
        uri.fragment = parts.fragment.unwrap_or("").to_string();

        Ok(uri)
    }

    /// Scheme, lower-cased, without the trailing `:`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// User info, `user` or `user:password`
    pub fn user_info(&self) -> &str {
        &self.user_info
    }

    /// Host, lower-cased; IPv6 literals keep their brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if any
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query without the leading `?`
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fragment without the leading `#`
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Scheme registry this URI validates against
    pub fn registry(&self) -> &Arc<SchemeRegistry> {
        &self.registry
    }

    /// Authority: `[user-info@]host[:port]`, or `""` when there is no host
    ///
    /// The port is only shown when it is not the registered default of the
    /// scheme. Without a scheme every explicit port is shown.
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }

        let mut authority = String::new();
        if !self.user_info.is_empty() {
            authority.push_str(&self.user_info);
            authority.push('@');
        }
        authority.push_str(&self.host);
        if let Some(port) = self.port {
            if self.is_non_standard_port() {
                authority.push(':');
                authority.push_str(&port.to_string());
            }
        }
        authority
    }

    /// Check whether the explicit port differs from the scheme's default
    pub fn is_non_standard_port(&self) -> bool {
        match self.port {
            None => false,
            Some(_) if self.scheme.is_empty() => true,
            Some(port) => self.registry.default_port(&self.scheme) != Some(port),
        }
    }

    /// Return a copy with a new scheme
    ///
    /// The scheme is lower-cased and a stray `://` suffix is dropped. Schemes
    /// missing from the registry fail with [`Error::UnsupportedScheme`].
    pub fn with_scheme(&self, scheme: &str) -> Result<Self> {
        let scheme = filter_scheme(scheme, &self.registry)?;
        let mut uri = self.clone();
        uri.scheme = scheme;
        Ok(uri)
    }

    /// Return a copy with new user info; an empty user clears it
    pub fn with_user_info(&self, user: &str, password: Option<&str>) -> Self {
        let mut uri = self.clone();
        uri.user_info = match password {
            Some(password) if !user.is_empty() && !password.is_empty() => {
                format!("{}:{}", user, password)
            }
            _ => user.to_string(),
        };
        uri
    }

    /// Return a copy with a new host
    pub fn with_host(&self, host: &str) -> Self {
        let mut uri = self.clone();
        uri.host = host.to_ascii_lowercase();
        uri
    }

    /// Return a copy with a new port; `None` clears it
    ///
    /// Ports outside `1..=65535` fail with [`Error::InvalidPort`].
    pub fn with_port(&self, port: Option<u32>) -> Result<Self> {
        let port = match port {
            Some(p) => Some(filter_port(p)?),
            None => None,
        };
        let mut uri = self.clone();
        uri.port = port;
        Ok(uri)
    }

    /// Return a copy with a port given as an integer string
    pub fn with_port_str(&self, port: &str) -> Result<Self> {
        let port = filter_port_str(port)?;
        let mut uri = self.clone();
        uri.port = Some(port);
        Ok(uri)
    }

    /// Return a copy with a new path
    ///
    /// Paths containing `?` or `#` fail with [`Error::InvalidPath`]. A
    /// non-empty path gets a leading `/` if it lacks one.
    pub fn with_path(&self, path: &str) -> Result<Self> {
        if path.contains('?') {
            return Err(Error::InvalidPath(format!(
                "{:?} must not contain a query string",
                path
            )));
        }
        if path.contains('#') {
            return Err(Error::InvalidPath(format!(
                "{:?} must not contain a URI fragment",
                path
            )));
        }

        let mut uri = self.clone();
        uri.path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Ok(uri)
    }

    /// Return a copy with a new query; one leading `?` is dropped
    pub fn with_query(&self, query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        if query.contains('#') {
            return Err(Error::InvalidQuery(format!(
                "{:?} must not contain a URI fragment",
                query
            )));
        }
        let query = filter_query(query)?;
        let mut uri = self.clone();
        uri.query = query;
        Ok(uri)
    }

    /// Return a copy with a new fragment; one leading `#` is dropped
    pub fn with_fragment(&self, fragment: &str) -> Self {
        let mut uri = self.clone();
        uri.fragment = fragment.strip_prefix('#').unwrap_or(fragment).to_string();
        uri
    }

    /// Return a copy validating against another scheme registry
    pub fn with_registry(&self, registry: Arc<SchemeRegistry>) -> Result<Self> {
        if !registry.is_allowed(&self.scheme) {
            return Err(Error::UnsupportedScheme(self.scheme.clone()));
        }
        let mut uri = self.clone();
        uri.registry = registry;
        Ok(uri)
    }

    /// Origin-form: only path and query
    pub fn is_origin(&self) -> bool {
        self.scheme.is_empty() && self.host.is_empty() && self.fragment.is_empty()
    }

    /// Absolute-form: a scheme and an authority
    pub fn is_absolute(&self) -> bool {
        !self.scheme.is_empty() && !self.host.is_empty()
    }

    /// Authority-form: an authority and nothing else
    pub fn is_authority(&self) -> bool {
        !self.host.is_empty()
            && self.scheme.is_empty()
            && self.path.is_empty()
            && self.query.is_empty()
            && self.fragment.is_empty()
    }

    /// Asterisk-form: the path `*` and nothing else
    pub fn is_asterisk(&self) -> bool {
        self.path == "*"
            && self.scheme.is_empty()
            && self.host.is_empty()
            && self.user_info.is_empty()
            && self.port.is_none()
            && self.query.is_empty()
            && self.fragment.is_empty()
    }
}

impl Default for Uri {
    fn default() -> Self {
        Uri::new()
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.user_info == other.user_info
            && self.host == other.host
            && self.port == other.port
            && self.path == other.path
            && self.query == other.query
            && self.fragment == other.fragment
    }
}

impl Eq for Uri {}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uri")
            .field("scheme", &self.scheme)
            .field("user_info", &self.user_info)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("fragment", &self.fragment)
            .finish()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_asterisk() {
            return f.write_str("*");
        }

        let authority = self.authority();
        if self.is_authority() {
            return f.write_str(&authority);
        }

        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }

        if self.scheme == "file" {
            // file URIs never carry an authority
            f.write_str("//")?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
            f.write_str(&self.path)?;
        } else {
            if !authority.is_empty() {
                write!(f, "//{}", authority)?;
            }

            if !self.path.is_empty() {
                if !authority.is_empty() && !self.path.starts_with('/') {
                    f.write_str("/")?;
                    f.write_str(&self.path)?;
                } else if authority.is_empty() && self.path.starts_with("//") {
                    // Would otherwise read back as an authority
                    write!(f, "/{}", self.path.trim_start_matches('/'))?;
                } else {
                    f.write_str(&self.path)?;
                }
            }
        }

        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

/// Raw pieces of a URI reference, per RFC 3986 appendix B
struct Reference<'a> {
    scheme: &'a str,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

fn split_reference(s: &str) -> Result<Reference<'_>> {
    if s.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(Error::InvalidUri(s.to_string()));
    }

    let (rest, fragment) = match s.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (s, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((rest, query)) => (rest, Some(query)),
        None => (rest, None),
    };

    let (scheme, rest) = match rest.find(|c: char| c == ':' || c == '/') {
        // `host:port` with no scheme is an authority, not `scheme:path`
        Some(pos) if rest.as_bytes()[pos] == b':' && is_port_tail(&rest[pos + 1..]) => {
            return Ok(Reference {
                scheme: "",
                authority: Some(rest),
                path: "",
                query,
                fragment,
            });
        }
        Some(pos) if rest.as_bytes()[pos] == b':' && is_scheme(&rest[..pos]) => {
            (&rest[..pos], &rest[pos + 1..])
        }
        _ => ("", rest),
    };

    let (authority, path) = match rest.strip_prefix("//") {
        Some(hier) => match hier.find('/') {
            Some(pos) => (Some(&hier[..pos]), &hier[pos..]),
            None => (Some(hier), ""),
        },
        None => (None, rest),
    };

    Ok(Reference {
        scheme,
        authority,
        path,
        query,
        fragment,
    })
}

fn is_port_tail(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_scheme(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Split an authority into user info, host and port text
fn split_authority<'a>(
    authority: &'a str,
    source: &str,
) -> Result<(&'a str, &'a str, Option<&'a str>)> {
    let (user_info, host_port) = match authority.rfind('@') {
        Some(pos) => (&authority[..pos], &authority[pos + 1..]),
        None => ("", authority),
    };

    let (host, port) = if host_port.starts_with('[') {
        match host_port.find(']') {
            Some(end) => {
                let tail = &host_port[end + 1..];
                match tail.strip_prefix(':') {
                    Some(port) => (&host_port[..=end], Some(port)),
                    None if tail.is_empty() => (host_port, None),
                    None => return Err(Error::InvalidUri(source.to_string())),
                }
            }
            None => return Err(Error::InvalidUri(source.to_string())),
        }
    } else {
        match host_port.rfind(':') {
            Some(pos) => (&host_port[..pos], Some(&host_port[pos + 1..])),
            None => (host_port, None),
        }
    };

    // `host:` carries no port
    let port = port.filter(|p| !p.is_empty());
    if let Some(p) = port {
        if !p.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidUri(source.to_string()));
        }
    }

    Ok((user_info, host, port))
}

fn filter_scheme(scheme: &str, registry: &SchemeRegistry) -> Result<String> {
    let scheme = scheme.to_ascii_lowercase();
    let scheme = scheme.strip_suffix("://").unwrap_or(&scheme);

    if !registry.is_allowed(scheme) {
        return Err(Error::UnsupportedScheme(scheme.to_string()));
    }
    Ok(scheme.to_string())
}

fn filter_port(port: u32) -> Result<u16> {
    if (1..=u32::from(u16::MAX)).contains(&port) {
        Ok(port as u16)
    } else {
        Err(Error::InvalidPort(format!(
            "{} must be within 1-65535",
            port
        )))
    }
}

fn filter_port_str(port: &str) -> Result<u16> {
    let value = port
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidPort(format!("{:?} is not an integer", port)))?;
    filter_port(value)
}

/// Accept any query a lenient `key=value&...` splitter understands
///
/// A pair is only refused when it has a value but no key (`=v`).
fn filter_query(query: &str) -> Result<String> {
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() && !value.is_empty() {
            return Err(Error::InvalidQuery(format!(
                "{:?} is not a sequence of key=value pairs",
                query
            )));
        }
    }
    Ok(query.to_string())
}
