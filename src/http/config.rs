//! Configuration
//!
//! This module holds the knobs that are not part of any single message:
//! which URI schemes are accepted and how environment marshaling treats
//! proxy signals.

use super::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};

/// Allow-list of URI schemes with their registered default ports
///
/// A [`Uri`](super::Uri) rejects schemes that are not listed here, and omits
/// its port from the authority when it equals the scheme's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRegistry {
    schemes: IndexMap<String, Option<u16>>,
}

impl SchemeRegistry {
    /// Registry accepting no scheme at all, not even the empty one
    pub fn empty() -> Self {
        SchemeRegistry {
            schemes: IndexMap::new(),
        }
    }

    /// Shared instance of the default registry
    pub fn shared_default() -> Arc<SchemeRegistry> {
        static DEFAULT: OnceLock<Arc<SchemeRegistry>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| Arc::new(SchemeRegistry::default()))
            .clone()
    }

    /// Add a scheme (lower-cased) with its default port
    pub fn with_scheme(mut self, scheme: &str, default_port: Option<u16>) -> Self {
        self.schemes.insert(scheme.to_ascii_lowercase(), default_port);
        self
    }

    /// Check whether a lower-cased scheme is accepted
    pub fn is_allowed(&self, scheme: &str) -> bool {
        self.schemes.contains_key(scheme)
    }

    /// Registered default port of a scheme
    pub fn default_port(&self, scheme: &str) -> Option<u16> {
        self.schemes.get(scheme).copied().flatten()
    }

    /// Iterate over accepted schemes
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }
}

impl Default for SchemeRegistry {
    /// `""`, `http` (80) and `https` (443)
    fn default() -> Self {
        SchemeRegistry::empty()
            .with_scheme("", None)
            .with_scheme("http", Some(DEFAULT_HTTP_PORT))
            .with_scheme("https", Some(DEFAULT_HTTPS_PORT))
    }
}

/// Environment marshaling options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalConfig {
    /// Treat `X-Forwarded-Proto: https` as a secure request
    pub trust_forwarded_proto: bool,

    /// Port assumed by the IPv6 host repair when the server reports none
    pub ipv6_default_port: u16,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        MarshalConfig {
            trust_forwarded_proto: true,
            ipv6_default_port: DEFAULT_HTTP_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = SchemeRegistry::default();
        assert!(registry.is_allowed(""));
        assert!(registry.is_allowed("http"));
        assert!(registry.is_allowed("https"));
        assert!(!registry.is_allowed("ftp"));
        assert_eq!(registry.default_port("http"), Some(80));
        assert_eq!(registry.default_port("https"), Some(443));
        assert_eq!(registry.default_port(""), None);
        assert_eq!(registry.default_port("gopher"), None);
    }

    #[test]
    fn test_custom_registry() {
        let registry = SchemeRegistry::default()
            .with_scheme("WS", Some(80))
            .with_scheme("file", None);
        assert!(registry.is_allowed("ws"));
        assert!(registry.is_allowed("file"));
        assert_eq!(registry.schemes().count(), 5);
    }

    #[test]
    fn test_shared_default_is_shared() {
        let a = SchemeRegistry::shared_default();
        let b = SchemeRegistry::shared_default();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, SchemeRegistry::default());
    }

    #[test]
    fn test_marshal_config_default() {
        let config = MarshalConfig::default();
        assert!(config.trust_forwarded_proto);
        assert_eq!(config.ipv6_default_port, 80);
    }
}
