//! HTTP header collection
//!
//! This module provides [`HeaderBag`], a case-insensitive, case-preserving,
//! multi-valued header map. Mutators never touch the receiver: they return a
//! new bag, so a bag attached to a published message stays frozen.

use super::validate::{assert_valid_name, assert_valid_value};
use super::{Error, Result, CRLF};
use indexmap::IndexMap;
use std::fmt;

/// Conversion into a non-empty list of header values
///
/// Implemented for single strings and for lists of strings, mirroring the
/// two shapes a header value may be supplied in.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoHeaderValues for Vec<String> {
    fn into_header_values(self) -> Vec<String> {
        self
    }
}

impl IntoHeaderValues for Vec<&str> {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoHeaderValues for &[String] {
    fn into_header_values(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoHeaderValues for &[&str] {
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|v| v.to_string()).collect()
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|v| v.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    /// Name as first supplied, used for output
    name: String,
    values: Vec<String>,
}

/// HTTP header collection
///
/// Headers are keyed by their lower-cased name and support:
/// - Case-insensitive lookups with the original casing kept for output
/// - Multiple values per name, in the order they were added
/// - Iteration in insertion order of distinct names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    entries: IndexMap<String, HeaderEntry>,
}

impl HeaderBag {
    /// Create a new empty header bag
    pub fn new() -> Self {
        HeaderBag {
            entries: IndexMap::new(),
        }
    }

    /// Build a bag from `(name, values)` pairs
    ///
    /// Repeated names (in any casing) accumulate their values.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: IntoHeaderValues,
    {
        let mut bag = HeaderBag::new();
        for (name, values) in pairs {
            bag.append_mut(name.as_ref(), values)?;
        }
        Ok(bag)
    }

    /// Get all values for a header (case-insensitive)
    ///
    /// Returns an empty slice when the header is absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    /// Get the first value for a header (case-insensitive)
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    /// Get all values for a header joined with `,`
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(",")
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Original casing of a header name, if present
    pub fn original_name(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.name.as_str())
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(original name, values)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    /// Return a new bag with `name` replaced by `values`
    ///
    /// Either every value is valid and the new bag is returned, or an error
    /// is returned; the receiver is never modified.
    #[must_use = "set returns a new bag"]
    pub fn set(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let mut bag = self.clone();
        bag.insert_mut(name, values)?;
        Ok(bag)
    }

    /// Return a new bag with `values` appended to `name`
    #[must_use = "add returns a new bag"]
    pub fn add(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let mut bag = self.clone();
        bag.append_mut(name, values)?;
        Ok(bag)
    }

    /// Return a new bag without `name`; absent names are a no-op
    #[must_use = "remove returns a new bag"]
    pub fn remove(&self, name: &str) -> Self {
        let mut bag = self.clone();
        bag.remove_mut(name);
        bag
    }

    /// Replace a header in place. Only used while a bag is being built.
    pub(crate) fn insert_mut(&mut self, name: &str, values: impl IntoHeaderValues) -> Result<()> {
        let values = validated(name, values)?;
        let key = name.to_ascii_lowercase();
        self.entries.insert(
            key,
            HeaderEntry {
                name: name.to_string(),
                values,
            },
        );
        Ok(())
    }

    /// Append to a header in place. Only used while a bag is being built.
    pub(crate) fn append_mut(&mut self, name: &str, values: impl IntoHeaderValues) -> Result<()> {
        let values = validated(name, values)?;
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.values.extend(values),
            None => {
                self.entries.insert(
                    key,
                    HeaderEntry {
                        name: name.to_string(),
                        values,
                    },
                );
            }
        }
        Ok(())
    }

    /// Remove a header in place, keeping the order of the others
    pub(crate) fn remove_mut(&mut self, name: &str) -> bool {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .is_some()
    }

    /// Parse a header line into name and value
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].to_string();
            let value = line[colon_pos + 1..].trim_matches(|c: char| c == ' ' || c == '\t');

            if name.is_empty() {
                return Err(Error::InvalidHeaderName(name));
            }
            assert_valid_name(&name)?;

            Ok((name, value.to_string()))
        } else {
            Err(Error::UnexpectedPayload(format!(
                "No colon in header: {}",
                line
            )))
        }
    }
}

/// Validate a name and its values before any state is touched
fn validated(name: &str, values: impl IntoHeaderValues) -> Result<Vec<String>> {
    assert_valid_name(name)?;
    let values = values.into_header_values();
    if values.is_empty() {
        return Err(Error::InvalidHeaderValue(format!(
            "empty value list for {}",
            name
        )));
    }
    for value in &values {
        assert_valid_value(value)?;
    }
    Ok(values)
}

impl fmt::Display for HeaderBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in self.iter() {
            for value in values {
                write!(f, "{}: {}{}", name, value, CRLF)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let headers = HeaderBag::new()
            .set("Content-Type", "text/html")
            .unwrap()
            .set("Content-Length", "42")
            .unwrap();

        assert_eq!(headers.get("Content-Type"), ["text/html"]);
        assert_eq!(headers.first("Content-Length"), Some("42"));
        assert!(headers.get("Missing").is_empty());
        assert_eq!(headers.first("Missing"), None);
    }

    #[test]
    fn test_case_insensitive() {
        let headers = HeaderBag::new().set("Content-Type", "text/html").unwrap();

        assert_eq!(headers.get("content-type"), ["text/html"]);
        assert_eq!(headers.get("CONTENT-TYPE"), ["text/html"]);
        assert_eq!(headers.get("CoNtEnT-TyPe"), ["text/html"]);
        assert_eq!(headers.original_name("content-type"), Some("Content-Type"));
    }

    #[test]
    fn test_multiple_values() {
        let headers = HeaderBag::new()
            .add("Set-Cookie", "a=1")
            .unwrap()
            .add("set-cookie", ["b=2", "c=3"])
            .unwrap();

        assert_eq!(headers.get("Set-Cookie"), ["a=1", "b=2", "c=3"]);
        assert_eq!(headers.line("SET-COOKIE"), "a=1,b=2,c=3");
        assert_eq!(headers.original_name("set-cookie"), Some("Set-Cookie"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_set_replaces_all_values() {
        let headers = HeaderBag::new()
            .add("X-Custom", ["first", "second"])
            .unwrap()
            .set("x-custom", "third")
            .unwrap();

        assert_eq!(headers.get("X-Custom"), ["third"]);
        assert_eq!(headers.original_name("X-CUSTOM"), Some("x-custom"));
    }

    #[test]
    fn test_set_is_all_or_nothing() {
        let headers = HeaderBag::new().set("X-Keep", "old").unwrap();

        let result = headers.set("X-Keep", vec!["fine", "bad\nvalue"]);
        assert!(matches!(result, Err(Error::InvalidHeaderValue(_))));
        assert_eq!(headers.get("X-Keep"), ["old"]);

        let result = headers.add("X-Keep", vec!["fine", "bad\rvalue"]);
        assert!(result.is_err());
        assert_eq!(headers.get("X-Keep"), ["old"]);
    }

    #[test]
    fn test_invalid_name_and_empty_values() {
        let headers = HeaderBag::new();
        assert!(matches!(
            headers.set("Bad Name", "v"),
            Err(Error::InvalidHeaderName(_))
        ));
        assert!(matches!(
            headers.set("X-Empty", Vec::<String>::new()),
            Err(Error::InvalidHeaderValue(_))
        ));
    }

    #[test]
    fn test_remove() {
        let headers = HeaderBag::new()
            .set("X-Remove", "value1")
            .unwrap()
            .set("X-Keep", "value2")
            .unwrap();

        let removed = headers.remove("x-remove");
        assert!(!removed.contains("X-Remove"));
        assert_eq!(removed.get("X-Keep"), ["value2"]);
        assert!(headers.contains("X-Remove"));

        let same = removed.remove("X-Absent");
        assert_eq!(same, removed);
    }

    #[test]
    fn test_iter_keeps_insertion_order() {
        let headers =
            HeaderBag::from_pairs([("A", "1"), ("B", "2"), ("C", "3"), ("a", "4")]).unwrap();

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].0, "A");
        assert_eq!(collected[0].1, ["1", "4"]);
        assert_eq!(collected[1].0, "B");
        assert_eq!(collected[2].0, "C");
    }

    #[test]
    fn test_parse_header_line() {
        let (name, value) = HeaderBag::parse_header_line("Content-Type: text/html").unwrap();
        assert_eq!(name, "Content-Type");
        assert_eq!(value, "text/html");

        let (name, value) = HeaderBag::parse_header_line("X-Custom:  value  ").unwrap();
        assert_eq!(name, "X-Custom");
        assert_eq!(value, "value");

        assert!(HeaderBag::parse_header_line("Invalid").is_err());
        assert!(HeaderBag::parse_header_line(": value").is_err());
        assert!(HeaderBag::parse_header_line("Bad Name: value").is_err());
    }

    #[test]
    fn test_display() {
        let headers = HeaderBag::new()
            .add("Accept", ["a", "b"])
            .unwrap();
        assert_eq!(headers.to_string(), "Accept: a\r\nAccept: b\r\n");
    }
}
