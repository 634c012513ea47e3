//! Signable HTTP message representation
//!
//! Signing and verification both operate on an immutable snapshot of a
//! request: method, URL, headers, and optional body bytes. Header names are
//! case-insensitive for lookup but the insertion order is preserved so that
//! canonical serialization is deterministic.

use std::fmt;
use url::Url;

/// Errors that can occur constructing a signable message
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
}

/// Ordered, case-insensitive header collection
///
/// Names are normalized to lowercase on insertion. Re-inserting an existing
/// name replaces the value in place, keeping the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Look up a header value by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a header, returning its value if present
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        let pos = self.entries.iter().position(|(n, _)| *n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// An HTTP request snapshot suitable for signing or verification
///
/// Constructed once, then treated as immutable by the signer and verifier.
/// The signer never mutates the request it signs; new header values ride in
/// the returned [`SignatureResult`](crate::signer::SignatureResult) and the
/// caller decides whether to merge them with [`SignableRequest::merge_headers`].
#[derive(Debug, Clone)]
pub struct SignableRequest {
    method: String,
    url: Url,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl SignableRequest {
    /// Create a new signable request from a method and an absolute URL
    pub fn new(method: &str, url: &str) -> Result<Self, MessageError> {
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MessageError::InvalidMethod(method.to_string()));
        }
        let url = Url::parse(url).map_err(|e| MessageError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self {
            method: method.to_uppercase(),
            url,
            headers: Headers::new(),
            body: None,
        })
    }

    /// Attach a header, replacing any existing value for the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// HTTP method, uppercased
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Header collection
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Single header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body bytes, if any
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Merge a set of headers into this request (e.g. a signing result)
    pub fn merge_headers<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, value) in pairs {
            self.headers.insert(name, value);
        }
    }
}

impl fmt::Display for SignableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
