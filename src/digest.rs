//! Content digest calculation and rendering
//!
//! Digests are rendered in the `content-digest` header format from RFC 9530,
//! e.g. `sha-256=:qj7...=:`.

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Supported content digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Wire name used in the `content-digest` header
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha512 => "sha-512",
        }
    }

    /// Compute the raw digest over a body
    pub fn digest(&self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(body).to_vec(),
            Self::Sha512 => Sha512::digest(body).to_vec(),
        }
    }
}

impl Default for DigestAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Unsupported digest algorithm error
#[derive(Debug, thiserror::Error)]
#[error("Unsupported digest algorithm: {0}")]
pub struct UnsupportedDigest(pub String);

impl FromStr for DigestAlgorithm {
    type Err = UnsupportedDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha-256" => Ok(Self::Sha256),
            "sha-512" => Ok(Self::Sha512),
            other => Err(UnsupportedDigest(other.to_string())),
        }
    }
}

/// Render a `content-digest` header value for a body
pub fn content_digest(algorithm: DigestAlgorithm, body: &[u8]) -> String {
    let digest = algorithm.digest(body);
    format!(
        "{}=:{}:",
        algorithm.name(),
        general_purpose::STANDARD.encode(digest)
    )
}

/// Parse a `content-digest` header value into `(algorithm-name, base64-digest)`
///
/// Accepts the single-entry form `algo=:b64:`. Returns `None` for anything
/// that does not match the structured byte-sequence shape.
pub fn parse_content_digest(value: &str) -> Option<(String, String)> {
    let (algorithm, rest) = value.split_once("=:")?;
    let digest = rest.strip_suffix(':')?;
    if algorithm.is_empty() || digest.contains(':') {
        return None;
    }
    Some((algorithm.trim().to_string(), digest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest_rendering() {
        let body = br#"{"client_id":"test","public_key":"abc123"}"#;
        let rendered = content_digest(DigestAlgorithm::Sha256, body);

        assert!(rendered.starts_with("sha-256=:"));
        assert!(rendered.ends_with(':'));

        let expected = general_purpose::STANDARD.encode(Sha256::digest(body));
        assert_eq!(rendered, format!("sha-256=:{}:", expected));
    }

    #[test]
    fn test_digest_parse_round_trip() {
        let rendered = content_digest(DigestAlgorithm::Sha512, b"body");
        let (algorithm, digest) = parse_content_digest(&rendered).expect("parseable");

        assert_eq!(algorithm, "sha-512");
        assert_eq!(
            general_purpose::STANDARD.decode(digest).unwrap(),
            DigestAlgorithm::Sha512.digest(b"body")
        );
    }

    #[test]
    fn test_malformed_digest_rejected() {
        assert!(parse_content_digest("sha-256=abc").is_none());
        assert!(parse_content_digest("sha-256=:abc").is_none());
        assert!(parse_content_digest("=:abc:").is_none());
        assert!(parse_content_digest("sha-256=:a:b:").is_none());
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!("sha-256".parse::<DigestAlgorithm>().is_ok());
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}
