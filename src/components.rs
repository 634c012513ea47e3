//! RFC 9421 signature components
//!
//! A covered component is either a derived component computed from the
//! request line (`@method`, `@target-uri`, ...) or an ordinary header field
//! copied verbatim from the message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RFC 9421 signature components that can be covered by a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureComponent {
    /// @method derived component
    Method,
    /// @target-uri derived component
    TargetUri,
    /// @authority derived component
    Authority,
    /// @scheme derived component
    Scheme,
    /// @path derived component
    Path,
    /// @query derived component
    Query,
    /// HTTP header field, name normalized to lowercase
    Header(String),
}

impl SignatureComponent {
    /// Header-backed component with lowercase-normalized name
    pub fn header(name: &str) -> Self {
        Self::Header(name.to_lowercase())
    }

    /// Whether this is a derived (`@`-prefixed) component
    pub fn is_derived(&self) -> bool {
        !matches!(self, Self::Header(_))
    }
}

impl fmt::Display for SignatureComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => write!(f, "@method"),
            Self::TargetUri => write!(f, "@target-uri"),
            Self::Authority => write!(f, "@authority"),
            Self::Scheme => write!(f, "@scheme"),
            Self::Path => write!(f, "@path"),
            Self::Query => write!(f, "@query"),
            Self::Header(name) => write!(f, "{}", name),
        }
    }
}

/// Unknown derived component error
#[derive(Debug, thiserror::Error)]
#[error("Unsupported derived component: {0}")]
pub struct UnknownComponent(pub String);

impl FromStr for SignatureComponent {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "@method" => Ok(Self::Method),
            "@target-uri" => Ok(Self::TargetUri),
            "@authority" => Ok(Self::Authority),
            "@scheme" => Ok(Self::Scheme),
            "@path" => Ok(Self::Path),
            "@query" => Ok(Self::Query),
            // @signature-params is never itself a covered component
            other if other.starts_with('@') => Err(UnknownComponent(other.to_string())),
            name => Ok(Self::header(name)),
        }
    }
}
