//! Core verification types and errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Hard verification errors
///
/// These abort a verification call outright. Everything else is reported
/// inside a [`VerificationReport`] so partial diagnostics stay available.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Unknown verification policy: {0}")]
    UnknownPolicy(String),

    #[error("Policy already registered: {0}")]
    PolicyExists(String),

    #[error("Invalid public key for '{key_id}': {message}")]
    InvalidKey { key_id: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for verification operations
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Overall outcome of a verification call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// Every check passed and the signature is cryptographically valid
    Valid,
    /// One or more checks failed
    Invalid,
    /// The signature is outside its freshness window
    Expired,
    /// The nonce was seen before
    Replayed,
    /// The signature headers could not be parsed or reconstructed
    Malformed,
    /// An unrecoverable condition such as an unknown key id
    Error,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::Invalid => write!(f, "INVALID"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Replayed => write!(f, "REPLAYED"),
            Self::Malformed => write!(f, "MALFORMED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Individual verification checks, always fully populated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationChecks {
    /// Signature headers parse as RFC 9421 structured fields
    pub format_valid: bool,
    /// `created` (and `expires`) within the policy freshness window
    pub timestamp_valid: bool,
    /// Nonce well-formed and not previously seen
    pub nonce_valid: bool,
    /// Declared content digest matches the received body
    pub content_digest_valid: bool,
    /// Every policy-required component appears in the covered list
    pub component_coverage_valid: bool,
    /// All policy custom rules passed
    pub custom_rules_valid: bool,
}

impl VerificationChecks {
    /// Whether every check passed
    pub fn all_passed(&self) -> bool {
        self.format_valid
            && self.timestamp_valid
            && self.nonce_valid
            && self.content_digest_valid
            && self.component_coverage_valid
            && self.custom_rules_valid
    }
}

/// Structured error attached to a failed report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationErrorInfo {
    /// Stable machine-readable code, e.g. `UNKNOWN_KEY`
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl VerificationErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Timing breakdown for a verification call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total verification time in milliseconds
    pub total_time_ms: u64,
    /// Per-step timings in milliseconds
    pub step_timings: HashMap<String, u64>,
}

/// Complete result of verifying one message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Overall status
    pub status: VerificationStatus,
    /// Whether the signature cryptographically covers the message as
    /// received (Ed25519 check passed and any covered content digest
    /// matches the actual body)
    pub signature_valid: bool,
    /// Individual check results
    pub checks: VerificationChecks,
    /// Timing breakdown
    pub performance: PerformanceMetrics,
    /// Error details when the status is not `Valid`
    pub error: Option<VerificationErrorInfo>,
}
