//! RFC 9421 signature verification
//!
//! The verification side of the crate: header parsing, named policies with a
//! registry, a verifier producing complete check reports, nonce replay
//! detection, concurrent batch verification, and a keyless inspector for
//! debugging signature headers.

pub mod batch;
pub mod engine;
pub mod inspector;
pub mod parse;
pub mod policy;
pub mod replay;
pub mod types;

pub use batch::{BatchItem, BatchOutcome, BatchStats, BatchVerifier};
pub use engine::{VerificationConfig, Verifier};
pub use inspector::{
    InspectionIssue, InspectionReport, IssueSeverity, SecurityPosture, SignatureInspector,
};
pub use parse::{extract_signature, ExtractedSignature, ParseError};
pub use policy::{
    ContentTypeConsistencyRule, HeaderPresenceRule, PolicyRegistry, VerificationPolicy,
    VerificationRule,
};
pub use replay::{NonceStore, TimeWindowedNonceCache};
pub use types::{
    PerformanceMetrics, VerificationChecks, VerificationError, VerificationErrorInfo,
    VerificationReport, VerificationResult, VerificationStatus,
};
