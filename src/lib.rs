//! # foldsign
//!
//! RFC 9421 HTTP Message Signatures with Ed25519, plus an encrypted
//! cross-platform key backup format.
//!
//! The crate is split along the protocol's own seams:
//!
//! - [`message`]: the signable request snapshot and header collection
//! - [`components`]: derived and header-backed signature components
//! - [`canonical`]: deterministic canonical message construction
//! - [`digest`]: `content-digest` computation and parsing
//! - [`keys`]: Ed25519 key generation and raw signature operations
//! - [`signer`]: request signing with configurable component coverage
//! - [`verification`]: policies, the verifier, replay detection, batch
//!   verification, and a keyless signature inspector
//! - [`backup`]: passphrase-encrypted Ed25519 key export and import
//!
//! ## Signing and verifying
//!
//! ```no_run
//! use foldsign::{
//!     KeyPair, PolicyRegistry, RequestSigner, SignableRequest, SigningConfig,
//!     VerificationConfig, Verifier,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let keypair = KeyPair::generate();
//! let signer = RequestSigner::new(SigningConfig::standard(
//!     "client-key",
//!     keypair.secret_key_bytes().to_vec(),
//! ))?;
//!
//! let mut request = SignableRequest::new("POST", "https://api.example.com/query")?
//!     .with_header("content-type", "application/json")
//!     .with_body(b"{\"limit\":10}".to_vec());
//! let signed = signer.sign_request(&request)?;
//! request.merge_headers(signed.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));
//!
//! let mut config = VerificationConfig::default();
//! config
//!     .public_keys
//!     .insert("client-key".to_string(), signer.public_key_bytes().to_vec());
//! let verifier = Verifier::new(config, Arc::new(PolicyRegistry::with_built_ins()))?;
//!
//! let report = verifier.verify_request(&request, None)?;
//! assert!(report.signature_valid);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod canonical;
pub mod components;
pub mod digest;
pub mod keys;
pub mod message;
pub mod signer;
pub mod verification;

pub use backup::{BackupError, BackupMetadata, ExportOptions, KeyBackupManager};
pub use canonical::{build_canonical_message, CanonicalError, SignatureParams};
pub use components::SignatureComponent;
pub use digest::{content_digest, parse_content_digest, DigestAlgorithm};
pub use keys::{KeyError, KeyPair, PublicKey};
pub use message::{Headers, MessageError, SignableRequest};
pub use signer::{RequestSigner, SignatureResult, SigningConfig, SigningError, SIGNATURE_LABEL};
pub use verification::{
    BatchItem, BatchOutcome, BatchStats, BatchVerifier, NonceStore, PolicyRegistry,
    SignatureInspector, TimeWindowedNonceCache, VerificationConfig, VerificationPolicy,
    VerificationReport, VerificationStatus, Verifier,
};
