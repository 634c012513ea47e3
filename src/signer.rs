//! Request signing implementing RFC 9421 HTTP Message Signatures
//!
//! The signer validates its configuration once at construction, then signs
//! requests as a pure computation: the input request is never mutated and the
//! produced header values are returned to the caller for merging.

use crate::canonical::{build_canonical_message, CanonicalError, SignatureParams};
use crate::components::SignatureComponent;
use crate::digest::{content_digest, DigestAlgorithm};
use crate::keys::{KeyError, KeyPair, SECRET_KEY_LENGTH};
use crate::message::SignableRequest;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use uuid::Uuid;

/// Signature label used for emitted headers
pub const SIGNATURE_LABEL: &str = "sig1";

/// Errors that can occur during request signing
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Missing required header: {0}")]
    MissingRequiredHeader(String),

    #[error("Unsupported component: {0}")]
    UnsupportedComponent(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Canonical message construction failed: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Configuration for request signing
///
/// Constructed explicitly and validated once by [`RequestSigner::new`]; there
/// are no partially initialized intermediate states.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Key identifier advertised in the `keyid` parameter
    pub key_id: String,
    /// Raw Ed25519 secret key, must be exactly 32 bytes
    pub secret_key: Vec<u8>,
    /// Components covered by every signature, in serialization order
    pub covered_components: Vec<SignatureComponent>,
    /// Lifetime in seconds for the `expires` parameter, if any
    pub signature_ttl: Option<u64>,
    /// Headers that must be present on every signed request
    pub mandatory_headers: Vec<String>,
    /// Digest algorithm used for injected `content-digest` headers
    pub digest_algorithm: DigestAlgorithm,
}

impl SigningConfig {
    /// Standard profile: `@method`, `@target-uri` and `content-digest`
    pub fn standard(key_id: &str, secret_key: Vec<u8>) -> Self {
        Self {
            key_id: key_id.to_string(),
            secret_key,
            covered_components: vec![
                SignatureComponent::Method,
                SignatureComponent::TargetUri,
                SignatureComponent::header("content-digest"),
            ],
            signature_ttl: None,
            mandatory_headers: Vec::new(),
            digest_algorithm: DigestAlgorithm::Sha256,
        }
    }
}

/// Result of signing a single request
#[derive(Debug, Clone)]
pub struct SignatureResult {
    /// Full `signature-input` header value
    pub signature_input: String,
    /// Full `signature` header value (`sig1=:<base64>:`)
    pub signature: String,
    /// Every header to merge into the outgoing request, including an
    /// injected `content-digest` when applicable
    pub headers: Vec<(String, String)>,
    /// The exact canonical message that was signed, for audit and debugging
    pub canonical_message: String,
}

/// RFC 9421 request signer using Ed25519
pub struct RequestSigner {
    config: SigningConfig,
    keypair: KeyPair,
}

impl RequestSigner {
    /// Validate a signing configuration and build a signer
    pub fn new(config: SigningConfig) -> SigningResult<Self> {
        if config.key_id.is_empty() {
            return Err(SigningError::Configuration(
                "key_id must not be empty".to_string(),
            ));
        }
        if config.secret_key.len() != SECRET_KEY_LENGTH {
            return Err(SigningError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LENGTH,
                config.secret_key.len()
            )));
        }
        if config.covered_components.is_empty() {
            return Err(SigningError::Configuration(
                "at least one covered component is required".to_string(),
            ));
        }
        for component in &config.covered_components {
            if let SignatureComponent::Header(name) = component {
                if name == "@signature-params" || name == "signature" || name == "signature-input" {
                    return Err(SigningError::UnsupportedComponent(name.clone()));
                }
            }
        }

        let keypair = KeyPair::from_secret_bytes(&config.secret_key)
            .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self { config, keypair })
    }

    /// Sign a request with a fresh timestamp and nonce
    pub fn sign_request(&self, request: &SignableRequest) -> SigningResult<SignatureResult> {
        self.sign_request_with(
            request,
            Utc::now().timestamp(),
            &Uuid::new_v4().to_string(),
        )
    }

    /// Sign a request with an explicit `created` timestamp and nonce
    ///
    /// Identical inputs produce a byte-identical canonical message, which is
    /// what makes the signature independently reproducible.
    pub fn sign_request_with(
        &self,
        request: &SignableRequest,
        created: i64,
        nonce: &str,
    ) -> SigningResult<SignatureResult> {
        // Mandatory headers are checked before any work happens
        for header in &self.config.mandatory_headers {
            if !request.headers().contains(header) {
                return Err(SigningError::MissingRequiredHeader(header.clone()));
            }
        }

        let mut emitted_headers: Vec<(String, String)> = Vec::new();

        // A covered content-digest is always recomputed over the actual
        // body; a stale preexisting header is overridden, never signed.
        // Covering the digest on a bodyless request is a configuration
        // error, whether or not a header is already present.
        let digest_covered = self
            .config
            .covered_components
            .iter()
            .any(|c| matches!(c, SignatureComponent::Header(name) if name == "content-digest"));

        let mut effective = request.clone();
        if digest_covered {
            match request.body() {
                Some(body) => {
                    let digest = content_digest(self.config.digest_algorithm, body);
                    effective.merge_headers([("content-digest", digest.as_str())]);
                    emitted_headers.push(("content-digest".to_string(), digest));
                }
                None => {
                    return Err(SigningError::Configuration(
                        "content-digest is a covered component but the request has no body"
                            .to_string(),
                    ))
                }
            }
        }

        let mut params = SignatureParams::ed25519(created, &self.config.key_id, nonce);
        if let Some(ttl) = self.config.signature_ttl {
            params = params.with_expires(created + ttl as i64);
        }

        let serialized_params = params.serialize(&self.config.covered_components);
        let canonical_message = build_canonical_message(
            &effective,
            &self.config.covered_components,
            &serialized_params,
        )?;

        let signature_bytes = self.keypair.sign(canonical_message.as_bytes());
        let signature_b64 = general_purpose::STANDARD.encode(signature_bytes);

        let signature_input = format!("{}={}", SIGNATURE_LABEL, serialized_params);
        let signature = format!("{}=:{}:", SIGNATURE_LABEL, signature_b64);

        emitted_headers.push(("signature-input".to_string(), signature_input.clone()));
        emitted_headers.push(("signature".to_string(), signature.clone()));

        log::debug!(
            "signed {} covering {} components (keyid={})",
            request,
            self.config.covered_components.len(),
            self.config.key_id
        );

        Ok(SignatureResult {
            signature_input,
            signature,
            headers: emitted_headers,
            canonical_message,
        })
    }

    /// Key identifier this signer advertises
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Public key bytes matching the configured private key
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keypair.public_key_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SigningConfig {
        let keypair = KeyPair::generate();
        SigningConfig::standard("test-key", keypair.secret_key_bytes().to_vec())
    }

    fn test_request() -> SignableRequest {
        SignableRequest::new("POST", "https://api.example.com/data/mutate")
            .unwrap()
            .with_header("content-type", "application/json")
            .with_body(b"{\"op\":\"create\"}".to_vec())
    }

    #[test]
    fn test_signer_validates_key_length() {
        let config = SigningConfig::standard("test-key", vec![0u8; 16]);
        assert!(matches!(
            RequestSigner::new(config),
            Err(SigningError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_signer_rejects_empty_key_id() {
        let keypair = KeyPair::generate();
        let config = SigningConfig::standard("", keypair.secret_key_bytes().to_vec());
        assert!(matches!(
            RequestSigner::new(config),
            Err(SigningError::Configuration(_))
        ));
    }

    #[test]
    fn test_signer_rejects_signature_headers_as_components() {
        let keypair = KeyPair::generate();
        let mut config = SigningConfig::standard("k", keypair.secret_key_bytes().to_vec());
        config
            .covered_components
            .push(SignatureComponent::header("signature-input"));
        assert!(matches!(
            RequestSigner::new(config),
            Err(SigningError::UnsupportedComponent(_))
        ));
    }

    #[test]
    fn test_sign_request_emits_expected_headers() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let result = signer.sign_request(&test_request()).unwrap();

        assert!(result.signature_input.starts_with("sig1=(\"@method\" \"@target-uri\" \"content-digest\");created="));
        assert!(result.signature.starts_with("sig1=:"));
        assert!(result.signature.ends_with(':'));

        let names: Vec<&str> = result.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["content-digest", "signature-input", "signature"]);
    }

    #[test]
    fn test_signature_verifies_against_canonical_message() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let result = signer.sign_request(&test_request()).unwrap();

        let b64 = result
            .signature
            .strip_prefix("sig1=:")
            .and_then(|s| s.strip_suffix(':'))
            .unwrap();
        let bytes: [u8; 64] = general_purpose::STANDARD
            .decode(b64)
            .unwrap()
            .try_into()
            .unwrap();

        crate::keys::verify_signature(
            &signer.public_key_bytes(),
            result.canonical_message.as_bytes(),
            &bytes,
        )
        .expect("signature covers canonical message");
    }

    #[test]
    fn test_canonical_message_deterministic_for_fixed_params() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let request = test_request();

        let first = signer.sign_request_with(&request, 1618884473, "fixed-nonce").unwrap();
        let second = signer.sign_request_with(&request, 1618884473, "fixed-nonce").unwrap();

        assert_eq!(first.canonical_message, second.canonical_message);
        assert_eq!(first.signature, second.signature);
    }

    #[test]
    fn test_missing_mandatory_header() {
        let mut config = test_config();
        config.mandatory_headers = vec!["x-request-id".to_string()];
        let signer = RequestSigner::new(config).unwrap();

        let result = signer.sign_request(&test_request());
        assert!(matches!(result, Err(SigningError::MissingRequiredHeader(h)) if h == "x-request-id"));
    }

    #[test]
    fn test_covered_digest_without_body_is_configuration_error() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let request = SignableRequest::new("GET", "https://api.example.com/ping").unwrap();

        assert!(matches!(
            signer.sign_request(&request),
            Err(SigningError::Configuration(_))
        ));

        // A preexisting header does not rescue a bodyless request
        let with_header = SignableRequest::new("GET", "https://api.example.com/ping")
            .unwrap()
            .with_header("content-digest", "sha-256=:AAAA:");
        assert!(matches!(
            signer.sign_request(&with_header),
            Err(SigningError::Configuration(_))
        ));
    }

    #[test]
    fn test_stale_preexisting_digest_is_recomputed() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let request = test_request().with_header("content-digest", "sha-256=:c3RhbGU=:");

        let result = signer.sign_request(&request).unwrap();

        let expected = content_digest(DigestAlgorithm::Sha256, b"{\"op\":\"create\"}");
        let emitted = result
            .headers
            .iter()
            .find(|(n, _)| n == "content-digest")
            .map(|(_, v)| v.clone())
            .expect("recomputed digest emitted");
        assert_eq!(emitted, expected);

        // The canonical message binds the recomputed value, not the stale one
        assert!(result
            .canonical_message
            .contains(&format!("\"content-digest\": {}", expected)));
        assert!(!result.canonical_message.contains("c3RhbGU="));
    }

    #[test]
    fn test_original_request_not_mutated() {
        let signer = RequestSigner::new(test_config()).unwrap();
        let request = test_request();

        signer.sign_request(&request).unwrap();
        assert!(!request.headers().contains("signature"));
        assert!(!request.headers().contains("content-digest"));
    }

    #[test]
    fn test_ttl_produces_expires_parameter() {
        let mut config = test_config();
        config.signature_ttl = Some(300);
        let signer = RequestSigner::new(config).unwrap();

        let result = signer.sign_request_with(&test_request(), 1000, "n").unwrap();
        assert!(result.signature_input.contains(";expires=1300"));
    }
}
