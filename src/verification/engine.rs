//! Core verification engine
//!
//! A verification call walks a fixed sequence of checks (format, canonical
//! reconstruction, coverage, timestamp, nonce, content digest, custom rules,
//! cryptographic check) and always returns a fully populated
//! [`VerificationReport`]. Hard errors are reserved for configuration
//! problems such as an unknown policy name.

use crate::canonical::build_canonical_message;
use crate::digest::DigestAlgorithm;
use crate::keys::{PublicKey, PUBLIC_KEY_LENGTH};
use crate::message::SignableRequest;
use crate::verification::parse::{extract_signature, ExtractedSignature, ParseError};
use crate::verification::policy::{PolicyRegistry, VerificationPolicy};
use crate::verification::replay::NonceStore;
use crate::verification::types::*;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Configuration for a verifier
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Policy applied when a verify call names none
    pub default_policy: String,
    /// Trusted key material, key id to raw Ed25519 public key bytes
    pub public_keys: HashMap<String, Vec<u8>>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            default_policy: "standard".to_string(),
            public_keys: HashMap::new(),
        }
    }
}

/// RFC 9421 signature verifier
///
/// The key map is read-mostly and guarded by a `RwLock`, so keys can be added
/// or removed concurrently with in-flight verifications.
pub struct Verifier {
    default_policy: String,
    keys: RwLock<HashMap<String, PublicKey>>,
    registry: Arc<PolicyRegistry>,
    nonce_store: Option<Arc<dyn NonceStore>>,
}

impl Verifier {
    /// Build a verifier from a configuration and a policy registry
    pub fn new(
        config: VerificationConfig,
        registry: Arc<PolicyRegistry>,
    ) -> VerificationResult<Self> {
        if !registry.contains(&config.default_policy) {
            return Err(VerificationError::UnknownPolicy(config.default_policy));
        }

        let mut keys = HashMap::with_capacity(config.public_keys.len());
        for (key_id, bytes) in &config.public_keys {
            let key = PublicKey::from_bytes(bytes).map_err(|e| VerificationError::InvalidKey {
                key_id: key_id.clone(),
                message: e.to_string(),
            })?;
            keys.insert(key_id.clone(), key);
        }

        Ok(Self {
            default_policy: config.default_policy,
            keys: RwLock::new(keys),
            registry,
            nonce_store: None,
        })
    }

    /// Attach a replay store; without one, nonce checking degrades to
    /// format-only validation
    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonce_store = Some(store);
        self
    }

    /// Add a trusted public key, safe to call during in-flight verifications
    pub fn add_public_key(&self, key_id: &str, bytes: &[u8]) -> VerificationResult<()> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(VerificationError::InvalidKey {
                key_id: key_id.to_string(),
                message: format!(
                    "expected {} bytes, got {}",
                    PUBLIC_KEY_LENGTH,
                    bytes.len()
                ),
            });
        }
        let key = PublicKey::from_bytes(bytes).map_err(|e| VerificationError::InvalidKey {
            key_id: key_id.to_string(),
            message: e.to_string(),
        })?;
        self.keys
            .write()
            .map_err(|_| VerificationError::Internal("key map lock poisoned".to_string()))?
            .insert(key_id.to_string(), key);
        Ok(())
    }

    /// Remove a trusted key, returning whether it was present
    pub fn remove_public_key(&self, key_id: &str) -> bool {
        self.keys
            .write()
            .map(|mut keys| keys.remove(key_id).is_some())
            .unwrap_or(false)
    }

    /// Verify a received request under a named policy (or the default)
    ///
    /// The request's headers must include `signature-input` and `signature`
    /// exactly as received. All checks are computed before the status is
    /// derived, so the check map is always complete.
    pub fn verify_request(
        &self,
        request: &SignableRequest,
        policy_name: Option<&str>,
    ) -> VerificationResult<VerificationReport> {
        let start = Instant::now();
        let mut step_timings = HashMap::new();

        let name = policy_name.unwrap_or(&self.default_policy);
        let policy = self
            .registry
            .get(name)
            .ok_or_else(|| VerificationError::UnknownPolicy(name.to_string()))?;

        let step = Instant::now();
        let extracted = match extract_signature(request.headers()) {
            Ok(extracted) => extracted,
            Err(error) => {
                return Ok(self.malformed_report(&policy, error, start));
            }
        };
        step_timings.insert("parse".to_string(), step.elapsed().as_millis() as u64);

        self.run_checks(request, &policy, &extracted, start, step_timings)
    }

    fn run_checks(
        &self,
        request: &SignableRequest,
        policy: &VerificationPolicy,
        extracted: &ExtractedSignature,
        start: Instant,
        mut step_timings: HashMap<String, u64>,
    ) -> VerificationResult<VerificationReport> {
        let now = Utc::now().timestamp();

        // 1. Format: parsed already, plus required parameter sanity
        let step = Instant::now();
        let format_valid = extracted.algorithm.as_deref() == Some("ed25519")
            && extracted.key_id.as_deref().map_or(false, |k| !k.is_empty());
        step_timings.insert("format".to_string(), step.elapsed().as_millis() as u64);

        // 2. Canonical reconstruction from the declared covered components,
        // reusing the raw params substring for byte-identity
        let step = Instant::now();
        let canonical = build_canonical_message(
            request,
            &extracted.covered_components,
            &extracted.raw_params,
        );
        let canonical_ok = canonical.is_ok();
        step_timings.insert("canonical".to_string(), step.elapsed().as_millis() as u64);

        // 3. Required component coverage
        let step = Instant::now();
        let component_coverage_valid = policy
            .required_components
            .iter()
            .all(|required| extracted.covered_components.contains(required));
        step_timings.insert("coverage".to_string(), step.elapsed().as_millis() as u64);

        // 4. Timestamp freshness, both past age and future skew
        let step = Instant::now();
        let timestamp_valid = if policy.verify_timestamp {
            match extracted.created {
                Some(created) => {
                    let within_window = match policy.max_timestamp_age {
                        Some(max_age) => (now - created).unsigned_abs() <= max_age,
                        None => true,
                    };
                    let not_expired = extracted.expires.map_or(true, |expires| now <= expires);
                    within_window && not_expired
                }
                None => false,
            }
        } else {
            true
        };
        step_timings.insert("timestamp".to_string(), step.elapsed().as_millis() as u64);

        // 5. Nonce format; the replay store is consulted last, after every
        // other check has passed
        let step = Instant::now();
        let nonce_format_valid = if policy.verify_nonce {
            extracted.nonce.as_deref().map_or(false, |n| !n.is_empty())
        } else {
            true
        };
        step_timings.insert("nonce".to_string(), step.elapsed().as_millis() as u64);

        // 6. Content digest against the received body
        let step = Instant::now();
        let content_digest_valid = if policy.verify_content_digest {
            match request.body() {
                Some(body) => match &extracted.content_digest {
                    Some((algorithm, declared)) => match algorithm.parse::<DigestAlgorithm>() {
                        Ok(algorithm) => {
                            let recomputed =
                                general_purpose::STANDARD.encode(algorithm.digest(body));
                            recomputed == *declared
                        }
                        Err(_) => false,
                    },
                    None => false,
                },
                None => true,
            }
        } else {
            true
        };
        step_timings.insert(
            "content_digest".to_string(),
            step.elapsed().as_millis() as u64,
        );

        // 7. Custom rules, each evaluated independently
        let step = Instant::now();
        let custom_rules_valid = policy
            .custom_rules
            .iter()
            .all(|rule| rule.evaluate(request, extracted));
        step_timings.insert("custom_rules".to_string(), step.elapsed().as_millis() as u64);

        // 8. Cryptographic check with the key resolved from keyid
        let step = Instant::now();
        let mut unknown_key = false;
        let crypto_valid = match extracted.key_id.as_deref() {
            Some(key_id) => {
                let key = self
                    .keys
                    .read()
                    .ok()
                    .and_then(|keys| keys.get(key_id).cloned());
                match (key, &canonical) {
                    (Some(key), Ok(message)) => key
                        .verify(message.as_bytes(), &extracted.signature)
                        .is_ok(),
                    (None, _) => {
                        log::warn!("verification failed: unknown keyid '{}'", key_id);
                        unknown_key = true;
                        false
                    }
                    _ => false,
                }
            }
            None => false,
        };
        step_timings.insert("crypto".to_string(), step.elapsed().as_millis() as u64);

        // Replay: only a message that passed every other check is recorded,
        // so forged or stale messages can neither seed nor flush the store
        let step = Instant::now();
        let mut replayed = false;
        if policy.verify_nonce && nonce_format_valid {
            let otherwise_valid = format_valid
                && canonical_ok
                && timestamp_valid
                && content_digest_valid
                && component_coverage_valid
                && custom_rules_valid
                && crypto_valid;
            if otherwise_valid {
                if let (Some(store), Some(nonce)) =
                    (&self.nonce_store, extracted.nonce.as_deref())
                {
                    replayed = !store.observe(nonce, extracted.created.unwrap_or_default());
                }
            }
        }
        let nonce_valid = nonce_format_valid && !replayed;
        step_timings.insert("replay".to_string(), step.elapsed().as_millis() as u64);

        let checks = VerificationChecks {
            format_valid: format_valid && canonical_ok,
            timestamp_valid,
            nonce_valid,
            content_digest_valid,
            component_coverage_valid,
            custom_rules_valid,
        };

        let signature_valid = crypto_valid && content_digest_valid;

        let (status, error) = if unknown_key {
            (
                VerificationStatus::Error,
                Some(VerificationErrorInfo::new(
                    "UNKNOWN_KEY",
                    format!(
                        "no public key registered for keyid '{}'",
                        extracted.key_id.as_deref().unwrap_or("")
                    ),
                )),
            )
        } else if !checks.format_valid {
            let code = if canonical_ok {
                "INVALID_SIGNATURE_FORMAT"
            } else {
                "CANONICAL_RECONSTRUCTION_FAILED"
            };
            (
                VerificationStatus::Malformed,
                Some(VerificationErrorInfo::new(
                    code,
                    canonical
                        .as_ref()
                        .err()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "signature parameters failed validation".to_string()),
                )),
            )
        } else if !timestamp_valid {
            (
                VerificationStatus::Expired,
                Some(VerificationErrorInfo::new(
                    "SIGNATURE_EXPIRED",
                    "created timestamp outside the allowed freshness window",
                )),
            )
        } else if replayed {
            (
                VerificationStatus::Replayed,
                Some(VerificationErrorInfo::new(
                    "NONCE_REPLAYED",
                    "nonce was observed before",
                )),
            )
        } else if checks.all_passed() && signature_valid {
            (VerificationStatus::Valid, None)
        } else {
            (
                VerificationStatus::Invalid,
                Some(VerificationErrorInfo::new(
                    "VERIFICATION_FAILED",
                    if crypto_valid {
                        "one or more verification checks failed"
                    } else {
                        "cryptographic signature verification failed"
                    },
                )),
            )
        };

        log::debug!(
            "verified {} under policy '{}': {}",
            request,
            policy.name,
            status
        );

        Ok(VerificationReport {
            status,
            signature_valid,
            checks,
            performance: PerformanceMetrics {
                total_time_ms: start.elapsed().as_millis() as u64,
                step_timings,
            },
            error,
        })
    }

    /// Report for headers that did not parse at all; every check carries its
    /// best-known value given the active policy
    fn malformed_report(
        &self,
        policy: &VerificationPolicy,
        error: ParseError,
        start: Instant,
    ) -> VerificationReport {
        let checks = VerificationChecks {
            format_valid: false,
            timestamp_valid: !policy.verify_timestamp,
            nonce_valid: !policy.verify_nonce,
            content_digest_valid: !policy.verify_content_digest,
            component_coverage_valid: policy.required_components.is_empty(),
            custom_rules_valid: policy.custom_rules.is_empty(),
        };
        VerificationReport {
            status: VerificationStatus::Malformed,
            signature_valid: false,
            checks,
            performance: PerformanceMetrics {
                total_time_ms: start.elapsed().as_millis() as u64,
                step_timings: HashMap::new(),
            },
            error: Some(VerificationErrorInfo::new(
                "MALFORMED_SIGNATURE_HEADERS",
                error.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::signer::{RequestSigner, SigningConfig};

    fn signed_request(signer: &RequestSigner) -> SignableRequest {
        let mut request = SignableRequest::new("POST", "https://api.example.com/data/query")
            .unwrap()
            .with_header("content-type", "application/json")
            .with_body(b"{\"q\":1}".to_vec());
        let result = signer.sign_request(&request).unwrap();
        request.merge_headers(result.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));
        request
    }

    fn verifier_for(signer: &RequestSigner) -> Verifier {
        let mut config = VerificationConfig::default();
        config
            .public_keys
            .insert("test-key".to_string(), signer.public_key_bytes().to_vec());
        Verifier::new(config, Arc::new(PolicyRegistry::with_built_ins())).unwrap()
    }

    fn test_signer() -> RequestSigner {
        let keypair = KeyPair::generate();
        RequestSigner::new(SigningConfig::standard(
            "test-key",
            keypair.secret_key_bytes().to_vec(),
        ))
        .unwrap()
    }

    #[test]
    fn test_round_trip_valid() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);
        let request = signed_request(&signer);

        let report = verifier.verify_request(&request, None).unwrap();
        assert_eq!(report.status, VerificationStatus::Valid);
        assert!(report.signature_valid);
        assert!(report.checks.all_passed());
        assert!(report.error.is_none());
    }

    #[test]
    fn test_unknown_policy_is_hard_error() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);
        let request = signed_request(&signer);

        let result = verifier.verify_request(&request, Some("no-such-policy"));
        assert!(matches!(result, Err(VerificationError::UnknownPolicy(_))));
    }

    #[test]
    fn test_unknown_keyid_is_error_status() {
        let signer = test_signer();
        let verifier = Verifier::new(
            VerificationConfig::default(),
            Arc::new(PolicyRegistry::with_built_ins()),
        )
        .unwrap();
        let request = signed_request(&signer);

        let report = verifier.verify_request(&request, None).unwrap();
        assert_eq!(report.status, VerificationStatus::Error);
        assert!(!report.signature_valid);
        assert_eq!(report.error.unwrap().code, "UNKNOWN_KEY");
    }

    #[test]
    fn test_unsigned_request_is_malformed_with_populated_checks() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);
        let request = SignableRequest::new("GET", "https://api.example.com/").unwrap();

        let report = verifier.verify_request(&request, None).unwrap();
        assert_eq!(report.status, VerificationStatus::Malformed);
        assert!(!report.checks.format_valid);
        // standard policy verifies timestamp/nonce/digest, so best-known is false
        assert!(!report.checks.timestamp_valid);
        assert!(!report.checks.nonce_valid);
    }

    #[test]
    fn test_tampered_signature_invalid() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);
        let mut request = signed_request(&signer);

        let signature = request.header("signature").unwrap().to_string();
        let flipped = signature.replace("sig1=:A", "sig1=:B");
        let tampered = if flipped != signature {
            flipped
        } else {
            // Flip a byte deep inside the base64 body instead
            let mut chars: Vec<char> = signature.chars().collect();
            let mid = chars.len() / 2;
            chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
            chars.into_iter().collect()
        };
        request.merge_headers([("signature", tampered.as_str())]);

        let report = verifier.verify_request(&request, None).unwrap();
        assert!(!report.signature_valid);
        assert_ne!(report.status, VerificationStatus::Valid);
    }

    #[test]
    fn test_missing_required_component_fails_coverage() {
        let keypair = KeyPair::generate();
        let mut config = SigningConfig::standard("test-key", keypair.secret_key_bytes().to_vec());
        // Sign only @method, strict requires much more
        config.covered_components = vec![crate::components::SignatureComponent::Method];
        let signer = RequestSigner::new(config).unwrap();

        let verifier = verifier_for(&signer);
        let request = signed_request(&signer);

        let report = verifier.verify_request(&request, Some("strict")).unwrap();
        assert!(!report.checks.component_coverage_valid);
        assert_eq!(report.status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_expired_signature() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);

        let mut request = SignableRequest::new("POST", "https://api.example.com/data/query")
            .unwrap()
            .with_header("content-type", "application/json")
            .with_body(b"{}".to_vec());
        let stale = Utc::now().timestamp() - 3600;
        let result = signer.sign_request_with(&request, stale, "nonce-x").unwrap();
        request.merge_headers(result.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));

        let report = verifier.verify_request(&request, Some("standard")).unwrap();
        assert_eq!(report.status, VerificationStatus::Expired);
        assert!(!report.checks.timestamp_valid);
        // The cryptographic signature itself still checks out
        assert!(report.signature_valid);
    }

    #[test]
    fn test_future_skew_rejected() {
        let signer = test_signer();
        let verifier = verifier_for(&signer);

        let mut request = SignableRequest::new("POST", "https://api.example.com/x")
            .unwrap()
            .with_body(b"{}".to_vec());
        let future = Utc::now().timestamp() + 3600;
        let result = signer.sign_request_with(&request, future, "n").unwrap();
        request.merge_headers(result.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));

        let report = verifier.verify_request(&request, Some("standard")).unwrap();
        assert_eq!(report.status, VerificationStatus::Expired);
    }

    #[test]
    fn test_replayed_nonce() {
        use crate::verification::replay::TimeWindowedNonceCache;

        let signer = test_signer();
        let mut config = VerificationConfig::default();
        config
            .public_keys
            .insert("test-key".to_string(), signer.public_key_bytes().to_vec());
        let verifier = Verifier::new(config, Arc::new(PolicyRegistry::with_built_ins()))
            .unwrap()
            .with_nonce_store(Arc::new(TimeWindowedNonceCache::new(600)));

        let request = signed_request(&signer);

        let first = verifier.verify_request(&request, None).unwrap();
        assert_eq!(first.status, VerificationStatus::Valid);

        let second = verifier.verify_request(&request, None).unwrap();
        assert_eq!(second.status, VerificationStatus::Replayed);
        assert!(!second.checks.nonce_valid);
    }

    #[test]
    fn test_forged_message_cannot_flush_replay_detection() {
        use crate::verification::replay::TimeWindowedNonceCache;

        let signer = test_signer();
        let mut config = VerificationConfig::default();
        config
            .public_keys
            .insert("test-key".to_string(), signer.public_key_bytes().to_vec());
        let verifier = Verifier::new(config, Arc::new(PolicyRegistry::with_built_ins()))
            .unwrap()
            .with_nonce_store(Arc::new(TimeWindowedNonceCache::new(600)));

        let genuine = signed_request(&signer);
        assert_eq!(
            verifier.verify_request(&genuine, None).unwrap().status,
            VerificationStatus::Valid
        );

        // Known keyid, far-future created, garbage signature bytes
        let future = Utc::now().timestamp() + 1_000_000;
        let forged_input = format!(
            "sig1=(\"@method\" \"@target-uri\" \"content-digest\");created={};keyid=\"test-key\";alg=\"ed25519\";nonce=\"attacker\"",
            future
        );
        let forged_sig = format!("sig1=:{}:", general_purpose::STANDARD.encode([0u8; 64]));
        let mut forged = genuine.clone();
        forged.merge_headers([
            ("signature-input", forged_input.as_str()),
            ("signature", forged_sig.as_str()),
        ]);
        assert_ne!(
            verifier.verify_request(&forged, None).unwrap().status,
            VerificationStatus::Valid
        );

        // A byte-for-byte replay of the genuine request is still caught
        let replay = verifier.verify_request(&genuine, None).unwrap();
        assert_eq!(replay.status, VerificationStatus::Replayed);
        assert!(!replay.checks.nonce_valid);
    }

    #[test]
    fn test_invalid_messages_do_not_claim_nonces() {
        use crate::verification::replay::TimeWindowedNonceCache;

        let signer = test_signer();
        let mut config = VerificationConfig::default();
        config
            .public_keys
            .insert("test-key".to_string(), signer.public_key_bytes().to_vec());
        let verifier = Verifier::new(config, Arc::new(PolicyRegistry::with_built_ins()))
            .unwrap()
            .with_nonce_store(Arc::new(TimeWindowedNonceCache::new(600)));

        let genuine = signed_request(&signer);

        // A tampered copy carrying the same nonce fails first...
        let mut tampered = genuine.clone();
        let forged_sig = format!("sig1=:{}:", general_purpose::STANDARD.encode([0u8; 64]));
        tampered.merge_headers([("signature", forged_sig.as_str())]);
        assert_ne!(
            verifier.verify_request(&tampered, None).unwrap().status,
            VerificationStatus::Valid
        );

        // ...without burning the nonce for the genuine message
        assert_eq!(
            verifier.verify_request(&genuine, None).unwrap().status,
            VerificationStatus::Valid
        );
    }

    #[test]
    fn test_runtime_key_management() {
        let signer = test_signer();
        let verifier = Verifier::new(
            VerificationConfig::default(),
            Arc::new(PolicyRegistry::with_built_ins()),
        )
        .unwrap();
        let request = signed_request(&signer);

        assert_eq!(
            verifier.verify_request(&request, None).unwrap().status,
            VerificationStatus::Error
        );

        verifier
            .add_public_key("test-key", &signer.public_key_bytes())
            .unwrap();
        assert_eq!(
            verifier.verify_request(&request, None).unwrap().status,
            VerificationStatus::Valid
        );

        assert!(verifier.remove_public_key("test-key"));
        assert!(!verifier.remove_public_key("test-key"));
    }

    #[test]
    fn test_invalid_key_rejected_on_add() {
        let verifier = Verifier::new(
            VerificationConfig::default(),
            Arc::new(PolicyRegistry::with_built_ins()),
        )
        .unwrap();
        assert!(matches!(
            verifier.add_public_key("short", &[0u8; 16]),
            Err(VerificationError::InvalidKey { .. })
        ));
    }
}
