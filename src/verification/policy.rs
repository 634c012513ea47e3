//! Verification policies and the policy registry
//!
//! A policy is a named set of verification requirements: required covered
//! components, freshness window, nonce/digest enforcement, and an ordered
//! list of custom rules. Policies are looked up by name at verify time;
//! lookup failure is a configuration error, never a silent fallback.

use crate::components::SignatureComponent;
use crate::message::SignableRequest;
use crate::verification::parse::ExtractedSignature;
use crate::verification::types::{VerificationError, VerificationResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A policy-supplied predicate evaluated during verification
///
/// Rules are independent: each is evaluated on its own and all must pass for
/// the report's `custom_rules_valid` check.
pub trait VerificationRule: Send + Sync {
    /// Rule name for diagnostics
    fn name(&self) -> &str;

    /// Evaluate the rule against the received message and extracted signature
    fn evaluate(&self, request: &SignableRequest, signature: &ExtractedSignature) -> bool;
}

/// Requires a header to be present on the message
pub struct HeaderPresenceRule {
    header: String,
    name: String,
}

impl HeaderPresenceRule {
    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_lowercase(),
            name: format!("header-present:{}", header.to_lowercase()),
        }
    }
}

impl VerificationRule for HeaderPresenceRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, request: &SignableRequest, _signature: &ExtractedSignature) -> bool {
        request.headers().contains(&self.header)
    }
}

/// Requires a `content-type` header whenever the message carries a body
pub struct ContentTypeConsistencyRule;

impl VerificationRule for ContentTypeConsistencyRule {
    fn name(&self) -> &str {
        "content-type-consistency"
    }

    fn evaluate(&self, request: &SignableRequest, _signature: &ExtractedSignature) -> bool {
        request.body().is_none() || request.headers().contains("content-type")
    }
}

/// A named verification policy
#[derive(Clone)]
pub struct VerificationPolicy {
    /// Policy name
    pub name: String,
    /// Policy description
    pub description: String,
    /// Whether to verify timestamp freshness
    pub verify_timestamp: bool,
    /// Maximum allowed signature age in seconds (also bounds future skew)
    pub max_timestamp_age: Option<u64>,
    /// Whether to require and validate the nonce
    pub verify_nonce: bool,
    /// Whether to verify the content digest against the body
    pub verify_content_digest: bool,
    /// Components the signature must cover
    pub required_components: Vec<SignatureComponent>,
    /// Custom rules evaluated in order
    pub custom_rules: Vec<Arc<dyn VerificationRule>>,
}

impl fmt::Debug for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationPolicy")
            .field("name", &self.name)
            .field("verify_timestamp", &self.verify_timestamp)
            .field("max_timestamp_age", &self.max_timestamp_age)
            .field("verify_nonce", &self.verify_nonce)
            .field("verify_content_digest", &self.verify_content_digest)
            .field("required_components", &self.required_components)
            .field(
                "custom_rules",
                &self.custom_rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl VerificationPolicy {
    /// Production policy: one-minute window, full coverage requirements
    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            description: "Strict verification for production use".to_string(),
            verify_timestamp: true,
            max_timestamp_age: Some(60),
            verify_nonce: true,
            verify_content_digest: true,
            required_components: vec![
                SignatureComponent::Method,
                SignatureComponent::TargetUri,
                SignatureComponent::Authority,
                SignatureComponent::header("content-digest"),
            ],
            custom_rules: vec![Arc::new(ContentTypeConsistencyRule)],
        }
    }

    /// Default policy: five-minute window, method and target coverage
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            description: "Standard verification policy".to_string(),
            verify_timestamp: true,
            max_timestamp_age: Some(300),
            verify_nonce: true,
            verify_content_digest: true,
            required_components: vec![SignatureComponent::Method, SignatureComponent::TargetUri],
            custom_rules: Vec::new(),
        }
    }

    /// Relaxed policy for testing: one-hour window, no nonce or digest checks
    pub fn lenient() -> Self {
        Self {
            name: "lenient".to_string(),
            description: "Lenient verification policy for testing".to_string(),
            verify_timestamp: true,
            max_timestamp_age: Some(3600),
            verify_nonce: false,
            verify_content_digest: false,
            required_components: vec![SignatureComponent::Method],
            custom_rules: Vec::new(),
        }
    }

    /// Compatibility policy: cryptographic check only
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            description: "Legacy compatibility policy, signature check only".to_string(),
            verify_timestamp: false,
            max_timestamp_age: None,
            verify_nonce: false,
            verify_content_digest: false,
            required_components: Vec::new(),
            custom_rules: Vec::new(),
        }
    }
}

/// Registry of named verification policies
///
/// Registration is additive: an existing name (built-in or custom) is never
/// overwritten. Insertion is thread-safe so policies can be registered while
/// verifications are in flight.
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Arc<VerificationPolicy>>>,
}

impl PolicyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with `strict`, `standard`, `lenient`, `legacy`
    pub fn with_built_ins() -> Self {
        let registry = Self::new();
        for policy in [
            VerificationPolicy::strict(),
            VerificationPolicy::standard(),
            VerificationPolicy::lenient(),
            VerificationPolicy::legacy(),
        ] {
            // Fresh registry, names cannot collide
            let _ = registry.register(policy);
        }
        registry
    }

    /// Register a policy under its own name
    pub fn register(&self, policy: VerificationPolicy) -> VerificationResult<()> {
        let mut policies = self
            .policies
            .write()
            .map_err(|_| VerificationError::Internal("policy registry lock poisoned".to_string()))?;
        if policies.contains_key(&policy.name) {
            return Err(VerificationError::PolicyExists(policy.name));
        }
        policies.insert(policy.name.clone(), Arc::new(policy));
        Ok(())
    }

    /// Look up a policy by name
    pub fn get(&self, name: &str) -> Option<Arc<VerificationPolicy>> {
        self.policies.read().ok()?.get(name).cloned()
    }

    /// Whether a policy name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.policies
            .read()
            .map(|p| p.contains_key(name))
            .unwrap_or(false)
    }

    /// Names of all registered policies
    pub fn names(&self) -> Vec<String> {
        self.policies
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_built_ins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_policies_present() {
        let registry = PolicyRegistry::with_built_ins();
        for name in ["strict", "standard", "lenient", "legacy"] {
            assert!(registry.contains(name), "missing built-in {}", name);
        }
    }

    #[test]
    fn test_built_in_freshness_windows() {
        assert_eq!(VerificationPolicy::strict().max_timestamp_age, Some(60));
        assert_eq!(VerificationPolicy::standard().max_timestamp_age, Some(300));
        assert_eq!(VerificationPolicy::lenient().max_timestamp_age, Some(3600));
        assert_eq!(VerificationPolicy::legacy().max_timestamp_age, None);
    }

    #[test]
    fn test_registration_is_additive() {
        let registry = PolicyRegistry::with_built_ins();

        let mut custom = VerificationPolicy::standard();
        custom.name = "internal-api".to_string();
        registry.register(custom).expect("new name registers");
        assert!(registry.contains("internal-api"));

        // Built-ins cannot be overwritten
        let result = registry.register(VerificationPolicy::strict());
        assert!(matches!(result, Err(VerificationError::PolicyExists(_))));

        // Neither can custom policies
        let mut again = VerificationPolicy::lenient();
        again.name = "internal-api".to_string();
        assert!(registry.register(again).is_err());
    }

    #[test]
    fn test_content_type_consistency_rule() {
        use crate::verification::parse::extract_signature;
        use base64::{engine::general_purpose, Engine as _};

        let mut headers = crate::message::Headers::new();
        headers.insert(
            "signature-input",
            "sig1=(\"@method\");created=1;keyid=\"k\";alg=\"ed25519\";nonce=\"n\"",
        );
        headers.insert(
            "signature",
            &format!("sig1=:{}:", general_purpose::STANDARD.encode([0u8; 64])),
        );
        let signature = extract_signature(&headers).unwrap();

        let rule = ContentTypeConsistencyRule;

        let bodyless = SignableRequest::new("GET", "https://example.com/").unwrap();
        assert!(rule.evaluate(&bodyless, &signature));

        let untyped = SignableRequest::new("POST", "https://example.com/")
            .unwrap()
            .with_body(b"{}".to_vec());
        assert!(!rule.evaluate(&untyped, &signature));

        let typed = untyped.with_header("content-type", "application/json");
        assert!(rule.evaluate(&typed, &signature));
    }
}
