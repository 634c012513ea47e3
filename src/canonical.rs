//! Canonical message construction (RFC 9421 signature base)
//!
//! The canonical message is the exact byte sequence that is signed: one line
//! per covered component in the order given, followed by the
//! `"@signature-params"` line, joined with single newlines and no trailing
//! newline. Identical inputs always yield identical bytes; this is the
//! correctness anchor shared by the signer and the verifier.

use crate::components::SignatureComponent;
use crate::message::SignableRequest;
use std::fmt::Write as _;

/// Errors from canonical message construction
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("Missing covered header: {0}")]
    MissingHeader(String),

    #[error("Request URL has no authority")]
    MissingAuthority,

    #[error("Unsupported component: {0}")]
    UnsupportedComponent(String),
}

/// Signature parameters bound into the `@signature-params` line
///
/// Serialized in a fixed order (`created`, `keyid`, `alg`, `nonce`,
/// `expires`, `tag`) so that the same parameters always produce the same
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Unix timestamp at which the signature was created
    pub created: i64,
    /// Identifier of the signing key
    pub key_id: String,
    /// Signature algorithm tag
    pub algorithm: String,
    /// Single-use random value for replay protection
    pub nonce: String,
    /// Optional expiry as a Unix timestamp
    pub expires: Option<i64>,
    /// Optional application tag
    pub tag: Option<String>,
}

impl SignatureParams {
    /// Parameters for a fresh Ed25519 signature
    pub fn ed25519(created: i64, key_id: &str, nonce: &str) -> Self {
        Self {
            created,
            key_id: key_id.to_string(),
            algorithm: "ed25519".to_string(),
            nonce: nonce.to_string(),
            expires: None,
            tag: None,
        }
    }

    /// Set an expiry timestamp
    pub fn with_expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Serialize the covered-component list and parameters
    ///
    /// Produces the value of the `@signature-params` line, e.g.
    /// `("@method" "@target-uri");created=1618884473;keyid="k";alg="ed25519";nonce="n"`.
    pub fn serialize(&self, components: &[SignatureComponent]) -> String {
        let component_list = components
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(" ");

        let mut out = format!("({})", component_list);
        let _ = write!(out, ";created={}", self.created);
        let _ = write!(out, ";keyid=\"{}\"", self.key_id);
        let _ = write!(out, ";alg=\"{}\"", self.algorithm);
        let _ = write!(out, ";nonce=\"{}\"", self.nonce);
        if let Some(expires) = self.expires {
            let _ = write!(out, ";expires={}", expires);
        }
        if let Some(tag) = &self.tag {
            let _ = write!(out, ";tag=\"{}\"", tag);
        }
        out
    }
}

/// Resolve the canonical value of a single covered component
pub fn component_value(
    request: &SignableRequest,
    component: &SignatureComponent,
) -> Result<String, CanonicalError> {
    match component {
        SignatureComponent::Method => Ok(request.method().to_string()),
        SignatureComponent::TargetUri => Ok(request.url().as_str().to_string()),
        SignatureComponent::Authority => {
            let host = request
                .url()
                .host_str()
                .ok_or(CanonicalError::MissingAuthority)?;
            Ok(match request.url().port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        }
        SignatureComponent::Scheme => Ok(request.url().scheme().to_string()),
        SignatureComponent::Path => Ok(request.url().path().to_string()),
        SignatureComponent::Query => Ok(request.url().query().unwrap_or("").to_string()),
        SignatureComponent::Header(name) => request
            .header(name)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| CanonicalError::MissingHeader(name.clone())),
    }
}

/// Build the canonical message for a request
///
/// `serialized_params` is the exact `@signature-params` value: the signer
/// produces it with [`SignatureParams::serialize`], the verifier reuses the
/// raw substring from the received `signature-input` header so the rebuilt
/// message is byte-identical to the one that was signed.
pub fn build_canonical_message(
    request: &SignableRequest,
    components: &[SignatureComponent],
    serialized_params: &str,
) -> Result<String, CanonicalError> {
    let mut lines = Vec::with_capacity(components.len() + 1);
    for component in components {
        let value = component_value(request, component)?;
        lines.push(format!("\"{}\": {}", component, value));
    }
    lines.push(format!("\"@signature-params\": {}", serialized_params));
    Ok(lines.join("\n"))
}
