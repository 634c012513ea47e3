//! Parsing of `signature-input` and `signature` headers
//!
//! Expected shapes:
//! `signature-input: sig1=("@method" "@target-uri");created=1618884473;keyid="k";alg="ed25519";nonce="n"`
//! `signature: sig1=:BASE64:`

use crate::components::SignatureComponent;
use crate::digest::parse_content_digest;
use crate::keys::SIGNATURE_LENGTH;
use crate::message::Headers;
use base64::{engine::general_purpose, Engine as _};

/// Errors from signature header parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing header: {0}")]
    MissingHeader(String),

    #[error("Malformed {header} header: {message}")]
    Malformed { header: String, message: String },

    #[error("Signature label mismatch: signature-input has '{input}', signature has '{signature}'")]
    LabelMismatch { input: String, signature: String },
}

/// Signature data extracted from a message's headers
#[derive(Debug, Clone)]
pub struct ExtractedSignature {
    /// Signature label, e.g. `sig1`
    pub label: String,
    /// Decoded raw signature bytes
    pub signature: [u8; SIGNATURE_LENGTH],
    /// Raw `@signature-params` value, exactly as received after the label.
    /// Reused verbatim when rebuilding the canonical message.
    pub raw_params: String,
    /// Covered components declared by the signer, in declared order
    pub covered_components: Vec<SignatureComponent>,
    /// `created` parameter
    pub created: Option<i64>,
    /// `keyid` parameter
    pub key_id: Option<String>,
    /// `alg` parameter
    pub algorithm: Option<String>,
    /// `nonce` parameter
    pub nonce: Option<String>,
    /// `expires` parameter
    pub expires: Option<i64>,
    /// Declared content digest, if a `content-digest` header is present
    pub content_digest: Option<(String, String)>,
}

fn malformed(header: &str, message: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        header: header.to_string(),
        message: message.into(),
    }
}

/// Split a `label=value` header into its label and value
fn split_label(header: &str, raw: &str) -> Result<(String, String), ParseError> {
    let (label, value) = raw
        .split_once('=')
        .ok_or_else(|| malformed(header, "missing '=' after signature label"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(malformed(header, "empty signature label"));
    }
    Ok((label.to_string(), value.to_string()))
}

/// Parse the parenthesized component list and trailing parameters of a
/// `signature-input` value
pub fn parse_signature_params(
    raw: &str,
) -> Result<(Vec<SignatureComponent>, Vec<(String, String)>), ParseError> {
    let header = "signature-input";

    let close = raw
        .rfind(')')
        .ok_or_else(|| malformed(header, "missing component list"))?;
    if !raw.starts_with('(') {
        return Err(malformed(header, "component list must start with '('"));
    }

    let mut components = Vec::new();
    for token in raw[1..close].split_whitespace() {
        let name = token.trim_matches('"');
        if name.is_empty() {
            return Err(malformed(header, "empty component name"));
        }
        let component = name
            .parse::<SignatureComponent>()
            .map_err(|e| malformed(header, e.to_string()))?;
        components.push(component);
    }

    let mut params = Vec::new();
    for section in raw[close + 1..].split(';') {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }
        let (key, value) = section
            .split_once('=')
            .ok_or_else(|| malformed(header, format!("malformed parameter '{}'", section)))?;
        params.push((
            key.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        ));
    }

    Ok((components, params))
}

/// Parse a `signature` header value into its label and decoded bytes
pub fn parse_signature_header(raw: &str) -> Result<(String, [u8; SIGNATURE_LENGTH]), ParseError> {
    let header = "signature";
    let (label, value) = split_label(header, raw)?;

    let b64 = value
        .strip_prefix(':')
        .and_then(|v| v.strip_suffix(':'))
        .ok_or_else(|| malformed(header, "signature value must be wrapped in colons"))?;

    let bytes = general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| malformed(header, format!("invalid base64: {}", e)))?;

    let signature: [u8; SIGNATURE_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        malformed(
            header,
            format!("expected {} signature bytes, got {}", SIGNATURE_LENGTH, bytes.len()),
        )
    })?;

    Ok((label, signature))
}

/// Extract and cross-check signature data from a message's headers
pub fn extract_signature(headers: &Headers) -> Result<ExtractedSignature, ParseError> {
    let signature_input = headers
        .get("signature-input")
        .ok_or_else(|| ParseError::MissingHeader("signature-input".to_string()))?;
    let signature_header = headers
        .get("signature")
        .ok_or_else(|| ParseError::MissingHeader("signature".to_string()))?;

    let (input_label, raw_params) = split_label("signature-input", signature_input)?;
    let (signature_label, signature) = parse_signature_header(signature_header)?;

    if input_label != signature_label {
        return Err(ParseError::LabelMismatch {
            input: input_label,
            signature: signature_label,
        });
    }

    let (covered_components, params) = parse_signature_params(&raw_params)?;

    let mut created = None;
    let mut key_id = None;
    let mut algorithm = None;
    let mut nonce = None;
    let mut expires = None;
    for (key, value) in &params {
        match key.as_str() {
            "created" => {
                created = Some(value.parse::<i64>().map_err(|_| {
                    malformed("signature-input", format!("invalid created '{}'", value))
                })?)
            }
            "expires" => {
                expires = Some(value.parse::<i64>().map_err(|_| {
                    malformed("signature-input", format!("invalid expires '{}'", value))
                })?)
            }
            "keyid" => key_id = Some(value.clone()),
            "alg" => algorithm = Some(value.clone()),
            "nonce" => nonce = Some(value.clone()),
            // Unknown parameters are preserved in raw_params and otherwise ignored
            _ => {}
        }
    }

    let content_digest = headers.get("content-digest").and_then(parse_content_digest);

    Ok(ExtractedSignature {
        label: input_label,
        signature,
        raw_params,
        covered_components,
        created,
        key_id,
        algorithm,
        nonce,
        expires,
        content_digest,
    })
}
