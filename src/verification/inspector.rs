//! Signature inspection and debugging tools
//!
//! The inspector analyzes signature headers without any key material: it
//! parses what it can, flags structural issues, and estimates a security
//! posture from the parameters the signer chose. Nothing here proves a
//! signature valid.

use crate::components::SignatureComponent;
use crate::message::Headers;
use crate::verification::parse::extract_signature;
use crate::verification::types::VerificationReport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an inspection finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// One finding from inspecting a message's signature headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionIssue {
    pub severity: IssueSeverity,
    /// Stable machine-readable code, e.g. `MISSING_NONCE`
    pub code: String,
    pub message: String,
}

impl InspectionIssue {
    fn new(severity: IssueSeverity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Coarse estimate of how well a signature resists tampering and replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityPosture {
    Low,
    Medium,
    High,
}

impl fmt::Display for SecurityPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Result of inspecting a message's signature headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Whether the headers parsed as an RFC 9421 signature at all
    pub parseable: bool,
    /// Signature label, when parseable
    pub label: Option<String>,
    /// Declared algorithm
    pub algorithm: Option<String>,
    /// Declared key id
    pub key_id: Option<String>,
    /// Covered components, as declared
    pub covered_components: Vec<String>,
    /// Signature age in seconds relative to inspection time, when `created`
    /// is present
    pub age_seconds: Option<i64>,
    /// Findings, worst first
    pub issues: Vec<InspectionIssue>,
    /// Posture estimate; `Low` whenever the headers do not parse
    pub posture: SecurityPosture,
}

/// Analyzes signature headers without verifying them
pub struct SignatureInspector;

impl SignatureInspector {
    /// Inspect the signature headers of a received message
    pub fn inspect(headers: &Headers) -> InspectionReport {
        let extracted = match extract_signature(headers) {
            Ok(extracted) => extracted,
            Err(error) => {
                return InspectionReport {
                    parseable: false,
                    label: None,
                    algorithm: None,
                    key_id: None,
                    covered_components: Vec::new(),
                    age_seconds: None,
                    issues: vec![InspectionIssue::new(
                        IssueSeverity::Error,
                        "UNPARSEABLE_SIGNATURE",
                        error.to_string(),
                    )],
                    posture: SecurityPosture::Low,
                }
            }
        };

        let mut issues = Vec::new();

        if extracted.algorithm.as_deref() != Some("ed25519") {
            issues.push(InspectionIssue::new(
                IssueSeverity::Error,
                "UNSUPPORTED_ALGORITHM",
                format!(
                    "algorithm '{}' is not ed25519",
                    extracted.algorithm.as_deref().unwrap_or("<absent>")
                ),
            ));
        }
        if extracted.key_id.is_none() {
            issues.push(InspectionIssue::new(
                IssueSeverity::Error,
                "MISSING_KEYID",
                "no keyid parameter, the signature cannot be attributed",
            ));
        }

        let age_seconds = extracted.created.map(|created| Utc::now().timestamp() - created);
        match (extracted.created, age_seconds) {
            (None, _) => issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "MISSING_CREATED",
                "no created timestamp, freshness cannot be checked",
            )),
            (_, Some(age)) if age < 0 => issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "FUTURE_TIMESTAMP",
                format!("created is {}s in the future", -age),
            )),
            (_, Some(age)) if age > 3600 => issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "STALE_SIGNATURE",
                format!("signature is {}s old", age),
            )),
            _ => {}
        }

        if extracted.nonce.as_deref().map_or(true, str::is_empty) {
            issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "MISSING_NONCE",
                "no nonce, replay cannot be detected",
            ));
        }
        if extracted.expires.is_none() {
            issues.push(InspectionIssue::new(
                IssueSeverity::Info,
                "NO_EXPIRES",
                "signature never expires on its own",
            ));
        }

        let covers_digest = extracted
            .covered_components
            .iter()
            .any(|c| matches!(c, SignatureComponent::Header(name) if name == "content-digest"));
        if !covers_digest {
            issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "BODY_NOT_COVERED",
                "content-digest is not a covered component, the body is unprotected",
            ));
        } else if extracted.content_digest.is_none() && headers.contains("content-digest") {
            issues.push(InspectionIssue::new(
                IssueSeverity::Error,
                "MALFORMED_CONTENT_DIGEST",
                "content-digest header present but not parseable",
            ));
        }

        if extracted.covered_components.len() < 2 {
            issues.push(InspectionIssue::new(
                IssueSeverity::Warning,
                "THIN_COVERAGE",
                format!(
                    "only {} component(s) covered",
                    extracted.covered_components.len()
                ),
            ));
        }

        let posture = Self::estimate_posture(&issues);

        InspectionReport {
            parseable: true,
            label: Some(extracted.label.clone()),
            algorithm: extracted.algorithm.clone(),
            key_id: extracted.key_id.clone(),
            covered_components: extracted
                .covered_components
                .iter()
                .map(|c| c.to_string())
                .collect(),
            age_seconds,
            issues,
            posture,
        }
    }

    fn estimate_posture(issues: &[InspectionIssue]) -> SecurityPosture {
        let errors = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count();
        let warnings = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count();
        if errors > 0 {
            SecurityPosture::Low
        } else if warnings > 0 {
            SecurityPosture::Medium
        } else {
            SecurityPosture::High
        }
    }

    /// Render a verification report as human-readable text
    pub fn render_report(report: &VerificationReport) -> String {
        let mut out = String::new();

        out.push_str("=== Signature Verification Report ===\n");
        out.push_str(&format!("Status: {}\n", report.status));
        out.push_str(&format!("Signature Valid: {}\n", report.signature_valid));
        out.push_str(&format!(
            "Total Time: {}ms\n\n",
            report.performance.total_time_ms
        ));

        out.push_str("=== Individual Checks ===\n");
        out.push_str(&format!("Format Valid: {}\n", report.checks.format_valid));
        out.push_str(&format!(
            "Timestamp Valid: {}\n",
            report.checks.timestamp_valid
        ));
        out.push_str(&format!("Nonce Valid: {}\n", report.checks.nonce_valid));
        out.push_str(&format!(
            "Content Digest Valid: {}\n",
            report.checks.content_digest_valid
        ));
        out.push_str(&format!(
            "Component Coverage Valid: {}\n",
            report.checks.component_coverage_valid
        ));
        out.push_str(&format!(
            "Custom Rules Valid: {}\n",
            report.checks.custom_rules_valid
        ));

        if let Some(error) = &report.error {
            out.push_str("\n=== Error Details ===\n");
            out.push_str(&format!("Code: {}\n", error.code));
            out.push_str(&format!("Message: {}\n", error.message));
        }

        out
    }
}
