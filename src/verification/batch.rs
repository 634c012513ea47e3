//! Concurrent batch verification
//!
//! Wraps a shared [`Verifier`] and fans a batch of requests out over tokio
//! tasks. Results come back in input order regardless of completion order,
//! with aggregate statistics computed over the whole batch.

use crate::message::SignableRequest;
use crate::verification::engine::Verifier;
use crate::verification::types::{
    VerificationError, VerificationReport, VerificationResult, VerificationStatus,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

/// One request in a batch, optionally pinned to a policy
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Request to verify
    pub request: SignableRequest,
    /// Policy name; `None` uses the verifier's default
    pub policy: Option<String>,
}

impl BatchItem {
    /// Item verified under the default policy
    pub fn new(request: SignableRequest) -> Self {
        Self {
            request,
            policy: None,
        }
    }

    /// Item verified under a named policy
    pub fn with_policy(request: SignableRequest, policy: &str) -> Self {
        Self {
            request,
            policy: Some(policy.to_string()),
        }
    }
}

/// Aggregate statistics over a batch
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BatchStats {
    /// Number of items in the batch
    pub total: usize,
    /// Number of items that verified as valid
    pub valid: usize,
    /// `valid / total`, 0.0 for an empty batch
    pub success_rate: f64,
    /// Mean verification time in milliseconds over items that produced a
    /// report; hard-error items carry no timing and are excluded
    pub average_time_ms: f64,
    /// Wall-clock time for the whole batch in milliseconds
    pub total_time_ms: u64,
}

/// Results and statistics for one batch run
#[derive(Debug)]
pub struct BatchOutcome {
    /// Per-item results, in the order the items were submitted
    pub results: Vec<VerificationResult<VerificationReport>>,
    /// Aggregate statistics
    pub stats: BatchStats,
}

/// Verifies batches of requests concurrently over a shared [`Verifier`]
pub struct BatchVerifier {
    verifier: Arc<Verifier>,
}

impl BatchVerifier {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self { verifier }
    }

    /// Verify a batch concurrently
    ///
    /// Each item fails or succeeds independently; a hard error on one item
    /// (such as an unknown policy name) never aborts the rest.
    pub async fn verify_batch(&self, items: Vec<BatchItem>) -> BatchOutcome {
        let start = Instant::now();
        let total = items.len();

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let verifier = Arc::clone(&self.verifier);
                tokio::spawn(async move {
                    verifier.verify_request(&item.request, item.policy.as_deref())
                })
            })
            .collect();

        let results: Vec<VerificationResult<VerificationReport>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(VerificationError::Internal(format!(
                    "verification task failed: {}",
                    e
                ))),
            })
            .collect();

        let total_time_ms = start.elapsed().as_millis() as u64;
        let valid = results
            .iter()
            .filter(|r| {
                matches!(r, Ok(report) if report.status == VerificationStatus::Valid)
            })
            .count();
        let reports: Vec<&VerificationReport> =
            results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let time_sum: u64 = reports.iter().map(|r| r.performance.total_time_ms).sum();

        let stats = BatchStats {
            total,
            valid,
            success_rate: if total == 0 {
                0.0
            } else {
                valid as f64 / total as f64
            },
            average_time_ms: if reports.is_empty() {
                0.0
            } else {
                time_sum as f64 / reports.len() as f64
            },
            total_time_ms,
        };

        log::debug!(
            "batch verified {} requests, {} valid in {}ms",
            stats.total,
            stats.valid,
            stats.total_time_ms
        );

        BatchOutcome { results, stats }
    }
}
