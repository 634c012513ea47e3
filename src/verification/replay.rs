//! Nonce replay detection
//!
//! The verifier core only defines the shape of the replay check; the actual
//! store of seen nonces is a collaborator the verifier is parameterized over.
//! [`TimeWindowedNonceCache`] is the in-process implementation shipped with
//! the crate.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Store of previously observed nonces
pub trait NonceStore: Send + Sync {
    /// Record a nonce observation
    ///
    /// `created` is the signature's declared creation time; stores may use
    /// it for bookkeeping but must never trust it for retention, since it
    /// is attacker-controlled until the signature has been validated.
    ///
    /// Returns `true` when the nonce is fresh (first time seen) and `false`
    /// when it was observed before within the store's retention window.
    fn observe(&self, nonce: &str, created: i64) -> bool;
}

/// In-memory sliding-window nonce cache
///
/// Entries are stamped and pruned against the local clock, so a message's
/// declared timestamps cannot evict other entries. Memory stays bounded to
/// the traffic of one window.
pub struct TimeWindowedNonceCache {
    window_secs: i64,
    seen: Mutex<HashMap<String, i64>>,
}

impl TimeWindowedNonceCache {
    /// Cache retaining nonces for `window_secs` seconds
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs as i64,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Number of nonces currently retained
    pub fn len(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn observe_at(&self, nonce: &str, now: i64) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            // A poisoned cache fails closed: treat everything as replayed
            Err(_) => return false,
        };

        let horizon = now - self.window_secs;
        seen.retain(|_, ts| *ts >= horizon);

        if seen.contains_key(nonce) {
            return false;
        }
        seen.insert(nonce.to_string(), now);
        true
    }
}

impl NonceStore for TimeWindowedNonceCache {
    fn observe(&self, nonce: &str, _created: i64) -> bool {
        self.observe_at(nonce, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_nonce_accepted_once() {
        let cache = TimeWindowedNonceCache::new(300);
        assert!(cache.observe("nonce-1", 1000));
        assert!(!cache.observe("nonce-1", 1001));
    }

    #[test]
    fn test_distinct_nonces_accepted() {
        let cache = TimeWindowedNonceCache::new(300);
        assert!(cache.observe("a", 1000));
        assert!(cache.observe("b", 1000));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_nonces_pruned() {
        let cache = TimeWindowedNonceCache::new(60);
        assert!(cache.observe_at("old", 1000));

        // Same nonce reappears after the window has fully passed
        assert!(cache.observe_at("other", 1100));
        assert!(cache.observe_at("old", 1100));
    }

    #[test]
    fn test_declared_timestamps_cannot_evict_entries() {
        let cache = TimeWindowedNonceCache::new(600);
        assert!(cache.observe("genuine", 1000));

        // A message declaring a far-future created must not flush the cache
        assert!(cache.observe("attacker", 1_000_000_000));
        assert!(!cache.observe("genuine", 1001));
        assert_eq!(cache.len(), 2);
    }
}
