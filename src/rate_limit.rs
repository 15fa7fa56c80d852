//! Cache of webhooks whose upstream quota is exhausted.
//!
//! When the upstream reports zero remaining quota for a webhook, the reset
//! time it advertised is remembered here so further requests for that webhook
//! are refused locally until the quota window reopens. Expiry is wall-clock:
//! the reset is an epoch timestamp handed to us by the upstream.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Per-webhook record of upstream rate-limit exhaustion.
pub struct RateLimitCache {
    /// Webhook ID -> epoch seconds at which the upstream quota resets.
    entries: DashMap<String, u64>,
}

impl Default for RateLimitCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Records that `id` is exhausted until `reset_epoch`. Last write wins.
    pub fn set(&self, id: &str, reset_epoch: u64) {
        self.entries.insert(id.to_string(), reset_epoch);
    }

    /// Returns the reset time for `id` if it is still in the future.
    ///
    /// A passed reset is removed with an atomic compare-and-delete, so a
    /// concurrent `set` for the same webhook is never clobbered.
    pub fn active(&self, id: &str) -> Option<u64> {
        let now = epoch_secs();
        self.entries.remove_if(id, |_, reset| *reset <= now);
        self.entries.get(id).map(|entry| *entry.value())
    }

    /// Drops entries whose reset has passed (background cleanup).
    pub fn purge_expired(&self) {
        let now = epoch_secs();
        self.entries.retain(|_, reset| *reset > now);
    }

    /// Returns the number of cached exhaustion records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Current wall-clock time as epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
