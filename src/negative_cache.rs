//! Short-lived cache of webhook IDs the upstream reported as nonexistent.
//!
//! A 404 from the upstream puts the ID here; while the entry lives, requests
//! for that ID are answered locally so guessed or deleted webhook IDs cannot
//! be used to hammer the upstream.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// TTL-based cache of known-missing webhook IDs.
pub struct NegativeCache {
    ttl: Duration,
    /// Webhook ID -> instant at which the suppression ends.
    entries: DashMap<String, Instant>,
}

impl NegativeCache {
    /// Creates an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Marks `id` as nonexistent for the next TTL, refreshing any prior mark.
    pub fn insert(&self, id: &str) {
        self.entries.insert(id.to_string(), Instant::now() + self.ttl);
    }

    /// Returns whether `id` is currently suppressed. Expired entries are
    /// removed on access.
    pub fn contains(&self, id: &str) -> bool {
        let now = Instant::now();
        self.entries.remove_if(id, |_, expires| *expires <= now);
        self.entries.contains_key(id)
    }

    /// Drops expired entries (background cleanup).
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, expires| *expires > now);
    }

    /// Returns the number of suppressed IDs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
