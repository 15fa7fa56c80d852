//! Fixed-window event counters keyed by string.
//!
//! The shared primitive behind the violation and bad-request trackers and the
//! progressive throttles: each key owns an independent window anchored at its
//! first event, and a lapsed window resets to a fresh count on the next event.

use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Window {
    count: u32,
    started: Instant,
}

/// Thread-safe per-key counter over a fixed expiring window.
pub struct WindowedCounter {
    window: Duration,
    entries: DashMap<String, Window>,
}

impl WindowedCounter {
    /// Creates an empty counter whose windows last `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// Counts one event for `key` and returns the count within the live window.
    ///
    /// A key whose window has lapsed starts over at 1 with a new window
    /// anchored at this event.
    pub fn record(&self, key: &str) -> u32 {
        let mut entry = self.entries.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: Instant::now(),
        });

        if entry.started.elapsed() > self.window {
            // Lapsed window starts over
            entry.count = 1;
            entry.started = Instant::now();
        } else {
            entry.count += 1;
        }
        entry.count
    }

    /// Returns the live count for `key`, or 0 if absent or lapsed.
    pub fn count(&self, key: &str) -> u32 {
        self.entries.get(key).map_or(0, |entry| {
            if entry.started.elapsed() > self.window {
                0
            } else {
                entry.count
            }
        })
    }

    /// Removes lapsed windows and drains keys whose live count exceeds
    /// `threshold`, returning the drained keys.
    ///
    /// Mutations happen inside the map's own shard locks; the returned keys
    /// let the caller act on offenders without holding any lock.
    pub fn drain_over(&self, threshold: u32) -> Vec<String> {
        let mut over = Vec::new();
        self.entries.retain(|key, entry| {
            if entry.started.elapsed() > self.window {
                return false;
            }
            if entry.count > threshold {
                over.push(key.clone());
                return false;
            }
            true
        });
        over
    }

    /// Removes entries for expired windows (background cleanup).
    pub fn purge_expired(&self) {
        let window = self.window;
        self.entries.retain(|_, entry| entry.started.elapsed() <= window);
    }

    /// Returns the number of tracked keys, lapsed windows included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
