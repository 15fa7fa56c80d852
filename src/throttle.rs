//! Progressive per-key request delays.
//!
//! Unlike the admission checks, a throttle never rejects: past a free
//! allowance each further event within the window earns the key a growing
//! delay, up to a cap. Counting and sleeping are separate operations so one
//! instance can count requests while another counts bad outcomes.

use std::time::Duration;

use crate::counters::WindowedCounter;

/// Delay schedule for a [`ProgressiveThrottle`].
#[derive(Debug, Clone, Copy)]
pub struct ThrottleParams {
    /// Length of the counting window.
    pub window: Duration,
    /// Events per window that incur no delay.
    pub free_allowance: u32,
    /// Added delay for each event past the allowance.
    pub step: Duration,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
}

/// Soft rate limiter that slows keys down instead of rejecting them.
pub struct ProgressiveThrottle {
    params: ThrottleParams,
    events: WindowedCounter,
}

impl ProgressiveThrottle {
    pub fn new(params: ThrottleParams) -> Self {
        Self {
            events: WindowedCounter::new(params.window),
            params,
        }
    }

    /// Counts one event for `key` and sleeps out the delay it earned.
    /// Returns the applied delay. No map lock is held while sleeping.
    pub async fn acquire(&self, key: &str) -> Duration {
        let hits = self.events.record(key);
        let delay = self.penalty(hits);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }

    /// Counts one event for `key` without sleeping.
    pub fn charge(&self, key: &str) -> u32 {
        self.events.record(key)
    }

    /// Sleeps out the delay earned by `key`'s events so far, without counting
    /// a new one. Returns the applied delay.
    pub async fn hold(&self, key: &str) -> Duration {
        let hits = self.events.count(key);
        let delay = self.penalty(hits);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }

    /// Removes lapsed windows (background cleanup).
    pub fn purge_expired(&self) {
        self.events.purge_expired();
    }

    /// Delay owed at `hits` events within the live window.
    fn penalty(&self, hits: u32) -> Duration {
        let over = hits.saturating_sub(self.params.free_allowance);
        if over == 0 {
            return Duration::ZERO;
        }
        self.params
            .step
            .saturating_mul(over)
            .min(self.params.max_delay)
    }
}
