//! Background promotion of repeat offenders to the blocklist.
//!
//! Every second the sweeper walks the violation and bad-request trackers:
//! lapsed records are dropped, and records over the threshold are promoted
//! into the persistent blocklist. The blocklist file is written once per
//! dirty pass, however many promotions the pass made.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::AppState;

/// Count within one tracker window past which an ID is auto-blocked.
pub const AUTO_BLOCK_THRESHOLD: u32 = 50;

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

const RATELIMIT_REASON: &str = "[Automated] Ratelimited more than 50 times within a minute.";
const BAD_REQUEST_REASON: &str = "[Automated] Sent more than 50 bad requests within 10 minutes.";

/// Runs one sweep pass and returns the number of IDs promoted.
///
/// Callable outside the loop so tests can drive sweeps deterministically.
pub fn sweep_once(state: &AppState) -> usize {
    let mut promoted = 0;

    for id in state.violations().drain_over(AUTO_BLOCK_THRESHOLD) {
        state.blocklist().insert(&id, RATELIMIT_REASON);
        tracing::warn!(id = %id, "auto-blocked webhook: repeated rate-limit violations");
        promoted += 1;
    }
    for id in state.bad_requests().drain_over(AUTO_BLOCK_THRESHOLD) {
        state.blocklist().insert(&id, BAD_REQUEST_REASON);
        tracing::warn!(id = %id, "auto-blocked webhook: repeated bad requests");
        promoted += 1;
    }

    if promoted > 0
        && let Err(err) = state.blocklist().persist()
    {
        // In-memory blocklist stays authoritative even if the write failed
        tracing::error!(error = %err, "failed to persist blocklist");
    }
    promoted
}

/// Spawns the 1-second sweep loop. Stopped at shutdown by aborting the handle.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            sweep_once(&state);
        }
    })
}

/// Spawns periodic cleanup of expired records that only lazy delete-on-access
/// would otherwise reclaim: lapsed throttle windows, passed rate-limit resets,
/// and stale nonexistent-webhook entries. Runs whether or not auto-block is
/// enabled.
pub fn spawn_housekeeping(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            state.primary_throttle().purge_expired();
            state.invalid_throttle().purge_expired();
            state.unknown_throttle().purge_expired();
            state.rate_limits().purge_expired();
            state.nonexistent().purge_expired();
        }
    })
}
