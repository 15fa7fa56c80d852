//! Rate-limiting forwarding gateway for a webhook delivery API.
//!
//! Sits in front of an upstream webhook API and shields it from abusive or
//! erroneous traffic. Requests pass a progressive throttle and an admission
//! gate (blocklist, nonexistent cache, upstream rate-limit cache) before
//! being relayed; response classification feeds the caches and trackers, and
//! a background sweeper promotes repeat offenders into a persisted blocklist.

pub mod admission;
pub mod blocklist;
pub mod config;
pub mod counters;
pub mod error;
pub mod forwarder;
pub mod negative_cache;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod throttle;

pub use routes::router;
pub use state::AppState;
