//! Shared application state: caches, trackers, throttles, and the upstream
//! client, assembled once and cloned into every handler.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::admission::AdmissionGate;
use crate::blocklist::Blocklist;
use crate::config::Config;
use crate::counters::WindowedCounter;
use crate::forwarder::UpstreamForwarder;
use crate::negative_cache::NegativeCache;
use crate::rate_limit::RateLimitCache;
use crate::throttle::{ProgressiveThrottle, ThrottleParams};

/// Decay window for local rate-limit violations.
const VIOLATION_WINDOW: Duration = Duration::from_secs(60);

/// Decay window for upstream-reported bad requests.
const BAD_REQUEST_WINDOW: Duration = Duration::from_secs(600);

/// How long a webhook the upstream reported missing stays suppressed.
const NONEXISTENT_TTL: Duration = Duration::from_secs(60);

/// Soft per-webhook burst limit applied before admission.
const PRIMARY_THROTTLE: ThrottleParams = ThrottleParams {
    window: Duration::from_secs(2),
    free_allowance: 5,
    step: Duration::from_secs(1),
    max_delay: Duration::from_secs(30),
};

/// Stricter schedule for webhooks accumulating 4xx outcomes.
const INVALID_THROTTLE: ThrottleParams = ThrottleParams {
    window: Duration::from_secs(30),
    free_allowance: 3,
    step: Duration::from_secs(1),
    max_delay: Duration::from_secs(30),
};

/// Per-address schedule for requests to paths the gateway does not serve.
const UNKNOWN_ENDPOINT_THROTTLE: ThrottleParams = ThrottleParams {
    window: Duration::from_secs(10),
    free_allowance: 5,
    step: Duration::from_millis(500),
    max_delay: Duration::from_secs(30),
};

/// Shared application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    blocklist: Arc<Blocklist>,
    nonexistent: Arc<NegativeCache>,
    rate_limits: Arc<RateLimitCache>,
    violations: Arc<WindowedCounter>,
    bad_requests: Arc<WindowedCounter>,
    gate: AdmissionGate,
    forwarder: UpstreamForwarder,
    primary_throttle: ProgressiveThrottle,
    invalid_throttle: ProgressiveThrottle,
    unknown_throttle: ProgressiveThrottle,
    auto_block: bool,
    trust_proxy: bool,
    start_time: Instant,
}

impl AppState {
    /// Creates the application state from config, loading the blocklist file.
    pub fn new(config: &Config) -> Self {
        let blocklist =
            Blocklist::load(&config.blocklist_path).expect("failed to load blocklist");
        Self::assemble(
            blocklist,
            config.upstream.clone(),
            Duration::from_secs(config.upstream_timeout),
            config.auto_block,
            config.trust_proxy,
        )
    }

    /// Creates a state with no blocklist file (for tests and ephemeral use).
    pub fn new_in_memory(upstream: Url) -> Self {
        Self::assemble(
            Blocklist::in_memory(),
            upstream,
            Duration::from_secs(5),
            true,
            false,
        )
    }

    /// Creates an in-memory state backed by a blocklist file (for tests).
    pub fn new_in_memory_with_blocklist(upstream: Url, path: &Path) -> Self {
        let blocklist = Blocklist::load(path).expect("failed to load blocklist");
        Self::assemble(blocklist, upstream, Duration::from_secs(5), true, false)
    }

    fn assemble(
        blocklist: Blocklist,
        upstream: Url,
        upstream_timeout: Duration,
        auto_block: bool,
        trust_proxy: bool,
    ) -> Self {
        let blocklist = Arc::new(blocklist);
        let nonexistent = Arc::new(NegativeCache::new(NONEXISTENT_TTL));
        let rate_limits = Arc::new(RateLimitCache::new());
        let violations = Arc::new(WindowedCounter::new(VIOLATION_WINDOW));
        let bad_requests = Arc::new(WindowedCounter::new(BAD_REQUEST_WINDOW));

        let gate = AdmissionGate::new(
            Arc::clone(&blocklist),
            Arc::clone(&nonexistent),
            Arc::clone(&rate_limits),
            Arc::clone(&violations),
        );

        Self {
            inner: Arc::new(Inner {
                blocklist,
                nonexistent,
                rate_limits,
                violations,
                bad_requests,
                gate,
                forwarder: UpstreamForwarder::new(upstream, upstream_timeout),
                primary_throttle: ProgressiveThrottle::new(PRIMARY_THROTTLE),
                invalid_throttle: ProgressiveThrottle::new(INVALID_THROTTLE),
                unknown_throttle: ProgressiveThrottle::new(UNKNOWN_ENDPOINT_THROTTLE),
                auto_block,
                trust_proxy,
                start_time: Instant::now(),
            }),
        }
    }

    /// Returns the blocklist.
    pub fn blocklist(&self) -> &Blocklist {
        &self.inner.blocklist
    }

    /// Returns the nonexistent-webhook cache.
    pub fn nonexistent(&self) -> &NegativeCache {
        &self.inner.nonexistent
    }

    /// Returns the upstream rate-limit cache.
    pub fn rate_limits(&self) -> &RateLimitCache {
        &self.inner.rate_limits
    }

    /// Returns the rate-limit violation tracker.
    pub fn violations(&self) -> &WindowedCounter {
        &self.inner.violations
    }

    /// Returns the bad-request tracker.
    pub fn bad_requests(&self) -> &WindowedCounter {
        &self.inner.bad_requests
    }

    /// Returns the admission gate.
    pub fn gate(&self) -> &AdmissionGate {
        &self.inner.gate
    }

    /// Returns the upstream forwarder.
    pub fn forwarder(&self) -> &UpstreamForwarder {
        &self.inner.forwarder
    }

    /// Returns the per-webhook request throttle.
    pub fn primary_throttle(&self) -> &ProgressiveThrottle {
        &self.inner.primary_throttle
    }

    /// Returns the bad-outcome throttle.
    pub fn invalid_throttle(&self) -> &ProgressiveThrottle {
        &self.inner.invalid_throttle
    }

    /// Returns the unknown-endpoint throttle.
    pub fn unknown_throttle(&self) -> &ProgressiveThrottle {
        &self.inner.unknown_throttle
    }

    /// Returns whether the auto-block sweeper is enabled.
    pub fn auto_block(&self) -> bool {
        self.inner.auto_block
    }

    /// Returns whether `X-Forwarded-For` is trusted for client addresses.
    pub fn trust_proxy(&self) -> bool {
        self.inner.trust_proxy
    }

    /// Returns the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }
}
