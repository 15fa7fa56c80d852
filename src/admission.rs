//! The allow/deny decision for each inbound webhook request.

use std::sync::Arc;

use crate::blocklist::Blocklist;
use crate::counters::WindowedCounter;
use crate::error::ProxyError;
use crate::negative_cache::NegativeCache;
use crate::rate_limit::RateLimitCache;

/// Runs the deny checks for a webhook request, short-circuiting in order:
/// blocklist, then nonexistent cache, then rate-limit cache.
pub struct AdmissionGate {
    blocklist: Arc<Blocklist>,
    nonexistent: Arc<NegativeCache>,
    rate_limits: Arc<RateLimitCache>,
    violations: Arc<WindowedCounter>,
}

impl AdmissionGate {
    pub fn new(
        blocklist: Arc<Blocklist>,
        nonexistent: Arc<NegativeCache>,
        rate_limits: Arc<RateLimitCache>,
        violations: Arc<WindowedCounter>,
    ) -> Self {
        Self {
            blocklist,
            nonexistent,
            rate_limits,
            violations,
        }
    }

    /// Decides whether a request for `id` may reach the upstream.
    ///
    /// Allowing has no side effects. A rate-limit denial counts one violation
    /// toward the auto-block threshold; the other denials count nothing.
    pub fn decide(&self, id: &str) -> Result<(), ProxyError> {
        if let Some(reason) = self.blocklist.reason(id) {
            return Err(ProxyError::Blocked { reason });
        }

        if self.nonexistent.contains(id) {
            return Err(ProxyError::Nonexistent);
        }

        if let Some(reset) = self.rate_limits.active(id) {
            let violations = self.violations.record(id);
            tracing::info!(id = %id, violations, "webhook hit rate limit");
            return Err(ProxyError::RateLimited { reset });
        }

        Ok(())
    }
}
