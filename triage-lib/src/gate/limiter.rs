//! The gate itself: check-and-increment over the window registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::gate::window::Registry;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request is admitted.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Number of requests remaining in the current window
        remaining: u32,
        /// When the current window ends
        reset_at: Instant,
    },
    /// Request exceeds the policy ceiling and should be rejected.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Whole seconds until the window resets (rounded up, at least 1)
        retry_after_secs: u64,
    },
}

impl Decision {
    /// Returns true if the request is admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Returns true if the request is throttled.
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. })
    }

    /// Get the policy ceiling.
    pub fn limit(&self) -> u32 {
        match self {
            Decision::Allowed { limit, .. } => *limit,
            Decision::Limited { limit, .. } => *limit,
        }
    }

    /// Requests left in the window (0 when limited).
    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Allowed { remaining, .. } => *remaining,
            Decision::Limited { .. } => 0,
        }
    }

    /// Seconds to wait before retrying, if limited.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Decision::Limited { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// A `{window, max_requests}` pair handed to [`AdmissionGate::check`].
///
/// Presets share one algorithm; they differ only in numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// Length of the counting window
    pub window: Duration,
    /// Requests admitted per identity per window
    pub max_requests: u32,
}

impl GatePolicy {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests }
    }

    /// Authentication endpoints: short window, generous ceiling. Tolerant
    /// of retries and typos without leaving a long lockout tail.
    pub fn auth() -> Self {
        Self::new(Duration::from_secs(60), 30)
    }

    /// General API traffic: longer window, moderate ceiling.
    pub fn api() -> Self {
        Self::new(Duration::from_secs(300), 300)
    }

    /// Search endpoints: short window, high ceiling. Tolerant of rapid,
    /// debounced typing.
    pub fn search() -> Self {
        Self::new(Duration::from_secs(10), 60)
    }
}

/// Per-identity fixed-window admission gate.
///
/// Exact counts per identity, a full expiry sweep on every call, and an
/// explicit [`clear`](Self::clear) for forgiving an identity mid-window
/// (e.g. a successful login wiping failed-attempt throttling).
///
/// The whole check-and-increment runs under one mutex, so a concurrent
/// burst never under-counts. The gate never errors for a well-formed
/// identity; unidentifiable clients should be folded into
/// [`UNKNOWN_IDENTITY`](crate::gate::UNKNOWN_IDENTITY) by the caller.
pub struct AdmissionGate {
    registry: Mutex<Registry>,
    /// Total checks, for observability
    checked: AtomicU64,
    /// Total denials, for observability
    denied: AtomicU64,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            checked: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    /// Decide whether a request from `identity` is admitted under `policy`.
    ///
    /// Counts keep accumulating past the ceiling (useful when reading the
    /// denial counters) but never extend the window: the reset instant is
    /// fixed when the entry is created.
    pub fn check(&self, identity: &str, policy: &GatePolicy) -> Decision {
        let now = Instant::now();
        self.checked.fetch_add(1, Ordering::Relaxed);

        let entry = {
            let mut registry = self.lock_registry();
            registry.sweep(now);
            registry.hit(identity, policy.window, now)
        };

        if entry.count > policy.max_requests {
            self.denied.fetch_add(1, Ordering::Relaxed);
            let retry_after_secs = retry_after_secs(entry.reset_at, now);
            debug!(identity, count = entry.count, retry_after_secs, "request denied");
            Decision::Limited { limit: policy.max_requests, retry_after_secs }
        } else {
            Decision::Allowed {
                limit: policy.max_requests,
                remaining: policy.max_requests.saturating_sub(entry.count),
                reset_at: entry.reset_at,
            }
        }
    }

    /// Forget `identity` entirely: the next check behaves as if the client
    /// were new, even mid-window.
    pub fn clear(&self, identity: &str) {
        let removed = self.lock_registry().clear(identity);
        if removed {
            debug!(identity, "window cleared");
        }
    }

    /// Number of identities with a live window.
    pub fn live_identities(&self) -> usize {
        self.lock_registry().len()
    }

    /// Total checks served.
    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Relaxed)
    }

    /// Total denials issued.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Keep serving: the registry holds only counters.
                tracing::warn!("admission registry lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

/// Whole seconds until `reset_at`, rounded up. A window with any time left
/// reports at least 1.
fn retry_after_secs(reset_at: Instant, now: Instant) -> u64 {
    let remaining_ms = reset_at.saturating_duration_since(now).as_millis();
    // Sub-millisecond remainders truncate to 0 ms but still round up to 1.
    (remaining_ms.div_ceil(1000) as u64).max(1)
}
