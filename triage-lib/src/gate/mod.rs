//! Admission control for the API boundary.
//!
//! Every inbound request passes through an [`AdmissionGate`] before its
//! handler runs. The gate keeps a fixed-window counter per client identity:
//!
//! 1. **Registry** (`window.rs`): one window entry per live identity,
//!    swept of expired entries on every check so memory stays bounded by
//!    distinct concurrent identities without a background task.
//!
//! 2. **Gate** (`limiter.rs`): the check-and-increment step, the
//!    [`Decision`] returned to callers, and the named [`GatePolicy`]
//!    presets.
//!
//! # Example
//!
//! ```ignore
//! use triage_lib::gate::{AdmissionGate, Decision, GatePolicy};
//!
//! let gate = AdmissionGate::new();
//! let policy = GatePolicy::api();
//!
//! match gate.check("203.0.113.9", &policy) {
//!     Decision::Allowed { remaining, .. } => {
//!         println!("admitted, {remaining} left in window");
//!     }
//!     Decision::Limited { retry_after_secs, .. } => {
//!         println!("throttled, retry in {retry_after_secs}s");
//!         // Return 429 Too Many Requests
//!     }
//! }
//! ```
//!
//! A denial is a decision value, never an error: callers branch on the
//! variant. The gate itself is an owned object, constructed once per
//! process (or per test) and shared behind an `Arc` by whoever drives it.

mod limiter;
mod window;

pub use limiter::{AdmissionGate, Decision, GatePolicy};

/// Shared bucket for requests whose client identity cannot be determined.
///
/// Lumping unidentifiable clients together fails open toward availability,
/// not security: one anonymous client can exhaust the bucket for all of
/// them. Known weakness, kept deliberately.
pub const UNKNOWN_IDENTITY: &str = "unknown";
