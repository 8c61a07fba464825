//! Request coalescing for chatty callers.
//!
//! Application code that fires several independent asynchronous calls in
//! quick succession (a screen loading, a form autosaving) can hand each
//! call to a [`CoalescingQueue`] instead of dispatching it directly. The
//! queue holds submissions for a short quiet period, then starts everything
//! queued in that window concurrently as one batch, routing every result
//! back to exactly the caller that submitted it.
//!
//! # State machine
//!
//! - **Idle**: nothing pending, no timer.
//! - **Collecting**: a submission arrived and armed the flush timer; every
//!   further submission restarts it, so the batch fires `delay` after the
//!   *last* submission, not the first.
//! - **Flushing**: timer expiry or an explicit [`flush`] captures the whole
//!   pending set atomically and dispatches it. New submissions during
//!   dispatch land in the next Collecting cycle; a request submitted after
//!   capture is never folded into that batch.
//!
//! [`flush`]: CoalescingQueue::flush
//!
//! Each submission returns a [`Ticket`], a future that settles exactly
//! once. Failures of one operation are forwarded only to its own ticket;
//! siblings in the same batch are untouched.
//!
//! The queue must be used inside a tokio runtime: the debounce timer and
//! batch execution are spawned tasks.

mod batch;
mod queue;

pub use batch::{QueueError, Ticket};
pub use queue::{CoalescingQueue, QueueMetrics};
