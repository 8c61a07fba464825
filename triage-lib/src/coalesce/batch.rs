use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

/// How a coalesced operation can fail from the caller's point of view.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError<E> {
    /// The operation itself failed; the payload is forwarded unchanged.
    #[error("operation failed: {0}")]
    Operation(E),

    /// The queue was cleared before this request was dispatched.
    #[error("queue cleared before dispatch")]
    Cleared,

    /// The result channel closed without a delivery (the executing task
    /// panicked or was aborted). Surfaced instead of hanging the caller.
    #[error("result lost before delivery")]
    Lost,
}

/// A queued operation: a boxed thunk that starts the real work when the
/// batch runs.
pub(crate) type BoxedOp<T, E> =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>> + Send>;

/// One submission awaiting its batch. Dropped once its result (success or
/// failure) has been delivered.
pub(crate) struct PendingRequest<T, E> {
    pub op: BoxedOp<T, E>,
    pub tx: oneshot::Sender<Result<T, QueueError<E>>>,
}

/// A captured snapshot of pending requests, owned exclusively during
/// execution. Every request belongs to exactly one batch over its lifetime.
pub(crate) struct Batch<T, E> {
    requests: Vec<PendingRequest<T, E>>,
}

impl<T, E> Batch<T, E> {
    pub fn new(requests: Vec<PendingRequest<T, E>>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn into_requests(self) -> Vec<PendingRequest<T, E>> {
        self.requests
    }
}

/// Future returned by [`submit`](crate::coalesce::CoalescingQueue::submit).
///
/// Settles exactly once, independently of every other ticket, with the
/// operation's own success or failure payload.
pub struct Ticket<T, E> {
    rx: oneshot::Receiver<Result<T, QueueError<E>>>,
}

impl<T, E> Ticket<T, E> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, QueueError<E>>>) -> Self {
        Self { rx }
    }
}

impl<T, E> Future for Ticket<T, E> {
    type Output = Result<T, QueueError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::Lost)),
            Poll::Pending => Poll::Pending,
        }
    }
}
