use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, trace, warn};

use crate::coalesce::batch::{Batch, PendingRequest, QueueError, Ticket};

/// Relaxed counters for queue observability.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Individual submissions accepted.
    pub submitted: AtomicU64,
    /// Batches dispatched.
    pub batches: AtomicU64,
    /// Requests included in dispatched batches.
    pub batched: AtomicU64,
    /// Requests settled with `Cleared` instead of executing.
    pub cleared: AtomicU64,
    /// Batches dispatched by the debounce timer firing.
    pub timer_flushes: AtomicU64,
    /// Batches dispatched by an explicit [`flush`](CoalescingQueue::flush).
    pub explicit_flushes: AtomicU64,
}

impl QueueMetrics {
    /// Average batch size (0.0 before the first batch).
    pub fn avg_batch_size(&self) -> f64 {
        let batches = self.batches.load(Ordering::Relaxed);
        if batches == 0 {
            return 0.0;
        }
        self.batched.load(Ordering::Relaxed) as f64 / batches as f64
    }
}

/// What triggered a batch capture, for the dispatch log line.
#[derive(Debug, Clone, Copy)]
enum FlushKind {
    Timer,
    Explicit,
}

/// Pending requests plus the single outstanding timer handle.
///
/// `generation` identifies the currently armed timer: a timer that already
/// woke but lost the race to a rearm or an explicit flush observes a newer
/// generation and stands down.
struct QueueState<T, E> {
    pending: Vec<PendingRequest<T, E>>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Inner<T, E> {
    delay: Duration,
    state: Mutex<QueueState<T, E>>,
    metrics: QueueMetrics,
}

/// Merges near-simultaneous submissions into one concurrently executed
/// batch. See the [module docs](crate::coalesce) for the state machine.
///
/// Cheap to clone; clones share the same pending queue and timer.
pub struct CoalescingQueue<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for CoalescingQueue<T, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T, E> CoalescingQueue<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a queue that flushes `delay` after the last submission in a
    /// burst.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                state: Mutex::new(QueueState { pending: Vec::new(), timer: None, generation: 0 }),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Enqueue `op` for the next batch and return its [`Ticket`].
    ///
    /// `op` is a zero-argument thunk that starts the real asynchronous
    /// work; it runs when the batch flushes, concurrently with its
    /// siblings. The enqueue itself happens before `submit` returns, so a
    /// following [`flush`](Self::flush) is guaranteed to include it.
    pub fn submit<F, Fut>(&self, op: F) -> Ticket<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest { op: Box::new(move || Box::pin(op())), tx };

        self.inner.metrics.submitted.fetch_add(1, Ordering::Relaxed);

        let mut state = Inner::lock(&self.inner);
        state.pending.push(request);
        trace!(pending = state.pending.len(), "request queued");

        // Quiet-period debounce: every submission restarts the timer, so
        // the batch fires `delay` after the last one.
        Inner::arm_timer(&self.inner, &mut state);

        Ticket::new(rx)
    }

    /// Cancel the timer and dispatch everything pending right now.
    ///
    /// With nothing pending this is a no-op: no batch executes.
    pub fn flush(&self) {
        let batch = {
            let mut state = Inner::lock(&self.inner);
            Inner::capture(&mut state)
        };
        Inner::dispatch(&self.inner, batch, FlushKind::Explicit);
    }

    /// Cancel the timer and settle every pending ticket with
    /// [`QueueError::Cleared`] instead of executing it. Teardown primitive.
    pub fn clear(&self) {
        let batch = {
            let mut state = Inner::lock(&self.inner);
            Inner::capture(&mut state)
        };

        let count = batch.len();
        for request in batch.into_requests() {
            let _ = request.tx.send(Err(QueueError::Cleared));
        }

        if count > 0 {
            self.inner.metrics.cleared.fetch_add(count as u64, Ordering::Relaxed);
            debug!(cleared = count, "pending requests cleared");
        }
    }

    /// Submissions awaiting the next flush.
    pub fn pending_count(&self) -> usize {
        Inner::lock(&self.inner).pending.len()
    }

    /// The configured debounce delay.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Observability counters.
    pub fn metrics(&self) -> &QueueMetrics {
        &self.inner.metrics
    }
}

impl<T, E> Inner<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn lock(inner: &Arc<Self>) -> MutexGuard<'_, QueueState<T, E>> {
        match inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("coalescing queue lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    /// Cancel any armed timer and (re)arm one for the current pending set.
    /// Caller holds the state lock.
    fn arm_timer(inner: &Arc<Self>, state: &mut QueueState<T, E>) {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.generation += 1;
        let armed = state.generation;

        let inner = Arc::clone(inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;

            let batch = {
                let mut state = Inner::lock(&inner);
                if state.generation != armed {
                    // Lost the race to a rearm, flush, or clear.
                    return;
                }
                Inner::capture(&mut state)
            };
            Inner::dispatch(&inner, batch, FlushKind::Timer);
        }));
    }

    /// Atomically take the whole pending set and invalidate the timer.
    /// Caller holds the state lock.
    fn capture(state: &mut QueueState<T, E>) -> Batch<T, E> {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.generation += 1;
        Batch::new(std::mem::take(&mut state.pending))
    }

    /// Start every operation in `batch` concurrently and route each result
    /// to its own ticket.
    ///
    /// The supervisor waits for all tasks regardless of individual outcome:
    /// one failing or panicking operation never aborts its siblings. A
    /// panicked task drops its sender and that caller alone observes
    /// [`QueueError::Lost`].
    fn dispatch(inner: &Arc<Self>, batch: Batch<T, E>, kind: FlushKind) {
        if batch.is_empty() {
            return;
        }

        let size = batch.len();
        inner.metrics.batches.fetch_add(1, Ordering::Relaxed);
        inner.metrics.batched.fetch_add(size as u64, Ordering::Relaxed);
        match kind {
            FlushKind::Timer => inner.metrics.timer_flushes.fetch_add(1, Ordering::Relaxed),
            FlushKind::Explicit => inner.metrics.explicit_flushes.fetch_add(1, Ordering::Relaxed),
        };
        debug!(batch_size = size, ?kind, "batch dispatched");

        let mut tasks = JoinSet::new();
        for request in batch.into_requests() {
            tasks.spawn(async move {
                let result = (request.op)().await.map_err(QueueError::Operation);
                // A caller that dropped its ticket just misses the delivery.
                let _ = request.tx.send(result);
            });
        }

        tokio::spawn(async move {
            let mut panicked = 0usize;
            while let Some(joined) = tasks.join_next().await {
                if joined.is_err() {
                    panicked += 1;
                }
            }
            if panicked > 0 {
                warn!(batch_size = size, panicked, "batch finished with failed tasks");
            } else {
                debug!(batch_size = size, "batch complete");
            }
        });
    }
}
