use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use super::errors::{QueueError, QueueResult};
use crate::platform::PlatformInfo;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

static GLOBAL_QUEUE: Lazy<OperationQueue> = Lazy::new(OperationQueue::new);

/// FIFO queue that runs async operations strictly one at a time.
///
/// Used on platforms where concurrent network operations are unreliable
/// (mobile WebViews). Guarantees:
///
/// - operations start and complete in the order they were enqueued;
/// - at most one operation is executing at any instant;
/// - an operation that fails or panics only affects its own caller, the
///   queue keeps draining;
/// - there is no cancellation: once enqueued an operation runs even if the
///   caller drops the returned future.
///
/// The queue starts idle, spawns a drain task on the current tokio runtime
/// when work arrives and goes back to idle once empty. If the runtime owning
/// the drain task shuts down, the operation in flight is dropped (its caller
/// sees [`QueueError::Dropped`]) and the queue is idle again; operations
/// still waiting run once the next one is enqueued.
#[derive(Clone, Default)]
pub struct OperationQueue {
    inner: Arc<Mutex<QueueState>>,
    completed: Arc<AtomicU64>,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    processing: bool,
}

/// Clears `processing` if the drain future is dropped before it finishes.
struct DrainGuard {
    inner: Arc<Mutex<QueueState>>,
    finished: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.inner.lock();
            state.processing = false;
            warn!(pending = state.jobs.len(), "Operation queue drain task dropped");
        }
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide queue shared by every caller that does not inject its own.
    pub fn global() -> &'static OperationQueue {
        &GLOBAL_QUEUE
    }

    /// Enqueue `thunk` and return a future resolving to its output.
    ///
    /// The operation is registered immediately, before the returned future
    /// is polled. Must be called from within a tokio runtime.
    pub fn enqueue<F, Fut, T>(&self, thunk: F) -> impl Future<Output = QueueResult<T>> + Send
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let completed = Arc::clone(&self.completed);
        let job: Job = Box::new(move || {
            async move {
                let outcome = AssertUnwindSafe(async move { thunk().await }).catch_unwind().await;
                if outcome.is_err() {
                    error!("Queued operation panicked");
                }
                completed.fetch_add(1, Ordering::SeqCst);
                if tx.send(outcome.map_err(|_| QueueError::OperationPanicked)).is_err() {
                    trace!("Caller dropped before queued operation completed");
                }
            }
            .boxed()
        });

        let scheduled = self.schedule(job);

        async move {
            scheduled?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(QueueError::Dropped),
            }
        }
    }

    /// Operations waiting to start (the running one is not counted).
    pub fn pending(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    /// True when nothing is running and nothing is waiting.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock();
        !state.processing && state.jobs.is_empty()
    }

    /// Total operations that have finished, successfully or not.
    ///
    /// Counted before the caller is handed the result.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn schedule(&self, job: Job) -> QueueResult<()> {
        let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let start_drain = {
            let mut state = self.inner.lock();
            state.jobs.push_back(job);
            debug!(pending = state.jobs.len(), "Operation enqueued");
            !std::mem::replace(&mut state.processing, true)
        };

        if start_drain {
            handle.spawn(Self::drain(Arc::clone(&self.inner)));
        }
        Ok(())
    }

    // The guard is created outside the async block so it is dropped even
    // when the task is discarded before its first poll.
    fn drain(inner: Arc<Mutex<QueueState>>) -> impl Future<Output = ()> + Send + 'static {
        let mut guard = DrainGuard { inner, finished: false };
        async move {
            loop {
                let next = {
                    let mut state = guard.inner.lock();
                    match state.jobs.pop_front() {
                        Some(job) => job,
                        None => {
                            state.processing = false;
                            guard.finished = true;
                            debug!("Operation queue drained");
                            return;
                        }
                    }
                };

                next().await;
            }
        }
    }
}

/// Run `thunk` through `queue` inside the native shell, directly elsewhere.
pub async fn execute_mobile_safe<F, Fut, T>(
    platform: &PlatformInfo,
    queue: &OperationQueue,
    thunk: F,
) -> QueueResult<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if platform.is_native_shell {
        queue.enqueue(thunk).await
    } else {
        Ok(thunk().await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_starts_and_returns_to_idle() {
        let queue = OperationQueue::new();
        assert!(queue.is_idle());

        let value = queue.enqueue(|| async { 41 + 1 }).await.unwrap();
        assert_eq!(value, 42);

        tokio::task::yield_now().await;
        assert!(queue.is_idle());
        assert_eq!(queue.completed(), 1);
    }

    #[tokio::test]
    async fn test_failed_operation_does_not_stop_queue() {
        let queue = OperationQueue::new();

        let failing = queue.enqueue(|| async { Err::<u32, String>("boom".into()) });
        let next = queue.enqueue(|| async { Ok::<u32, String>(7) });

        assert_eq!(failing.await.unwrap(), Err("boom".to_string()));
        assert_eq!(next.await.unwrap(), Ok(7));
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_caller() {
        let queue = OperationQueue::new();

        let panicking = queue.enqueue(|| async {
            if true {
                panic!("queued operation blew up");
            }
            0_u8
        });
        let after = queue.enqueue(|| async { 5_u8 });

        assert_eq!(panicking.await, Err(QueueError::OperationPanicked));
        assert_eq!(after.await, Ok(5));
    }

    #[tokio::test]
    async fn test_dropped_caller_still_runs_operation() {
        let queue = OperationQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_clone = Arc::clone(&ran);
        drop(queue.enqueue(move || async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));

        queue.enqueue(|| async {}).await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_enqueue_outside_runtime_fails() {
        let queue = OperationQueue::new();
        let result = futures::executor::block_on(queue.enqueue(|| async { 1 }));
        assert_eq!(result, Err(QueueError::NoRuntime));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_web_platform_bypasses_queue() {
        let queue = OperationQueue::new();
        let value =
            execute_mobile_safe(&PlatformInfo::web(), &queue, || async { "direct" }).await.unwrap();
        assert_eq!(value, "direct");
        assert_eq!(queue.completed(), 0);

        let queued =
            execute_mobile_safe(&PlatformInfo::native_shell(), &queue, || async { "queued" })
                .await
                .unwrap();
        assert_eq!(queued, "queued");
        tokio::task::yield_now().await;
        assert_eq!(queue.completed(), 1);
    }
}
