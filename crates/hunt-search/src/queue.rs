//! Shared request queue for every outbound provider call.
//!
//! One queue is built at startup and handed to each client so the whole
//! service stays under the providers' rate limits: at most
//! `max_concurrent` requests in flight, and at least `min_spacing`
//! between two dispatches. Dispatch order is enqueue order.

use crate::error::SearchError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    max_concurrent: usize,
    min_spacing: Duration,
    permits: Arc<Semaphore>,
    // tokio's mutex is fair, so waiters reach the dispatch gate in FIFO order.
    gate: Mutex<DispatchState>,
    pending: AtomicUsize,
}

#[derive(Debug, Default)]
struct DispatchState {
    last_dispatch: Option<Instant>,
}

struct QueuedRequest<F> {
    execute: F,
    enqueued_at: Instant,
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestQueue {
    pub fn new(max_concurrent: usize, min_spacing: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent,
                min_spacing,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                gate: Mutex::new(DispatchState::default()),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of tasks currently running. Tasks still waiting out the
    /// minimum spacing are counted in [`pending`](Self::pending).
    pub fn in_flight(&self) -> usize {
        self.inner.max_concurrent - self.inner.permits.available_permits()
    }

    /// Number of tasks waiting for a dispatch slot.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Run `task` once a dispatch slot is free and resolve with its outcome.
    ///
    /// A task's error reaches only this caller. A panicking task is caught
    /// and reported as [`SearchError::TaskPanicked`]; its slot is released
    /// and other queued tasks are unaffected.
    pub async fn enqueue<F, Fut, T>(&self, task: F) -> Result<T, SearchError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, SearchError>> + Send,
        T: Send,
    {
        let request = QueuedRequest {
            execute: task,
            enqueued_at: Instant::now(),
        };

        let permit = self.wait_for_slot().await?;
        tracing::debug!(
            waited_ms = request.enqueued_at.elapsed().as_millis() as u64,
            in_flight = self.in_flight(),
            pending = self.pending(),
            "Dispatching queued request"
        );

        let execute = request.execute;
        let outcome = AssertUnwindSafe(async move { execute().await })
            .catch_unwind()
            .await;
        drop(permit);

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("Queued request panicked: {}", message);
                Err(SearchError::TaskPanicked(message))
            }
        }
    }

    async fn wait_for_slot(&self) -> Result<OwnedSemaphorePermit, SearchError> {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let _pending = PendingGuard(&self.inner.pending);

        let mut gate = self.inner.gate.lock().await;
        if let Some(last) = gate.last_dispatch {
            let ready_at = last + self.inner.min_spacing;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        // Taken after the spacing wait so `in_flight` only counts running tasks.
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SearchError::QueueClosed)?;
        gate.last_dispatch = Some(Instant::now());
        Ok(permit)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn dispatches_respect_min_spacing() {
        let queue = RequestQueue::new(4, Duration::from_millis(100));
        let starts = Arc::new(StdMutex::new(Vec::new()));

        let tasks = (0..3).map(|_| {
            let queue = queue.clone();
            let starts = starts.clone();
            async move {
                queue
                    .enqueue(move || async move {
                        starts.lock().unwrap().push(Instant::now());
                        Ok::<_, SearchError>(())
                    })
                    .await
            }
        });
        for result in join_all(tasks).await {
            assert!(result.is_ok());
        }

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_concurrency_limit() {
        let queue = RequestQueue::new(2, Duration::ZERO);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6).map(|_| {
            let queue = queue.clone();
            let current = current.clone();
            let peak = peak.clone();
            let observer = queue.clone();
            async move {
                queue
                    .enqueue(move || async move {
                        let running = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(running, Ordering::SeqCst);
                        assert!(observer.in_flight() <= 2);
                        sleep(Duration::from_millis(50)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, SearchError>(())
                    })
                    .await
            }
        });
        let results = join_all(tasks).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_wait_is_pending_not_in_flight() {
        let queue = RequestQueue::new(2, Duration::from_millis(100));

        let first = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .enqueue(|| async {
                        sleep(Duration::from_secs(1)).await;
                        Ok::<_, SearchError>(())
                    })
                    .await
            }
        });
        sleep(Duration::from_millis(1)).await;
        let second = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(|| async { Ok::<_, SearchError>(()) }).await }
        });
        sleep(Duration::from_millis(10)).await;

        assert_eq!(queue.in_flight(), 1);
        assert_eq!(queue.pending(), 1);

        assert!(second.await.unwrap().is_ok());
        assert!(first.await.unwrap().is_ok());
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_tasks_in_enqueue_order() {
        let queue = RequestQueue::new(1, Duration::ZERO);
        let order = Arc::new(StdMutex::new(Vec::new()));

        let tasks = (0..5).map(|idx| {
            let queue = queue.clone();
            let order = order.clone();
            async move {
                queue
                    .enqueue(move || async move {
                        order.lock().unwrap().push(idx);
                        sleep(Duration::from_millis(10)).await;
                        Ok::<_, SearchError>(idx)
                    })
                    .await
            }
        });
        let results: Vec<usize> = join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();

        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_reach_only_their_caller() {
        let queue = RequestQueue::new(2, Duration::from_millis(5));

        let failing = queue.enqueue(|| async {
            Err::<u32, _>(SearchError::Status(reqwest::StatusCode::BAD_GATEWAY))
        });
        let panicking = queue.enqueue(|| async {
            if true {
                panic!("boom");
            }
            Ok::<u32, SearchError>(0)
        });
        let odd_panic = queue.enqueue(|| async {
            if true {
                std::panic::panic_any(42_u8);
            }
            Ok::<u32, SearchError>(0)
        });
        let healthy = queue.enqueue(|| async { Ok::<u32, SearchError>(7) });

        let (failing, panicking, odd_panic, healthy) =
            tokio::join!(failing, panicking, odd_panic, healthy);

        assert!(matches!(failing, Err(SearchError::Status(status)) if status.as_u16() == 502));
        match panicking {
            Err(SearchError::TaskPanicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match odd_panic {
            Err(SearchError::TaskPanicked(message)) => assert_eq!(message, "Unknown error"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(healthy.unwrap(), 7);
        assert_eq!(queue.in_flight(), 0);
    }
}
