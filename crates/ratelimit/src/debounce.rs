//! Debounce with a dedicated timer task per instance.
//!
//! Calls are pushed into an unbounded channel together with the instant they were made. The worker
//! task arms a timer for `call instant + delay` on the first call and re-arms it on every later
//! call, keeping only the newest arguments. The action runs once the timer elapses without a newer
//! call. The action runs inside the worker, so a second firing can only start after the first one
//! returned; a call made during a firing whose deadline has already passed fires right after it.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Debounced action that receives the arguments of the most recent call.
///
/// Intermediate argument sets are discarded. After [`cancel`](Self::cancel), [`stop`](Self::stop)
/// or drop, pending arguments are abandoned and later calls are ignored.
pub struct DebounceWithArgs<A> {
    delay: Duration,
    tx: mpsc::UnboundedSender<(Instant, A)>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Send + 'static> DebounceWithArgs<A> {
    /// Creates a debounce that runs `action` `delay` after the last call of a burst.
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_cancellation(delay, CancellationToken::new(), action)
    }

    /// Like [`new`](Self::new), but the debounce also stops when `parent` is cancelled.
    pub fn with_cancellation<F, Fut>(delay: Duration, parent: CancellationToken, action: F) -> Self
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(delay, rx, cancel.clone(), action));
        Self {
            delay,
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Records `args` as the pending arguments and (re)arms the timer. Never blocks.
    pub fn call(&self, args: A) {
        if self.cancel.is_cancelled() {
            trace!("debounce stopped; call ignored");
            return;
        }
        if self.tx.send((Instant::now(), args)).is_err() {
            trace!("debounce worker gone; call ignored");
        }
    }

    /// Signals the worker to drop any armed timer and exit. Does not wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the debounce and waits until the worker has exited.
    ///
    /// A firing that already started runs to completion before this returns; a pending one is dropped.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(worker) = self.take_worker() {
            if let Err(e) = worker.await {
                debug!(error = %e, "debounce worker ended abnormally");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl<A> Drop for DebounceWithArgs<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Zero-argument debounce, e.g. for refreshing a typing indicator.
pub struct Debounce {
    inner: DebounceWithArgs<()>,
}

impl Debounce {
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_cancellation(delay, CancellationToken::new(), action)
    }

    pub fn with_cancellation<F, Fut>(delay: Duration, parent: CancellationToken, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: DebounceWithArgs::with_cancellation(delay, parent, move |()| action()),
        }
    }

    pub fn call(&self) {
        self.inner.call(());
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay()
    }
}

async fn run_worker<A, F, Fut>(
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<(Instant, A)>,
    cancel: CancellationToken,
    mut action: F,
) where
    F: FnMut(A) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        // Idle: nothing armed.
        let (called_at, mut pending) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = rx.recv() => match next {
                Some(call) => call,
                None => return,
            },
        };

        let timer = sleep_until(called_at + delay);
        tokio::pin!(timer);

        // Armed: every newer call replaces the arguments and pushes the deadline out.
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("debounce cancelled with a pending call");
                    return;
                }
                next = rx.recv() => match next {
                    Some((called_at, args)) => {
                        pending = args;
                        timer.as_mut().reset(called_at + delay);
                    }
                    None => return,
                },
                () = &mut timer => break,
            }
        }

        action(pending).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_single_call_fires_after_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let debounce = Debounce::new(Duration::from_millis(100), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        debounce.call();
        sleep(Duration::from_millis(99)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_cancel_is_ignored() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let debounce = DebounceWithArgs::new(Duration::from_millis(10), move |_: u8| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        debounce.cancel();
        assert!(debounce.is_stopped());
        debounce.call(1);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delay_accessor() {
        let debounce = Debounce::new(Duration::from_secs(10), || async {});
        assert_eq!(debounce.delay(), Duration::from_secs(10));
        debounce.stop().await;
        assert!(debounce.is_stopped());
    }
}
