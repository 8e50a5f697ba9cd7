//! Cancellation for batch runs
//!
//! Workers check the token before each stage; a stage already running always
//! finishes. Waiters (the batch loop holding for a worker slot, the CLI's
//! signal watcher) can instead await [`CancellationToken::cancelled`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancel flag for one orchestrator and everything it spawned
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Set the flag and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Resolves once the token is cancelled (immediately if it already is)
    pub async fn cancelled(&self) {
        loop {
            // register before checking so a concurrent cancel() is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Drive `fut` unless cancellation comes first; `None` when cancelled.
    /// A token that is already cancelled never polls `fut`.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[test]
    fn cancel_is_visible_to_clones() {
        let token = CancellationToken::new();
        let worker_view = token.clone();
        assert!(!worker_view.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(worker_view.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiting_task() {
        let token = CancellationToken::new();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn permit_wait_gives_up_on_cancel() {
        let token = CancellationToken::new();
        let slots = Arc::new(Semaphore::new(1));
        let _busy = Arc::clone(&slots).acquire_owned().await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let waited = token.run_until_cancelled(Arc::clone(&slots).acquire_owned()).await;
        assert!(waited.is_none());
    }

    #[tokio::test]
    async fn already_cancelled_skips_work() {
        let token = CancellationToken::new();
        assert_eq!(token.run_until_cancelled(async { 7 }).await, Some(7));

        token.cancel();
        assert_eq!(token.run_until_cancelled(async { 7 }).await, None);
    }
}
