//! A cheaply-cloneable, fire-once cancellation signal shared between the
//! Scheduler and every in-flight [`crate::Child`] it owns. Grounded in
//! `process/child.rs`'s `ShutdownStyle` signaling, generalized so a
//! Scheduler-level draining decision (spec.md §4.6) and a per-task timeout
//! escalate through the exact same TERM -> grace -> KILL path in
//! `Child::run`.

use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    notify: Notify,
    cancelled: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<Inner>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0
            .cancelled
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Resolves immediately if already cancelled, otherwise waits for the
    /// next [`Self::cancel`] call.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.0.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_if_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancelled().await;
    }

    #[test]
    fn clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
