//! Broadcast-once cancellation: subscribers register for a notification that
//! fires exactly once, when the process receives SIGINT or the handler is
//! closed explicitly. Used by the Scheduler to begin draining in-flight
//! tasks (spec.md §4.6's cancellation/draining behavior) without every
//! component polling a shared flag.

use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, Mutex},
};

use futures::{stream::FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub struct SignalHandler {
    state: Arc<Mutex<HandlerState>>,
    close: mpsc::Sender<()>,
}

#[derive(Debug, Default)]
struct HandlerState {
    subscribers: Vec<oneshot::Sender<oneshot::Sender<()>>>,
    is_closing: bool,
}

pub struct SignalSubscriber(oneshot::Receiver<oneshot::Sender<()>>);

/// Held by a subscriber until it has finished reacting to the signal.
pub struct SubscriberGuard(oneshot::Sender<()>);

impl SignalHandler {
    /// Builds a handler wired to the process's Ctrl-C signal.
    pub fn new_from_ctrlc() -> Self {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        if ctrlc::set_handler(move || {
            if let Some(tx) = tx.lock().expect("not poisoned").take() {
                let _ = tx.send(());
            }
        })
        .is_err()
        {
            tracing::warn!("failed to install Ctrl-C handler; cancellation via signal is disabled");
        }
        Self::new(async move { rx.await.ok() })
    }

    /// Alerts subscribers when `signal_source` completes or `close` is called.
    pub fn new(signal_source: impl Future<Output = Option<()>> + Send + 'static) -> Self {
        let state = Arc::new(Mutex::new(HandlerState::default()));
        let worker_state = state.clone();
        let (close, mut rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            tokio::select! {
                _ = signal_source => {},
                _ = rx.recv() => {}
            }

            let mut callbacks = {
                let mut state = worker_state.lock().expect("lock poisoned");
                state.is_closing = true;
                state
                    .subscribers
                    .drain(..)
                    .filter_map(|callback| {
                        let (tx, rx) = oneshot::channel();
                        callback.send(tx).ok()?;
                        Some(rx)
                    })
                    .collect::<FuturesUnordered<_>>()
            };

            while let Some(_fut) = callbacks.next().await {}
        });

        Self { state, close }
    }

    /// Returns `None` once the handler has begun (or finished) shutting down.
    pub fn subscribe(&self) -> Option<SignalSubscriber> {
        self.state
            .lock()
            .expect("poisoned lock")
            .add_subscriber()
            .map(SignalSubscriber)
    }

    pub async fn close(&self) {
        if self.close.send(()).await.is_err() {
            return;
        }
        self.done().await;
    }

    pub async fn done(&self) {
        self.close.closed().await;
    }

    #[cfg(test)]
    fn is_done(&self) -> bool {
        self.close.is_closed()
    }
}

impl SignalSubscriber {
    pub async fn listen(self) -> SubscriberGuard {
        let callback = self
            .0
            .await
            .expect("signal handler worker thread exited without alerting subscribers");
        SubscriberGuard(callback)
    }
}

impl HandlerState {
    fn add_subscriber(&mut self) -> Option<oneshot::Receiver<oneshot::Sender<()>>> {
        (!self.is_closing).then(|| {
            let (tx, rx) = oneshot::channel();
            self.subscribers.push(tx);
            rx
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn subscribers_are_triggered_from_signal() {
        let (tx, rx) = oneshot::channel();
        let handler = SignalHandler::new(async move { rx.await.ok() });
        let subscriber = handler.subscribe().unwrap();
        tx.send(()).unwrap();

        let (done, mut is_done) = oneshot::channel();
        let handler2 = handler.clone();
        tokio::spawn(async move {
            handler2.done().await;
            done.send(()).ok();
        });

        let guard = subscriber.listen().await;
        assert!(matches!(is_done.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        drop(guard);
        tokio::time::sleep(Duration::from_millis(5)).await;
        handler.done().await;
    }

    #[tokio::test]
    async fn subscribers_are_triggered_from_close() {
        let (_tx, rx) = oneshot::channel::<()>();
        let handler = SignalHandler::new(async move { rx.await.ok() });
        let subscriber = handler.subscribe().unwrap();
        let (close_done, mut is_close_done) = oneshot::channel();

        let h2 = handler.clone();
        tokio::spawn(async move {
            h2.close().await;
            close_done.send(()).ok();
        });

        let guard = subscriber.listen().await;
        assert!(matches!(
            is_close_done.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
        drop(guard);
        handler.done().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_tx, rx) = oneshot::channel::<()>();
        let handler = SignalHandler::new(async move { rx.await.ok() });
        handler.close().await;
        handler.close().await;
    }

    #[tokio::test]
    async fn subscribe_after_close_is_refused() {
        let (tx, rx) = oneshot::channel();
        let handler = SignalHandler::new(async move { rx.await.ok() });
        let subscriber = handler.subscribe().unwrap();

        tx.send(()).unwrap();
        tokio::task::yield_now().await;
        assert!(!handler.is_done());
        assert!(handler.subscribe().is_none());
        let guard = subscriber.listen().await;
        drop(guard);
        handler.done().await;
    }
}
