//! Externally settleable futures.
//!
//! [`cancellable`] returns a [`Canceller`] and a [`CancellableFuture`]. The
//! canceller can resolve the future from anywhere, at most once; the engine
//! races whole-form validation against it so a reset can settle the outward
//! future without waiting for straggling rules.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Create a linked canceller and future.
pub fn cancellable<T>() -> (Canceller<T>, CancellableFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Canceller {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        CancellableFuture { rx },
    )
}

/// Handle that settles a [`CancellableFuture`].
pub struct Canceller<T> {
    tx: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Canceller<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Canceller<T> {
    /// Settle the future with `value`. Returns `false` if it was already
    /// settled or the future is gone.
    pub fn resolve(&self, value: T) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether [`resolve`](Self::resolve) has been called.
    pub fn is_settled(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Whether both handles settle the same future.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.tx, &b.tx)
    }
}

/// Future settled by its [`Canceller`].
///
/// Resolves to `None` if every canceller is dropped without resolving.
pub struct CancellableFuture<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> CancellableFuture<T> {
    /// Drive `work` to completion unless the canceller settles first.
    pub async fn race<F>(mut self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            Ok(value) = &mut self.rx => value,
            value = work => value,
        }
    }
}

impl<T> Future for CancellableFuture<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}
