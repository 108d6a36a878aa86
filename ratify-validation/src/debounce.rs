//! Trailing-edge debouncing.
//!
//! A [`Debouncer`] coalesces a burst of attempts into one trailing call made
//! with the arguments of the last attempt. Every attempt gets a receiver that
//! resolves with the outcome of that trailing call, or with `Ok(())` if the
//! burst is cancelled.

use crate::Settled;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

/// The coalesced burst handed to the trailing call.
#[derive(Debug)]
pub struct Fired<A> {
    /// Arguments of the last attempt
    pub args: A,
    /// Number of attempts collapsed into this call
    pub attempts: usize,
}

struct DebounceState<A> {
    round: u64,
    timer: Option<JoinHandle<()>>,
    args: Option<A>,
    attempts: usize,
    waiters: Vec<oneshot::Sender<Settled>>,
}

/// Debouncer for one rule slot
pub struct Debouncer<A> {
    window: Duration,
    state: Mutex<DebounceState<A>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new(window: Duration) -> Arc<Self> {
        Arc::new(Self {
            window,
            state: Mutex::new(DebounceState {
                round: 0,
                timer: None,
                args: None,
                attempts: 0,
                waiters: Vec::new(),
            }),
        })
    }

    /// Record an attempt and re-arm the trailing timer.
    ///
    /// `on_fire` from the latest attempt runs when the window elapses. Must
    /// be called from within a Tokio runtime.
    pub fn attempt<F>(self: &Arc<Self>, args: A, on_fire: F) -> oneshot::Receiver<Settled>
    where
        F: FnOnce(Fired<A>) -> BoxFuture<'static, Settled> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();

        state.round += 1;
        state.args = Some(args);
        state.attempts += 1;
        state.waiters.push(tx);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let round = state.round;
        let window = self.window;
        let debouncer = Arc::clone(self);
        trace!(round, attempts = state.attempts, "debounce armed");

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some((fired, waiters)) = debouncer.take(round) else {
                return;
            };
            let outcome = on_fire(fired).await;
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }));

        rx
    }

    fn take(&self, round: u64) -> Option<(Fired<A>, Vec<oneshot::Sender<Settled>>)> {
        let mut state = self.state.lock();
        if state.round != round {
            return None;
        }
        // the trailing call is now running; later attempts start a new burst
        // instead of aborting it
        state.timer = None;
        let args = state.args.take()?;
        let attempts = mem::take(&mut state.attempts);
        let waiters = mem::take(&mut state.waiters);
        Some((Fired { args, attempts }, waiters))
    }

    /// Drop the pending burst, resolving its callers with `Ok(())`.
    ///
    /// Returns the number of attempts that were discarded.
    pub fn cancel(&self) -> usize {
        let mut state = self.state.lock();
        state.round += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.args = None;
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
        mem::take(&mut state.attempts)
    }

    /// Whether a trailing call is scheduled.
    pub fn is_armed(&self) -> bool {
        self.state.lock().timer.is_some()
    }

    /// Attempts collected in the current burst.
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }
}
