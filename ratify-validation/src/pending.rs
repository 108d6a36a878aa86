// In-flight work accounting

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;

/// Counter of in-flight rule evaluations.
///
/// Every `begin(n)` must be matched by `end(n)`, otherwise `validating`
/// stays stuck.
#[derive(Debug, Default)]
pub struct PendingCounter {
    count: AtomicUsize,
}

impl PendingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, n: usize) {
        if n > 0 {
            self.count.fetch_add(n, Ordering::SeqCst);
        }
    }

    pub fn end(&self, n: usize) {
        if n == 0 {
            return;
        }
        let result = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(n)
            });
        if let Err(current) = result {
            error!(
                "pending counter underflow: ending {} with {} outstanding",
                n, current
            );
            self.count.store(0, Ordering::SeqCst);
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.count() > 0
    }
}
