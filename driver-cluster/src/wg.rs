//! Countdown completion signal for batches of cluster mutations

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

/// Wait-group style counter
///
/// Callers `add` the number of pending operations, each operation calls
/// `done` once, and `wait` resolves when the counter drops to zero.
#[derive(Debug, Clone, Default)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.inner.count.fetch_add(n, Ordering::AcqRel);
    }

    /// # Panics
    ///
    /// If called more times than added.
    pub fn done(&self) {
        let prev = self.inner.count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "WaitGroup::done called more times than added");
        if prev == 1 {
            self.inner.notify.notify_waiters();
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent done() is not missed
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks a wait group done when dropped, including during unwinding
pub(crate) struct DoneOnDrop(Option<WaitGroup>);

impl DoneOnDrop {
    pub(crate) const fn new(wg: Option<WaitGroup>) -> Self {
        Self(wg)
    }
}

impl Drop for DoneOnDrop {
    fn drop(&mut self) {
        if let Some(wg) = self.0.take() {
            wg.done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_empty() {
        let wg = WaitGroup::new();
        tokio::time::timeout(Duration::from_secs(1), wg.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_spawned_tasks() {
        let wg = WaitGroup::new();
        wg.add(3);

        for _ in 0..3 {
            let wg = wg.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                wg.done();
            });
        }

        tokio::time::timeout(Duration::from_secs(1), wg.wait())
            .await
            .unwrap();
        assert_eq!(wg.count(), 0);
    }

    #[test]
    fn test_done_on_drop_survives_panic() {
        let wg = WaitGroup::new();
        wg.add(1);

        let cloned = wg.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _done = DoneOnDrop::new(Some(cloned));
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(wg.count(), 0);
    }

    #[test]
    #[should_panic(expected = "more times than added")]
    fn test_done_underflow_panics() {
        WaitGroup::new().done();
    }
}
