//! Resettable, asynchronously awaitable latch.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// A binary, level-triggered, asynchronously awaitable latch.
///
/// Once [`set`](AsyncSignal::set), all current and future waiters observe
/// the signal until [`reset`](AsyncSignal::reset) re-arms it. Reset is
/// race-safe: it only re-arms when the latch is currently set, and waiters
/// that subscribed before the reset still observe the set value, so a
/// set-then-reset pulse never loses a wakeup.
///
/// Internally each armed period is one `tokio::sync::watch` generation; a
/// reset atomically swaps in a fresh generation while the old one keeps its
/// final (set) value for anyone still holding it.
pub struct AsyncSignal {
    tx: Mutex<watch::Sender<bool>>,
}

impl AsyncSignal {
    /// Create a latch, initially set or unset.
    pub fn new(signaled: bool) -> Self {
        let (tx, _rx) = watch::channel(signaled);
        Self { tx: Mutex::new(tx) }
    }

    /// Mark the latch signaled. Idempotent; wakes every current waiter of
    /// the current generation.
    pub fn set(&self) {
        let tx = self.tx.lock().unwrap();
        tx.send_replace(true);
    }

    /// Re-arm the latch, but only if it is currently set. A reset racing a
    /// concurrent `set` never clobbers the fresh signal: the generation that
    /// was set stays set for everyone who subscribed to it.
    pub fn reset(&self) {
        let mut tx = self.tx.lock().unwrap();
        if *tx.borrow() {
            let (fresh, _rx) = watch::channel(false);
            *tx = fresh;
        }
    }

    /// Whether the latch is currently set.
    pub fn is_set(&self) -> bool {
        *self.tx.lock().unwrap().borrow()
    }

    /// Subscribe to the current generation. The returned waiter observes a
    /// later `set` of this generation even if a `reset` follows before it
    /// polls, which lets callers capture a waiter under a lock and await
    /// outside it without missing a pulse.
    pub fn waiter(&self) -> SignalWaiter {
        SignalWaiter {
            rx: self.tx.lock().unwrap().subscribe(),
        }
    }

    /// Suspend until the latch is set or `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        self.waiter().wait(cancel).await
    }

    /// Suspend until the latch is set, `timeout` elapses, or `cancel`
    /// fires. Returns whether the latch became set.
    pub async fn wait_timeout(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.waiter().wait_timeout(timeout, cancel).await
    }
}

impl std::fmt::Debug for AsyncSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

/// A waiter pinned to one generation of an [`AsyncSignal`].
pub struct SignalWaiter {
    rx: watch::Receiver<bool>,
}

impl SignalWaiter {
    /// Suspend until the subscribed generation is set or `cancel` fires.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            res = self.rx.wait_for(|set| *set) => match res {
                Ok(_) => Ok(()),
                // Signal dropped while unset: nothing will ever set it.
                Err(_) => Err(Error::Cancelled),
            },
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Suspend until the subscribed generation is set, `timeout` elapses,
    /// or `cancel` fires. Returns whether it became set.
    pub async fn wait_timeout(
        mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            res = self.rx.wait_for(|set| *set) => match res {
                Ok(_) => Ok(true),
                Err(_) => Err(Error::Cancelled),
            },
            _ = tokio::time::sleep(timeout) => Ok(false),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn no_cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_set() {
        let sig = AsyncSignal::new(true);
        sig.wait(&no_cancel()).await.unwrap();
    }

    #[tokio::test]
    async fn wait_timeout_expires_when_unset() {
        let sig = AsyncSignal::new(false);
        let signaled = sig
            .wait_timeout(Duration::from_millis(20), &no_cancel())
            .await
            .unwrap();
        assert!(!signaled);
    }

    #[tokio::test]
    async fn set_wakes_pending_waiter() {
        let sig = Arc::new(AsyncSignal::new(false));
        let waiting = {
            let sig = Arc::clone(&sig);
            tokio::spawn(async move { sig.wait(&no_cancel()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        sig.set();
        waiting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn set_wakes_every_waiter() {
        let sig = Arc::new(AsyncSignal::new(false));
        let waiters: Vec<_> = (0..32)
            .map(|_| {
                let sig = Arc::clone(&sig);
                tokio::spawn(async move { sig.wait(&no_cancel()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        sig.set();
        for w in waiters {
            w.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn reset_is_noop_when_unset() {
        let sig = AsyncSignal::new(false);
        sig.reset();
        assert!(!sig.is_set());
        sig.set();
        assert!(sig.is_set());
        sig.reset();
        assert!(!sig.is_set());
    }

    #[tokio::test]
    async fn set_is_idempotent() {
        let sig = AsyncSignal::new(false);
        sig.set();
        sig.set();
        assert!(sig.is_set());
        sig.wait(&no_cancel()).await.unwrap();
    }

    #[tokio::test]
    async fn pulse_reaches_waiter_captured_before_it() {
        // A waiter subscribed before a set+reset pulse must still observe
        // the set, while a waiter subscribed after sees the re-armed latch.
        let sig = AsyncSignal::new(false);
        let early = sig.waiter();
        sig.set();
        sig.reset();
        early.wait(&no_cancel()).await.unwrap();

        let late = sig.waiter();
        let signaled = late
            .wait_timeout(Duration::from_millis(20), &no_cancel())
            .await
            .unwrap();
        assert!(!signaled);
    }

    #[tokio::test]
    async fn cancellation_affects_only_the_cancelled_caller() {
        let sig = Arc::new(AsyncSignal::new(false));
        let cancel = CancellationToken::new();

        let cancelled = {
            let sig = Arc::clone(&sig);
            let cancel = cancel.clone();
            tokio::spawn(async move { sig.wait(&cancel).await })
        };
        let surviving = {
            let sig = Arc::clone(&sig);
            tokio::spawn(async move { sig.wait(&no_cancel()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert!(matches!(cancelled.await.unwrap(), Err(Error::Cancelled)));
        assert!(!sig.is_set());

        sig.set();
        surviving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wait_fails_fast_when_already_cancelled() {
        let sig = AsyncSignal::new(true);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(sig.wait(&cancel).await, Err(Error::Cancelled)));
    }
}
