// src/cancel.rs
//! Run-wide cancellation signal.
//!
//! Every suspension point of a run (pacer delay, backoff delay, in-flight
//! request) races against a [`CancelToken`], so cancelling aborts waits
//! promptly instead of after the current sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Returned by cancellable waits when the token fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run cancelled")]
pub struct Cancelled;

impl From<Cancelled> for crate::error::FetchError {
    fn from(_: Cancelled) -> Self {
        crate::error::FetchError::Cancelled
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|c| *c).await;
    }

    /// Sleep for `dur` unless cancelled first.
    pub async fn sleep(&self, dur: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(dur) => Ok(()),
        }
    }

    /// A token that is cancelled whenever `self` is, but can also be
    /// cancelled on its own without touching `self`.
    ///
    /// Must be called inside a tokio runtime. The link task ends as soon as
    /// either side is cancelled.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        let parent = self.clone();
        let link = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => link.cancel(),
                _ = link.cancelled() => {}
            }
        });
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_follows_parent_but_not_the_other_way() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child2 = parent.child();
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child2.cancelled())
            .await
            .expect("child should observe parent cancellation");
        assert!(child2.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_returns_early_on_cancel() {
        let token = CancelToken::new();
        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            t.cancel();
        });
        let started = tokio::time::Instant::now();
        let res = token.sleep(Duration::from_secs(3600)).await;
        assert_eq!(res, Err(Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert_eq!(token.sleep(Duration::from_secs(10)).await, Ok(()));
    }
}
