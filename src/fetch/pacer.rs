// src/fetch/pacer.rs
//! Inter-request delay for one term stream.
//!
//! Each stream owns its own pacer, so running terms in parallel never
//! increases request density within a stream.

use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::{CancelToken, Cancelled};

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    last: Option<Instant>,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait until at least `delay` has passed since the previous turn, then
    /// take the turn. The first turn never waits.
    pub async fn wait_turn(&mut self, cancel: &CancelToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if let Some(last) = self.last {
            match last.checked_add(self.delay) {
                Some(ready_at) => {
                    let now = Instant::now();
                    if ready_at > now {
                        cancel.sleep(ready_at - now).await?;
                    }
                }
                // Past the clock's range: the turn never comes.
                None => {
                    cancel.cancelled().await;
                    return Err(Cancelled);
                }
            }
        }
        self.last = Some(Instant::now());
        Ok(())
    }
}
