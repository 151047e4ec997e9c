use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, Interrupted, Sleeper};

/// Minimum spacing between call starts, shared by all holders.
///
/// The lock is held across the wait, so concurrent callers queue up and each
/// one starts at least `min_interval` after the previous.
pub struct RateLimiter {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_call_at: Mutex<Option<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            clock,
            last_call_at: Mutex::new(None),
        }
    }

    /// Waits for the slot, then stamps `last_call_at = now`.
    pub async fn acquire<S: Sleeper>(&self, sleeper: &S) -> Result<(), Interrupted> {
        let mut last = self.last_call_at.lock().await;
        if let Some(previous) = *last {
            // A clock that went backwards counts as no time elapsed.
            let elapsed = (self.clock.now() - previous)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
                sleeper.sleep(wait).await?;
            }
        }
        *last = Some(self.clock.now());
        Ok(())
    }

    pub async fn last_call_at(&self) -> Option<DateTime<Utc>> {
        *self.last_call_at.lock().await
    }
}
