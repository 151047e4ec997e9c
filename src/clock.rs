//! Time sources and cancellable waits.
//!
//! Every suspension in the API layer goes through a [`Sleeper`], and every
//! timestamp through a [`Clock`], so tests can drive the breaker and the
//! rate limiter without touching the wall clock.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = current.checked_add_signed(delta) {
            *current = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A wait was cancelled before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait interrupted")]
pub struct Interrupted;

/// Suspends the caller for a duration, or fails with [`Interrupted`].
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = Result<(), Interrupted>> + Send;
}

/// Tokio timer that aborts as soon as its cancellation token fires.
#[derive(Debug, Clone, Default)]
pub struct TokioSleeper {
    cancel: CancellationToken,
}

impl TokioSleeper {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Sleeper that returns immediately, advancing a [`ManualClock`] instead.
///
/// Records every requested delay. After `interrupt_after` completed sleeps,
/// further sleeps fail with [`Interrupted`].
#[derive(Debug, Clone)]
pub struct ManualSleeper {
    clock: ManualClock,
    slept: Arc<Mutex<Vec<Duration>>>,
    interrupt_after: Option<usize>,
}

impl ManualSleeper {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            slept: Arc::new(Mutex::new(Vec::new())),
            interrupt_after: None,
        }
    }

    pub fn interrupt_after(mut self, completed: usize) -> Self {
        self.interrupt_after = Some(completed);
        self
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for ManualSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut slept = self.slept.lock().unwrap_or_else(PoisonError::into_inner);
        if self.interrupt_after.is_some_and(|limit| slept.len() >= limit) {
            return Err(Interrupted);
        }
        slept.push(duration);
        self.clock.advance(duration);
        Ok(())
    }
}
