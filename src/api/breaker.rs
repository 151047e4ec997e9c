use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
        }
    }
}

/// Read-only view of the breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStatus {
    pub is_open: bool,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
}

/// What the breaker says about the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Closed,
    /// Open, but the cooldown has elapsed; one probe call is let through.
    HalfOpen,
    Rejected,
}

#[derive(Debug, Default)]
struct State {
    is_open: bool,
    consecutive_failures: u32,
    // Set whenever `is_open` is.
    opened_at: Option<DateTime<Utc>>,
}

/// Consecutive-failure circuit breaker shared by every client in the process.
///
/// - Counts failures of whole calls, not of individual attempts
/// - Opens at `failure_threshold`, stamping `opened_at`
/// - Once `open_duration` has passed the next call probes; success closes the
///   breaker, failure re-opens it with a fresh `opened_at`
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_duration(&self) -> TimeDelta {
        TimeDelta::from_std(self.cfg.open_duration).unwrap_or(TimeDelta::MAX)
    }

    pub fn check(&self) -> Admission {
        let st = self.lock();
        match (st.is_open, st.opened_at) {
            (true, Some(opened_at)) => {
                if self.clock.now() - opened_at > self.open_duration() {
                    Admission::HalfOpen
                } else {
                    Admission::Rejected
                }
            }
            // Open without a timestamp cannot happen; let the call probe.
            (true, None) => Admission::HalfOpen,
            (false, _) => Admission::Closed,
        }
    }

    pub fn record_success(&self) {
        let mut st = self.lock();
        if st.is_open {
            info!(
                failures = st.consecutive_failures,
                "circuit breaker closed after successful probe"
            );
        }
        *st = State::default();
    }

    pub fn record_failure(&self) {
        let mut st = self.lock();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        if st.consecutive_failures >= self.cfg.failure_threshold {
            let now = self.clock.now();
            if st.is_open {
                warn!(failures = st.consecutive_failures, "circuit breaker re-opened");
            } else {
                warn!(
                    failures = st.consecutive_failures,
                    open_for_ms = self.cfg.open_duration.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            st.is_open = true;
            st.opened_at = Some(now);
        }
    }

    /// Unconditionally closes the breaker and forgets all failures.
    pub fn reset(&self) {
        let mut st = self.lock();
        if st.is_open || st.consecutive_failures > 0 {
            info!(failures = st.consecutive_failures, "circuit breaker reset");
        }
        *st = State::default();
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let st = self.lock();
        CircuitBreakerStatus {
            is_open: st.is_open,
            consecutive_failures: st.consecutive_failures,
            opened_at: st.opened_at,
            failure_threshold: self.cfg.failure_threshold,
        }
    }
}
