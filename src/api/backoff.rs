use std::time::Duration;

/// Bounded exponential backoff between attempts of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call unless the caller overrides it.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based attempt:
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let initial_ms = self.initial_delay.as_millis() as f64;
        let cap_ms = self.max_delay.as_millis() as f64;
        let delay_ms = initial_ms * self.multiplier.max(1.0).powi(exponent);
        if !delay_ms.is_finite() || delay_ms >= cap_ms {
            self.max_delay
        } else {
            Duration::from_millis(delay_ms as u64)
        }
    }
}
