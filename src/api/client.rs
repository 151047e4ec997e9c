use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use super::backoff::RetryPolicy;
use super::breaker::{Admission, CircuitBreaker, CircuitBreakerStatus};
use super::outcome::{CallOutcome, classify};
use super::rate_limiter::RateLimiter;
use super::transport::{ApiRequest, Transport};
use crate::clock::{Sleeper, TokioSleeper};

/// Wraps a [`Transport`] with rate limiting, retry with backoff and a shared
/// circuit breaker.
///
/// Never fails with an error: every way a call can end is a [`CallOutcome`].
pub struct ResilientClient<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl<T: Transport, S: Sleeper> ResilientClient<T, S> {
    pub fn new(
        transport: T,
        sleeper: S,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            breaker,
            limiter,
            retry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Executes with the policy's default attempt count.
    pub async fn execute(&self, request: &ApiRequest) -> CallOutcome {
        self.execute_with_retries(request, self.retry.max_retries).await
    }

    /// Executes one logical call of at most `max_retries` attempts.
    ///
    /// A malformed URL is rejected before the breaker or limiter are touched.
    /// Failures count against the breaker once per call: when a non-retryable
    /// outcome arrives, or when the attempts run out. An interrupted wait
    /// returns [`Interrupted`](super::OutcomeKind::Interrupted) at once and
    /// counts for nothing.
    pub async fn execute_with_retries(&self, request: &ApiRequest, max_retries: u32) -> CallOutcome {
        if let Err(err) = Url::parse(&request.url) {
            return CallOutcome::unexpected(format!("invalid request url {:?}: {err}", request.url));
        }

        match self.breaker.check() {
            Admission::Rejected => {
                debug!(url = %request.url, "circuit open, call skipped");
                return CallOutcome::circuit_open();
            }
            Admission::HalfOpen => debug!(url = %request.url, "circuit cooldown elapsed, probing"),
            Admission::Closed => {}
        }

        let mut last: Option<CallOutcome> = None;
        for attempt in 1..=max_retries {
            if self.limiter.acquire(&self.sleeper).await.is_err() {
                return CallOutcome::interrupted();
            }

            let outcome = classify(self.transport.send(request).await);
            if outcome.is_success() {
                self.breaker.record_success();
                return outcome;
            }
            if !outcome.retryable {
                debug!(url = %request.url, kind = %outcome.kind, "non-retryable failure");
                self.breaker.record_failure();
                return outcome;
            }

            if attempt < max_retries {
                let delay = self.retry.delay_for_attempt(attempt);
                warn!(
                    url = %request.url,
                    attempt,
                    max_retries,
                    kind = %outcome.kind,
                    delay_ms = delay.as_millis() as u64,
                    "retrying API call"
                );
                if self.sleeper.sleep(delay).await.is_err() {
                    return CallOutcome::interrupted();
                }
            }
            last = Some(outcome);
        }

        warn!(url = %request.url, max_retries, "API call exhausted its attempts");
        self.breaker.record_failure();
        last.unwrap_or_else(CallOutcome::max_retries_exceeded)
    }

    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.breaker.status()
    }

    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::breaker::CircuitBreakerConfig;
    use crate::api::outcome::OutcomeKind;
    use crate::api::transport::TransportError;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::clock::{Clock, ManualClock, ManualSleeper};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    struct Harness {
        client: ResilientClient<ScriptedTransport, ManualSleeper>,
        clock: ManualClock,
    }

    impl Harness {
        fn new(responses: Vec<crate::api::transport::TransportResult>) -> Self {
            Self::with_threshold(responses, 5)
        }

        fn with_threshold(responses: Vec<crate::api::transport::TransportResult>, threshold: u32) -> Self {
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
            let shared: Arc<dyn Clock> = Arc::new(clock.clone());
            let breaker = Arc::new(CircuitBreaker::new(
                CircuitBreakerConfig {
                    failure_threshold: threshold,
                    open_duration: Duration::from_secs(60),
                },
                Arc::clone(&shared),
            ));
            let limiter = Arc::new(RateLimiter::new(Duration::from_millis(2000), shared));
            let client = ResilientClient::new(
                ScriptedTransport::sequence(responses),
                ManualSleeper::new(clock.clone()),
                breaker,
                limiter,
                RetryPolicy::default(),
            );
            Self { client, clock }
        }

        fn request() -> ApiRequest {
            ApiRequest::new("https://api.example.test/faction/7/members", "key")
        }

        async fn call(&self) -> CallOutcome {
            self.client.execute(&Self::request()).await
        }
    }

    fn ok() -> crate::api::transport::TransportResult {
        ScriptedTransport::json(r#"{"members":[]}"#)
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let h = Harness::new(vec![ok()]);
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::Success);
        assert_eq!(h.client.transport.calls(), 1);
        assert!(h.client.sleeper().slept().is_empty());
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn retryable_then_success_backs_off() {
        let h = Harness::new(vec![
            ScriptedTransport::status(503),
            Err(TransportError::Timeout),
            ok(),
        ]);
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::Success);
        assert_eq!(h.client.transport.calls(), 3);
        // Backoff sleeps cover the 2s rate-limit spacing, so no extra waits.
        assert_eq!(
            h.client.sleeper().slept(),
            vec![Duration::from_millis(2000), Duration::from_millis(4000)]
        );
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn non_retryable_returns_immediately_and_counts() {
        let h = Harness::new(vec![ScriptedTransport::status(401), ok()]);
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::AuthNError);
        assert_eq!(h.client.transport.calls(), 1);
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_outcome() {
        let h = Harness::new(vec![
            ScriptedTransport::status(500),
            ScriptedTransport::status(502),
            ScriptedTransport::status(429),
        ]);
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::RateLimited);
        assert_eq!(outcome.status, Some(429));
        assert_eq!(h.client.transport.calls(), 3);
        assert_eq!(h.client.sleeper().slept().len(), 2);
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn zero_attempts_is_max_retries_exceeded() {
        let h = Harness::new(vec![ok()]);
        let outcome = h.client.execute_with_retries(&Harness::request(), 0).await;
        assert_eq!(outcome.kind, OutcomeKind::MaxRetriesExceeded);
        assert_eq!(h.client.transport.calls(), 0);
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_skips_network() {
        let h = Harness::with_threshold((0..5).map(|_| ScriptedTransport::status(404)).collect(), 5);
        for _ in 0..4 {
            assert_eq!(h.call().await.kind, OutcomeKind::NotFound);
            assert!(!h.client.circuit_breaker_status().is_open);
        }
        assert_eq!(h.call().await.kind, OutcomeKind::NotFound);
        let status = h.client.circuit_breaker_status();
        assert!(status.is_open);
        assert_eq!(status.opened_at, Some(h.clock.now()));

        let calls_before = h.client.transport.calls();
        let slept_before = h.client.sleeper().slept().len();
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::CircuitOpen);
        assert_eq!(h.client.transport.calls(), calls_before);
        assert_eq!(h.client.sleeper().slept().len(), slept_before);
    }

    #[tokio::test]
    async fn half_open_probe_success_closes() {
        let mut responses: Vec<_> = (0..2).map(|_| ScriptedTransport::status(403)).collect();
        responses.push(ok());
        let h = Harness::with_threshold(responses, 2);
        h.call().await;
        h.call().await;
        assert!(h.client.circuit_breaker_status().is_open);

        h.clock.advance(Duration::from_secs(61));
        let outcome = h.call().await;
        assert_eq!(outcome.kind, OutcomeKind::Success);
        let status = h.client.circuit_breaker_status();
        assert!(!status.is_open);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let h = Harness::with_threshold((0..3).map(|_| ScriptedTransport::status(400)).collect(), 2);
        h.call().await;
        h.call().await;
        let first = h.client.circuit_breaker_status().opened_at.unwrap();

        h.clock.advance(Duration::from_secs(61));
        assert_eq!(h.call().await.kind, OutcomeKind::ClientError);
        let status = h.client.circuit_breaker_status();
        assert!(status.is_open);
        assert!(status.opened_at.unwrap() > first);
        assert_eq!(h.call().await.kind, OutcomeKind::CircuitOpen);
    }

    #[tokio::test]
    async fn interrupted_backoff_stops_retrying() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let client = ResilientClient::new(
            ScriptedTransport::sequence(vec![ScriptedTransport::status(500), ok()]),
            ManualSleeper::new(clock).interrupt_after(0),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default(), Arc::clone(&shared))),
            Arc::new(RateLimiter::new(Duration::from_millis(2000), shared)),
            RetryPolicy::default(),
        );
        let outcome = client.execute(&Harness::request()).await;
        assert_eq!(outcome.kind, OutcomeKind::Interrupted);
        assert_eq!(client.transport.calls(), 1);
        assert_eq!(client.circuit_breaker_status().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn invalid_url_is_unexpected_without_side_effects() {
        let h = Harness::new(vec![ok()]);
        let outcome = h.client.execute(&ApiRequest::new("not a url", "key")).await;
        assert_eq!(outcome.kind, OutcomeKind::UnexpectedError);
        assert!(!outcome.retryable);
        assert_eq!(h.client.transport.calls(), 0);
        assert_eq!(h.client.circuit_breaker_status().consecutive_failures, 0);
        assert!(h.client.limiter.last_call_at().await.is_none());
    }

    #[tokio::test]
    async fn consecutive_calls_are_rate_limited() {
        let h = Harness::new(vec![ok(), ok()]);
        h.call().await;
        h.call().await;
        assert_eq!(h.client.sleeper().slept(), vec![Duration::from_millis(2000)]);
    }

    #[tokio::test]
    async fn reset_reopens_traffic() {
        let h = Harness::with_threshold(vec![ScriptedTransport::status(401), ok()], 1);
        h.call().await;
        assert_eq!(h.call().await.kind, OutcomeKind::CircuitOpen);
        h.client.reset_circuit_breaker();
        assert_eq!(h.call().await.kind, OutcomeKind::Success);
    }
}
