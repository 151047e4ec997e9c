pub mod backoff;
pub mod breaker;
pub mod client;
pub mod outcome;
pub mod rate_limiter;
pub mod transport;
pub mod types;

pub use backoff::RetryPolicy;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus};
pub use client::ResilientClient;
pub use outcome::{CallOutcome, OutcomeKind, classify};
pub use rate_limiter::RateLimiter;
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport, TransportError};
