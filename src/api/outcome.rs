//! Classification of raw transport results into [`CallOutcome`]s.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::transport::TransportResult;

/// Every way a logical API call can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    /// HTTP 401.
    AuthNError,
    /// HTTP 403.
    AuthZError,
    NotFound,
    RateLimited,
    ClientError,
    ServerError,
    NetworkError,
    /// Rejected locally by the circuit breaker; nothing was sent.
    CircuitOpen,
    /// A rate-limit or backoff wait was cancelled.
    Interrupted,
    MaxRetriesExceeded,
    /// The request could not be issued at all.
    UnexpectedError,
    UnknownError,
}

impl OutcomeKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            OutcomeKind::RateLimited
                | OutcomeKind::ServerError
                | OutcomeKind::NetworkError
                | OutcomeKind::UnknownError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::AuthNError => "authentication_error",
            OutcomeKind::AuthZError => "authorization_error",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::RateLimited => "rate_limited",
            OutcomeKind::ClientError => "client_error",
            OutcomeKind::ServerError => "server_error",
            OutcomeKind::NetworkError => "network_error",
            OutcomeKind::CircuitOpen => "circuit_open",
            OutcomeKind::Interrupted => "interrupted",
            OutcomeKind::MaxRetriesExceeded => "max_retries_exceeded",
            OutcomeKind::UnexpectedError => "unexpected_error",
            OutcomeKind::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempt (or of a whole call, once the client is done with it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub kind: OutcomeKind,
    pub retryable: bool,
    pub status: Option<u16>,
    pub body: Option<Bytes>,
    pub message: Option<String>,
}

impl CallOutcome {
    pub fn new(kind: OutcomeKind) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            status: None,
            body: None,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn circuit_open() -> Self {
        Self::new(OutcomeKind::CircuitOpen).with_message("circuit breaker is open")
    }

    pub fn interrupted() -> Self {
        Self::new(OutcomeKind::Interrupted).with_message("call interrupted while waiting")
    }

    pub fn max_retries_exceeded() -> Self {
        Self::new(OutcomeKind::MaxRetriesExceeded).with_message("no attempt was made")
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::UnexpectedError).with_message(message)
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    /// Decodes the body as JSON. An absent body decodes like an empty one.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body.as_deref().unwrap_or_default())
    }

    /// Short human description: the message if any, else the kind. Failures
    /// without a message fall back to their HTTP status.
    pub fn describe(&self) -> String {
        match (&self.message, self.status) {
            (Some(msg), _) => msg.clone(),
            (None, _) if self.is_success() => self.kind.to_string(),
            (None, Some(status)) => format!("HTTP {status}"),
            (None, None) => self.kind.to_string(),
        }
    }
}

/// Maps a transport result to its outcome. Rules apply in order; first match wins.
pub fn classify(result: TransportResult) -> CallOutcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => return CallOutcome::new(OutcomeKind::NetworkError).with_message(err.to_string()),
    };

    let kind = match response.status {
        200..=299 => OutcomeKind::Success,
        401 => OutcomeKind::AuthNError,
        403 => OutcomeKind::AuthZError,
        404 => OutcomeKind::NotFound,
        429 => OutcomeKind::RateLimited,
        500..=599 => OutcomeKind::ServerError,
        400..=499 => OutcomeKind::ClientError,
        _ => OutcomeKind::UnknownError,
    };

    let mut outcome = CallOutcome::new(kind);
    outcome.status = Some(response.status);
    if kind != OutcomeKind::Success {
        outcome.message = Some(format!("HTTP {}", response.status));
    }
    outcome.body = Some(response.body);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::{RawResponse, TransportError};

    fn status(code: u16) -> CallOutcome {
        classify(Ok(RawResponse::new(code, Bytes::new())))
    }

    #[test]
    fn transport_error_is_retryable_network_error() {
        let outcome = classify(Err(TransportError::Timeout));
        assert_eq!(outcome.kind, OutcomeKind::NetworkError);
        assert!(outcome.retryable);
        assert_eq!(outcome.message.as_deref(), Some("request timed out"));
        assert!(outcome.status.is_none());
    }

    #[test]
    fn success_range() {
        for code in [200, 201, 204, 299] {
            let outcome = status(code);
            assert_eq!(outcome.kind, OutcomeKind::Success, "status {code}");
            assert!(!outcome.retryable);
        }
    }

    #[test]
    fn auth_and_not_found_are_terminal() {
        assert_eq!(status(401).kind, OutcomeKind::AuthNError);
        assert_eq!(status(403).kind, OutcomeKind::AuthZError);
        assert_eq!(status(404).kind, OutcomeKind::NotFound);
        assert!(!status(401).retryable);
        assert!(!status(403).retryable);
        assert!(!status(404).retryable);
    }

    #[test]
    fn rate_limited_and_server_errors_retry() {
        assert_eq!(status(429).kind, OutcomeKind::RateLimited);
        assert!(status(429).retryable);
        for code in [500, 502, 503, 599] {
            let outcome = status(code);
            assert_eq!(outcome.kind, OutcomeKind::ServerError);
            assert!(outcome.retryable);
        }
    }

    #[test]
    fn other_client_errors_do_not_retry() {
        for code in [400, 405, 409, 422, 499] {
            let outcome = status(code);
            assert_eq!(outcome.kind, OutcomeKind::ClientError, "status {code}");
            assert!(!outcome.retryable);
        }
    }

    #[test]
    fn anything_else_is_unknown_and_retryable() {
        for code in [100, 302, 600] {
            let outcome = status(code);
            assert_eq!(outcome.kind, OutcomeKind::UnknownError, "status {code}");
            assert!(outcome.retryable);
        }
    }

    #[test]
    fn body_is_kept_for_decoding() {
        let outcome = classify(Ok(RawResponse::new(200, r#"{"ok":true}"#)));
        let value: serde_json::Value = outcome.json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn locally_built_outcomes_are_not_retryable() {
        assert!(!CallOutcome::circuit_open().retryable);
        assert!(!CallOutcome::interrupted().retryable);
        assert!(!CallOutcome::max_retries_exceeded().retryable);
        assert!(!CallOutcome::unexpected("bad url").retryable);
    }

    #[test]
    fn describe_prefers_message() {
        assert_eq!(status(503).describe(), "HTTP 503");
        assert_eq!(CallOutcome::circuit_open().describe(), "circuit breaker is open");
        assert_eq!(status(200).describe(), "success");
        assert_eq!(status(204).describe(), "success");
    }

    #[test]
    fn describe_without_message_uses_status() {
        let outcome = CallOutcome {
            message: None,
            ..status(502)
        };
        assert_eq!(outcome.describe(), "HTTP 502");
    }
}
