//! The single seam between the resilient client and the network.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;

/// One outbound API request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub credential: String,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("url", &self.url)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure below HTTP: the exchange never produced a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

pub type TransportResult = Result<RawResponse, TransportError>;

/// Performs a single HTTP exchange. No retries, no classification.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> impl Future<Output = TransportResult> + Send;
}

/// [`Transport`] backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> TransportResult {
        let mut builder = self
            .client
            .get(&request.url)
            .header("accept", "application/json");
        if !request.credential.is_empty() {
            builder = builder.header("authorization", format!("ApiKey {}", request.credential));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credential() {
        let req = ApiRequest::new("https://api.example.test/faction/1/members", "secret-key");
        let rendered = format!("{req:?}");
        assert!(rendered.contains("members"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert_eq!(
            TransportError::Connect("refused".into()).to_string(),
            "connection failed: refused"
        );
    }

    #[test]
    fn transport_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransportError>();
    }
}
