use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};
use thiserror::Error;

/// Custom error type for upstream dispatch operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// The TCP/TLS connection could not be established within the budget
    #[error("Connect timed out after {budget:?}")]
    ConnectTimeout { budget: Duration },

    /// The connection was established but the response (head or body) did not
    /// arrive within the budget
    #[error("Read timed out after {budget:?}")]
    ReadTimeout { budget: Duration },

    /// Connection refused or reset, or the host could not be reached or resolved
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// The upstream produced bytes that do not parse as an HTTP response
    #[error("Malformed response from upstream: {0}")]
    Protocol(String),

    /// Catch-all for failures that fit no other variant
    #[error("Upstream request failed: {0}")]
    Unexpected(String),
}

impl UpstreamError {
    /// Short stable name for the variant, suitable as a structured tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::ConnectTimeout { .. } => "connect_timeout",
            UpstreamError::ReadTimeout { .. } => "read_timeout",
            UpstreamError::Unreachable(_) => "unreachable",
            UpstreamError::Protocol(_) => "protocol",
            UpstreamError::Unexpected(_) => "unexpected",
        }
    }
}

/// Result type alias for upstream dispatch operations
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// A fully buffered upstream response.
///
/// Headers are kept as an `http::HeaderMap` (not a string map) so the envelope
/// builder can read declared encodings from the raw header values.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Status code as returned by the upstream
    pub status: StatusCode,
    /// Response headers, verbatim
    pub headers: HeaderMap,
    /// Response body, collected into memory
    pub body: Bytes,
}

/// UpstreamClient defines the port (interface) for dispatching requests to the
/// upstream service
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Send a buffered HTTP request to the upstream
    ///
    /// # Arguments
    /// * `req` - The request to send, body already collected into memory
    ///
    /// # Returns
    /// The fully buffered upstream response, or an `UpstreamError` classified
    /// into the taxonomy above
    async fn send(&self, req: Request<Bytes>) -> UpstreamResult<UpstreamResponse>;
}
