use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One completed request/response exchange, as it appears in the success log.
///
/// Field order is the wire order of the logged block. Header maps are
/// insertion-ordered so the logged headers read in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Request path relative to the proxy root, without the leading slash
    pub path: String,
    /// Request method as text ("GET", "POST", ...)
    pub method: String,
    /// Request headers, multi-value collapsed
    pub headers: IndexMap<String, String>,
    /// Request body decoded as text; absent when the body was empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Status code the upstream answered with
    pub response_status: u16,
    /// Upstream response headers
    pub response_headers: IndexMap<String, String>,
    /// Upstream response body decoded as text
    pub response_body: String,
    /// Wall-clock seconds from dispatch to fully buffered response
    pub duration: f64,
}

/// One failed forward attempt, as it appears in the error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// When the failure was observed. Rendered as the prefix line of the
    /// logged block, not as a JSON field.
    #[serde(skip)]
    pub timestamp: DateTime<Local>,
    /// Failure message including the causal chain
    pub error_message: String,
    /// Fully composed URL the dispatch was aimed at
    pub target_url: String,
    /// Request method as text
    pub method: String,
    /// Request headers, multi-value collapsed
    pub headers: IndexMap<String, String>,
    /// Request body decoded as text; absent when the body was empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// AuditSink defines the port (interface) for the append-only audit trail.
///
/// Both operations are fire-and-forget: they must not block the caller on file
/// I/O and must never fail outward. A sink that cannot persist a record
/// surfaces that as a process-level diagnostic only.
pub trait AuditSink: Send + Sync + 'static {
    /// Append one success record
    ///
    /// # Arguments
    /// * `record` - The completed exchange to persist
    fn record_success(&self, record: LogRecord);

    /// Append one error record
    ///
    /// # Arguments
    /// * `record` - The failed forward attempt to persist
    fn record_error(&self, record: ErrorRecord);
}
