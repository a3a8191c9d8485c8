//! Request forwarding orchestration.
//!
//! The `Forwarder` owns one forwarding pipeline: compose the outbound URL,
//! dispatch through the `UpstreamClient` port, time the exchange, hand exactly
//! one record to the `AuditSink`, and shape the caller-facing reply. It talks
//! to the outside world only through its ports, so the whole pipeline is
//! testable with in-memory stubs.
use std::{sync::Arc, time::Instant};

use bytes::Bytes;
use chrono::Local;
use http::{HeaderName, HeaderValue, Method, Request};
use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::{
    config::ProxyConfig,
    core::envelope,
    ports::{
        AuditSink, ErrorRecord, LogRecord, UpstreamClient, UpstreamError, UpstreamResponse,
        UpstreamResult,
    },
};

/// Fixed notice returned to the caller when a forward fails. Failure details
/// go to the error log only; the client-facing shape never varies, so callers
/// learn nothing about the upstream or the proxy internals from it.
pub const FAILURE_NOTICE: &str =
    "The debug proxy recorded an error while forwarding this request. Please check the error log.";

/// An inbound request captured once at the HTTP boundary, read-only thereafter.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Request method
    pub method: Method,
    /// Path relative to the proxy root, leading slash stripped
    pub path: String,
    /// Raw query string, absent when the URL carried none
    pub raw_query: Option<String>,
    /// Headers in arrival order, multi-value collapsed
    pub headers: IndexMap<String, String>,
    /// Body bytes, possibly empty
    pub body: Bytes,
}

impl InboundRequest {
    /// Body decoded as text for audit records; `None` when the body is empty.
    pub fn body_text(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.body).into_owned())
        }
    }
}

/// The fixed-shape reply sent when forwarding fails for any reason.
pub fn failure_reply() -> Value {
    json!({
        "result": false,
        "message": FAILURE_NOTICE,
    })
}

/// Per-request forwarding service.
///
/// Construct with [`Forwarder::new`] by passing a validated `ProxyConfig` and
/// the two ports. An instance is shared across all in-flight requests; it
/// holds no per-request state.
pub struct Forwarder {
    config: ProxyConfig,
    client: Arc<dyn UpstreamClient>,
    audit: Arc<dyn AuditSink>,
}

impl Forwarder {
    /// Create a new forwarder from a validated configuration and its ports.
    pub fn new(
        config: ProxyConfig,
        client: Arc<dyn UpstreamClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            client,
            audit,
        }
    }

    /// The upstream URL a given path and query forward to.
    pub fn compose_target_url(&self, path: &str, raw_query: Option<&str>) -> String {
        let base = self.config.target_base();
        match raw_query {
            Some(query) => format!("{base}/{path}?{query}"),
            None => format!("{base}/{path}"),
        }
    }

    /// Forward one captured request and produce the JSON reply body.
    ///
    /// This is infallible by design: an upstream response of any status code
    /// becomes the JSON envelope, and any dispatch failure becomes the
    /// fixed failure reply with the details diverted to the error log. If the
    /// caller disconnects mid-flight the future is dropped, which cancels the
    /// in-flight upstream call; no record is written for abandoned requests.
    pub async fn forward(&self, inbound: InboundRequest) -> Value {
        let target = self.compose_target_url(&inbound.path, inbound.raw_query.as_deref());
        let started = Instant::now();

        match self.dispatch(&target, &inbound).await {
            Ok(response) => {
                let duration = started.elapsed().as_secs_f64();
                tracing::info!(
                    method = %inbound.method,
                    path = %inbound.path,
                    status = response.status.as_u16(),
                    duration_secs = duration,
                    "forwarded request"
                );

                let hint = envelope::charset_hint(&response.headers);
                self.audit.record_success(LogRecord {
                    path: inbound.path.clone(),
                    method: inbound.method.to_string(),
                    headers: inbound.headers.clone(),
                    body: inbound.body_text(),
                    response_status: response.status.as_u16(),
                    response_headers: envelope::headers_to_map(&response.headers),
                    response_body: envelope::decode_body(&response.body, hint.as_deref()),
                    duration,
                });

                envelope::normalize(
                    response.status,
                    &response.headers,
                    &response.body,
                    hint.as_deref(),
                )
            }
            Err(err) => {
                tracing::warn!(
                    method = %inbound.method,
                    target = %target,
                    kind = err.kind(),
                    error = %err,
                    "forward failed"
                );

                self.audit.record_error(ErrorRecord {
                    timestamp: Local::now(),
                    error_message: err.to_string(),
                    target_url: target,
                    method: inbound.method.to_string(),
                    headers: inbound.headers.clone(),
                    body: inbound.body_text(),
                });

                failure_reply()
            }
        }
    }

    /// Build the outbound request and send it through the upstream port.
    ///
    /// Headers are forwarded verbatim, including transport-identifying ones
    /// like `host` and `content-length`. Exposing the client's exact wire
    /// behavior to the upstream is the point of this proxy, so nothing is
    /// stripped or rewritten. Body bytes are already consistent with the
    /// forwarded `content-length` because nothing re-encodes them.
    async fn dispatch(
        &self,
        target: &str,
        inbound: &InboundRequest,
    ) -> UpstreamResult<UpstreamResponse> {
        let mut builder = Request::builder().method(inbound.method.clone()).uri(target);

        if let Some(outbound_headers) = builder.headers_mut() {
            for (name, value) in &inbound.headers {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_bytes(value.as_bytes()),
                ) {
                    (Ok(header_name), Ok(header_value)) => {
                        outbound_headers.append(header_name, header_value);
                    }
                    _ => tracing::debug!(header = %name, "dropping header that does not re-parse"),
                }
            }
        }

        let request = builder.body(inbound.body.clone()).map_err(|e| {
            UpstreamError::Unexpected(format!("failed to build outbound request: {e}"))
        })?;

        self.client.send(request).await
    }
}
