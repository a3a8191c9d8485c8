use std::sync::Arc;

use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing,
};
use bytes::Bytes;
use http::HeaderValue;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::core::{Forwarder, InboundRequest, envelope};

/// Build the inbound router: one relay handler behind every supported method,
/// both at the root and on any deeper path. Unsupported methods get a plain
/// 405 from the method router.
pub fn router(forwarder: Arc<Forwarder>) -> Router {
    let relay = routing::get(relay_handler)
        .post(relay_handler)
        .put(relay_handler)
        .delete(relay_handler)
        .patch(relay_handler);

    Router::new()
        .route("/{*path}", relay.clone())
        .route("/", relay)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(forwarder)
}

/// Middleware to add a unique request ID to each request
///
/// The ID travels in the tracing span for correlation and is echoed back to
/// the caller in the `x-request-id` response header.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        let mut response = next.run(request).await;
        response.headers_mut().insert(
            "x-request-id",
            HeaderValue::from_str(&request_id)
                .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
        );
        response
    }
    .instrument(span)
    .await
}

/// Accept any request, capture it whole, relay it, and reply with the JSON
/// the forwarder produced. Always answers 200; outcomes live in the body.
async fn relay_handler(State(forwarder): State<Arc<Forwarder>>, request: Request) -> Json<Value> {
    let inbound = capture_request(request).await;
    Json(forwarder.forward(inbound).await)
}

/// Capture the parts of an inbound request the pipeline needs, buffering the
/// whole body. The first leading slash is stripped so the captured path
/// concatenates directly onto the target base URL; any further slashes belong
/// to the path itself.
async fn capture_request(request: Request) -> InboundRequest {
    let (parts, body) = request.into_parts();

    // Strip exactly one slash: a client asking for //metrics must reach
    // //metrics on the upstream.
    let raw_path = parts.uri.path();
    let path = raw_path.strip_prefix('/').unwrap_or(raw_path).to_string();
    let raw_query = parts.uri.query().map(str::to_owned);
    let headers = envelope::headers_to_map(&parts.headers);

    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // The sender went away mid-upload; there is nobody left to answer.
            tracing::debug!("Failed to buffer inbound body: {e}");
            Bytes::new()
        }
    };

    InboundRequest {
        method: parts.method,
        path,
        raw_query,
        headers,
        body,
    }
}
