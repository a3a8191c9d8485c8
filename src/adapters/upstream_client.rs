use std::{io::Read, time::Duration};

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use bytes::Bytes;
use eyre::Result;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use http::{HeaderMap, Request, Version};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;

use crate::ports::upstream::{UpstreamClient, UpstreamError, UpstreamResponse, UpstreamResult};

/// Upstream HTTP client adapter using Hyper with Rustls (HTTP/1.1 + HTTP/2).
///
/// Responsibilities:
/// * Enforces the connect budget at the connector and the read budget around
///   the response head and body
/// * Forces request version to HTTP/1.1 while allowing ALPN to negotiate h2
/// * Buffers the full response body before returning
/// * Undoes the response `Content-Encoding` (gzip and deflate) so callers see
///   the bytes the origin produced; the headers are reported verbatim
/// * Classifies transport failures into the `UpstreamError` taxonomy
///
/// Requests are sent exactly as built by the caller: no headers are injected,
/// rewritten, or stripped here. A connection that stalls before the response
/// head also burns the read budget; the connector's own connect timeout fires
/// first whenever it is the smaller of the two.
pub struct UpstreamClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl UpstreamClientAdapter {
    /// Create a new upstream client with the given timeout budgets.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs
        http_connector.set_connect_timeout(Some(connect_timeout));

        // Build rustls client config with modern protocols
        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        // Build HTTPS connector with HTTP/2 support
        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1() // Support HTTP/1.1
            .wrap_connector(http_connector);

        // Create client with TokioExecutor for async runtime
        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::info!(
            connect_timeout_ms = connect_timeout.as_millis() as u64,
            read_timeout_ms = read_timeout.as_millis() as u64,
            "Created upstream HTTP client with HTTP/2 and HTTP/1.1 support"
        );
        Ok(Self {
            client,
            connect_timeout,
            read_timeout,
        })
    }

    /// Classify a failed dispatch into the error taxonomy.
    fn classify_send_error(&self, err: hyper_util::client::legacy::Error) -> UpstreamError {
        let detail = error_chain(&err);

        if err.is_connect() {
            // DNS failures, refusals, and resets all surface on the connect
            // phase; only an io timeout there means the connect budget ran out.
            return match find_io_kind(&err) {
                Some(std::io::ErrorKind::TimedOut) => UpstreamError::ConnectTimeout {
                    budget: self.connect_timeout,
                },
                _ => UpstreamError::Unreachable(detail),
            };
        }

        if let Some(hyper_err) = find_hyper_error(&err)
            && (hyper_err.is_parse() || hyper_err.is_incomplete_message())
        {
            return UpstreamError::Protocol(detail);
        }

        UpstreamError::Unexpected(detail)
    }
}

/// Classify a failure while draining the response body.
fn classify_body_error(err: hyper::Error) -> UpstreamError {
    let detail = error_chain(&err);
    if err.is_parse() || err.is_incomplete_message() {
        UpstreamError::Protocol(detail)
    } else {
        UpstreamError::Unexpected(detail)
    }
}

/// Flatten an error and its sources into one readable line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Search an error's source chain for an `io::Error` and report its kind.
fn find_io_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}

/// Search an error's source chain for the underlying `hyper::Error`.
fn find_hyper_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a hyper::Error> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            return Some(hyper_err);
        }
        current = e.source();
    }
    None
}

/// Undo the `Content-Encoding` the upstream applied, so the body decodes and
/// logs as the text the origin produced. Encodings this proxy does not speak
/// pass through untouched.
fn decode_content_encoding(headers: &HeaderMap, body: Bytes) -> std::io::Result<Bytes> {
    let Some(encoding) = headers
        .get(http::header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
    else {
        return Ok(body);
    };
    if body.is_empty() {
        return Ok(body);
    }

    // Encodings are listed in the order they were applied; undo them back to
    // front.
    let mut body = body;
    for token in encoding.rsplit(',') {
        body = decode_one(token.trim(), body)?;
    }
    Ok(body)
}

fn decode_one(token: &str, body: Bytes) -> std::io::Result<Bytes> {
    let mut decoded = Vec::new();
    match token.to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => {
            MultiGzDecoder::new(&body[..]).read_to_end(&mut decoded)?;
        }
        "deflate" => {
            // Some servers send raw deflate without the zlib wrapper; try the
            // wrapped form first and fall back.
            if ZlibDecoder::new(&body[..]).read_to_end(&mut decoded).is_err() {
                decoded.clear();
                DeflateDecoder::new(&body[..]).read_to_end(&mut decoded)?;
            }
        }
        _ => return Ok(body),
    }
    Ok(decoded.into())
}

#[async_trait]
impl UpstreamClient for UpstreamClientAdapter {
    async fn send(&self, req: Request<Bytes>) -> UpstreamResult<UpstreamResponse> {
        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;

        tracing::debug!(
            method = %parts.method,
            uri = %parts.uri,
            "Dispatching upstream request (Version set to HTTP/1.1, ALPN negotiates actual version)"
        );

        let outgoing = Request::from_parts(parts, AxumBody::from(body));

        let response = match timeout(self.read_timeout, self.client.request(outgoing)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify_send_error(e)),
            Err(_) => {
                return Err(UpstreamError::ReadTimeout {
                    budget: self.read_timeout,
                });
            }
        };

        let (parts, incoming) = response.into_parts();
        let collected = match timeout(self.read_timeout, incoming.collect()).await {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => return Err(classify_body_error(e)),
            Err(_) => {
                return Err(UpstreamError::ReadTimeout {
                    budget: self.read_timeout,
                });
            }
        };

        let body = match decode_content_encoding(&parts.headers, collected.to_bytes()) {
            Ok(body) => body,
            Err(e) => {
                return Err(UpstreamError::Protocol(format!(
                    "response body does not match its declared content-encoding: {e}"
                )));
            }
        };

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
