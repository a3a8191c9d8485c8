//! Response envelope normalization.
//!
//! Every reply this proxy sends to its caller is a JSON object that merges the
//! upstream's transport metadata (`status_code`, `headers`) with the upstream
//! body. These are pure transformations with no I/O, kept separate from the
//! forwarding orchestration so the merge and decode rules are unit-testable
//! in isolation.

use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use indexmap::IndexMap;
use serde_json::{Map, Value, json};

/// Collapse an `http::HeaderMap` into an insertion-ordered string map.
///
/// Multi-value headers collapse last-value-wins; non-UTF-8 values are decoded
/// lossily. Header names arrive lowercased from the `http` crate.
pub fn headers_to_map(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut map = IndexMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    map
}

/// Extract the declared charset from a `Content-Type` header, lowercased.
///
/// Returns `None` when the header is missing, unreadable, or carries no
/// `charset=` parameter.
pub fn charset_hint(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    for segment in content_type.split(';').skip(1) {
        let segment = segment.trim().to_ascii_lowercase();
        if let Some(value) = segment.strip_prefix("charset=") {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Decode body bytes to text using the declared encoding when there is one.
///
/// UTF-8 (lossy) is the default. ISO-8859-1 / Latin-1 is decoded directly
/// (every byte is its codepoint). Any other declared charset falls back to
/// lossy UTF-8 rather than failing; decoding never errors.
pub fn decode_body(raw: &[u8], encoding_hint: Option<&str>) -> String {
    let normalized = encoding_hint.map(|h| h.trim().to_ascii_lowercase());
    match normalized.as_deref() {
        Some("iso-8859-1") | Some("latin-1") | Some("latin1") | Some("l1") => {
            raw.iter().map(|&b| b as char).collect()
        }
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Merge transport metadata into the body fields of an envelope.
///
/// The injected `status_code` and `headers` keys always win: a body that
/// itself carries top-level keys with those names is shadowed. Callers rely
/// on the envelope's `status_code` being the upstream's real transport
/// status, so the collision resolves in the transport's favor.
pub fn merge_metadata(
    status: StatusCode,
    headers: &HeaderMap,
    mut fields: Map<String, Value>,
) -> Value {
    fields.insert("status_code".to_string(), json!(status.as_u16()));
    fields.insert("headers".to_string(), json!(headers_to_map(headers)));
    Value::Object(fields)
}

/// Build the response envelope for an upstream reply.
///
/// The body is decoded as strict JSON. A top-level object contributes its
/// fields to the envelope directly; anything else (array, scalar, invalid
/// JSON, empty body) is wrapped as a single `raw_content` field holding the
/// body decoded as text. JSON-decode failure is a normal branch here, never
/// an error.
pub fn normalize(
    status: StatusCode,
    headers: &HeaderMap,
    raw_body: &[u8],
    encoding_hint: Option<&str>,
) -> Value {
    let fields = match serde_json::from_slice::<Value>(raw_body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert(
                "raw_content".to_string(),
                Value::String(decode_body(raw_body, encoding_hint)),
            );
            map
        }
    };
    merge_metadata(status, headers, fields)
}
