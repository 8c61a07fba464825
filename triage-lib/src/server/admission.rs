use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::Response;
use tracing::debug;

use crate::gate::{AdmissionGate, Decision, GatePolicy, UNKNOWN_IDENTITY};

pub(crate) type RespBody = BoxBody<Bytes, hyper::Error>;

/// Extract the client identity for admission control.
///
/// Prefers the first `X-Forwarded-For` hop when `trust_forwarded_for` is
/// set, falls back to the peer IP, and degrades to the shared
/// [`UNKNOWN_IDENTITY`] bucket when neither is usable.
pub fn extract_identity(
    peer: Option<std::net::SocketAddr>,
    headers: &HeaderMap,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        if let Some(xff) = headers.get("x-forwarded-for") {
            if let Ok(xff_str) = xff.to_str() {
                if let Some(first_hop) = xff_str.split(',').next() {
                    let first_hop = first_hop.trim();
                    if !first_hop.is_empty() {
                        return first_hop.to_string();
                    }
                }
            }
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_IDENTITY.to_string(),
    }
}

/// Run the gate for an inbound request.
///
/// Returns:
/// - `Ok(decision)` if the request may proceed; the handler should stamp
///   the decision onto its response with [`apply_allow_headers`]
/// - `Err(429 response)` if the request is throttled; send it as-is and do
///   not invoke the handler
pub fn check_admission(
    gate: &AdmissionGate,
    policy: &GatePolicy,
    identity: &str,
) -> std::result::Result<Decision, Response<RespBody>> {
    match gate.check(identity, policy) {
        Decision::Limited { limit, retry_after_secs } => {
            Err(too_many_requests(limit, retry_after_secs))
        }
        decision => {
            debug!(
                identity,
                limit = decision.limit(),
                remaining = decision.remaining(),
                "admission check passed"
            );
            Ok(decision)
        }
    }
}

/// Stamp limit/remaining/reset headers onto an allowed response.
pub fn apply_allow_headers(headers: &mut HeaderMap, decision: &Decision) {
    if let Decision::Allowed { limit, remaining, reset_at } = decision {
        let reset_secs = reset_at.saturating_duration_since(Instant::now()).as_secs();
        insert_header(headers, "x-ratelimit-limit", &limit.to_string());
        insert_header(headers, "x-ratelimit-remaining", &remaining.to_string());
        insert_header(headers, "x-ratelimit-reset", &reset_secs.to_string());
    }
}

fn too_many_requests(limit: u32, retry_after_secs: u64) -> Response<RespBody> {
    let payload = serde_json::json!({
        "success": false,
        "message": "Too many requests, please try again later.",
        "retryAfter": retry_after_secs,
    });
    let body = Full::new(Bytes::from(payload.to_string()))
        .map_err(|never| match never {})
        .boxed();

    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

    insert_header(resp.headers_mut(), "content-type", "application/json");
    insert_header(resp.headers_mut(), "x-ratelimit-limit", &limit.to_string());
    insert_header(resp.headers_mut(), "x-ratelimit-remaining", "0");
    insert_header(resp.headers_mut(), "retry-after", &retry_after_secs.to_string());

    resp
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    headers.insert(
        hyper::header::HeaderName::from_static(name),
        hyper::header::HeaderValue::from_str(value)
            .unwrap_or_else(|_| hyper::header::HeaderValue::from_static("0")),
    );
}
