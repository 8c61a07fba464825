use std::net::SocketAddr;
use std::time::Duration;

use http::HeaderMap;
use http_body_util::BodyExt;
use triage_lib::gate::{AdmissionGate, GatePolicy, UNKNOWN_IDENTITY};
use triage_lib::server::{apply_allow_headers, check_admission, extract_identity};

fn peer(addr: &str) -> Option<SocketAddr> {
    Some(addr.parse().expect("valid socket address"))
}

#[test]
fn test_identity_prefers_first_forwarded_hop() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

    let identity = extract_identity(peer("192.0.2.1:5000"), &headers, true);
    assert_eq!(identity, "203.0.113.7");
}

#[test]
fn test_identity_ignores_forwarded_header_when_untrusted() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());

    let identity = extract_identity(peer("192.0.2.1:5000"), &headers, false);
    assert_eq!(identity, "192.0.2.1");
}

#[test]
fn test_identity_falls_back_to_peer_ip() {
    let identity = extract_identity(peer("192.0.2.1:5000"), &HeaderMap::new(), true);
    assert_eq!(identity, "192.0.2.1");
}

#[test]
fn test_identity_degrades_to_unknown_bucket() {
    let identity = extract_identity(None, &HeaderMap::new(), true);
    assert_eq!(identity, UNKNOWN_IDENTITY);

    // An empty forwarded header is unusable, not an error.
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "".parse().unwrap());
    let identity = extract_identity(None, &headers, true);
    assert_eq!(identity, UNKNOWN_IDENTITY);
}

#[tokio::test]
async fn test_denied_request_gets_full_429_response() {
    let gate = AdmissionGate::new();
    let policy = GatePolicy::new(Duration::from_secs(60), 2);

    assert!(check_admission(&gate, &policy, "203.0.113.7").is_ok());
    assert!(check_admission(&gate, &policy, "203.0.113.7").is_ok());

    let denied = check_admission(&gate, &policy, "203.0.113.7")
        .expect_err("third request should short-circuit");

    assert_eq!(denied.status(), http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.headers()["content-type"], "application/json");
    assert_eq!(denied.headers()["x-ratelimit-limit"], "2");
    assert_eq!(denied.headers()["x-ratelimit-remaining"], "0");
    assert!(denied.headers().contains_key("retry-after"));

    let bytes = denied.into_body().collect().await.expect("body").to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().expect("message").contains("Too many requests"));
    assert!(body["retryAfter"].as_u64().expect("retryAfter") >= 1);
}

#[test]
fn test_allowed_decision_stamps_headers() {
    let gate = AdmissionGate::new();
    let policy = GatePolicy::new(Duration::from_secs(60), 5);

    let decision = check_admission(&gate, &policy, "203.0.113.7").expect("allowed");

    let mut headers = HeaderMap::new();
    apply_allow_headers(&mut headers, &decision);

    assert_eq!(headers["x-ratelimit-limit"], "5");
    assert_eq!(headers["x-ratelimit-remaining"], "4");
    let reset: u64 = headers["x-ratelimit-reset"].to_str().unwrap().parse().unwrap();
    assert!(reset <= 60);
}

#[test]
fn test_clear_after_privileged_action_forgives_identity() {
    // A successful login should wipe failed-attempt throttling.
    let gate = AdmissionGate::new();
    let policy = GatePolicy::auth();

    for _ in 0..policy.max_requests {
        assert!(check_admission(&gate, &policy, "203.0.113.7").is_ok());
    }
    assert!(check_admission(&gate, &policy, "203.0.113.7").is_err());

    gate.clear("203.0.113.7");
    assert!(check_admission(&gate, &policy, "203.0.113.7").is_ok());
}
