use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use triage_lib::config::Config;
use triage_lib::server::run;

/// Full round trip through the demo server: allowed requests carry limit
/// headers, the request past the ceiling short-circuits with the gate's
/// 429 and structured body.
#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_server_admits_then_throttles() {
    let mut cfg = Config::default();
    cfg.listen = "127.0.0.1:18411".parse().expect("valid listen address");
    cfg.gate.window_ms = 60_000;
    cfg.gate.max_requests = 5;

    let server = tokio::spawn(run(Arc::new(cfg)));

    let client = reqwest::Client::new();
    let url = "http://127.0.0.1:18411/";

    // Wait for the listener; refused connections don't count against the
    // window.
    let mut first = None;
    for _ in 0..50 {
        if let Ok(resp) = client.get(url).send().await {
            first = Some(resp);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let first = first.expect("server should come up");

    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-limit"], "5");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "4");
    assert!(first.headers().contains_key("x-ratelimit-reset"));
    let body: serde_json::Value = first.json().await.expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["identity"], "127.0.0.1");

    // Burn the rest of the window, then expect the short-circuit.
    let mut denied = None;
    for _ in 0..6 {
        let resp = client.get(url).send().await.expect("request");
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            denied = Some(resp);
            break;
        }
    }
    let denied = denied.expect("gate should throttle within the window");

    assert_eq!(denied.headers()["x-ratelimit-remaining"], "0");
    assert!(denied.headers().contains_key("retry-after"));
    let body: serde_json::Value = denied.json().await.expect("json body");
    assert_eq!(body["success"], false);
    assert!(body["retryAfter"].as_u64().expect("retryAfter") >= 1);

    server.abort();
}
