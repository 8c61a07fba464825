use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::gate::{AdmissionGate, Decision, GatePolicy};
use crate::server::admission::{apply_allow_headers, check_admission, extract_identity, RespBody};

/// Run the demo admission server until SIGINT/SIGTERM.
///
/// One JSON endpoint behind the gate: allowed requests get a 200 with
/// `x-ratelimit-*` headers, throttled ones get the gate's 429 without any
/// handler running.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await.map_err(TriageError::Io)?;
    let gate = Arc::new(AdmissionGate::new());
    let policy = config.gate.base_policy();

    let mut sigterm =
        signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
            TriageError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
        })?;

    info!(
        listen = ?config.listen,
        window_ms = config.gate.window_ms,
        max_requests = config.gate.max_requests,
        "admission server started"
    );

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            pressed = signal::ctrl_c() => {
                if pressed.is_ok() {
                    info!("Received Ctrl-C, shutting down");
                }
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };

                let gate = Arc::clone(&gate);
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let gate = Arc::clone(&gate);
                        let config = Arc::clone(&config);
                        async move { handle(&gate, &policy, &config, peer, &req) }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
        }
    }

    info!(
        checked = gate.checked(),
        denied = gate.denied(),
        "admission server stopped"
    );
    Ok(())
}

fn handle(
    gate: &AdmissionGate,
    policy: &GatePolicy,
    config: &Config,
    peer: SocketAddr,
    req: &Request<Incoming>,
) -> std::result::Result<Response<RespBody>, Infallible> {
    let identity = extract_identity(Some(peer), req.headers(), config.gate.trust_forwarded_for);

    if !config.gate.enabled {
        return Ok(ok_response(&identity, None));
    }

    match check_admission(gate, policy, &identity) {
        Err(denied) => Ok(denied),
        Ok(decision) => Ok(ok_response(&identity, Some(&decision))),
    }
}

fn ok_response(identity: &str, decision: Option<&Decision>) -> Response<RespBody> {
    let payload = serde_json::json!({ "success": true, "identity": identity });
    let body = Full::new(Bytes::from(payload.to_string()))
        .map_err(|never| match never {})
        .boxed();

    let mut resp = Response::new(body);
    resp.headers_mut()
        .insert(hyper::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(decision) = decision {
        apply_allow_headers(resp.headers_mut(), decision);
    }
    resp
}
