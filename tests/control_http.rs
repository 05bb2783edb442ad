//! Integration tests for the metrics/control HTTP endpoint.

use relaybot::control::{ControlHandle, ControlRequest, LifecycleOp};
use relaybot::error::Outcome;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn serve(control: ControlHandle) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, relaybot::http::router(control))
            .await
            .unwrap();
    });
    addr
}

async fn http(addr: &str, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        method, path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

#[tokio::test]
async fn test_module_action_round_trip() {
    let (control, mut rx) = ControlHandle::detached();
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            if let ControlRequest::Lifecycle { op, name, reply } = request {
                let outcome = match (op, name.as_str()) {
                    (LifecycleOp::Load, "uptime") => Outcome::ok(),
                    _ => Outcome::failed(format!("module '{}' is not imported", name)),
                };
                let _ = reply.send(outcome);
            }
        }
    });
    let addr = serve(control).await;

    let ok = http(&addr, "POST", "/modules/uptime/load").await;
    assert!(ok.starts_with("HTTP/1.1 200"), "got {:?}", ok);
    assert!(ok.contains(r#"{"success":true,"reason":null}"#));

    let failed = http(&addr, "POST", "/modules/ghost/reload").await;
    assert!(failed.starts_with("HTTP/1.1 409"), "got {:?}", failed);
    assert!(failed.contains("module 'ghost' is not imported"));

    let bad = http(&addr, "POST", "/modules/uptime/explode").await;
    assert!(bad.starts_with("HTTP/1.1 400"), "got {:?}", bad);
}

#[tokio::test]
async fn test_metrics_and_status() {
    relaybot::metrics::init();
    relaybot::metrics::record_line_received();

    let (control, _rx) = ControlHandle::detached();
    let addr = serve(control).await;

    let metrics = http(&addr, "GET", "/metrics").await;
    assert!(metrics.starts_with("HTTP/1.1 200"));
    assert!(metrics.contains("relaybot_lines_received_total"));

    let status = http(&addr, "GET", "/status").await;
    assert!(status.contains(r#"{"state":"disconnected"}"#));
}

#[tokio::test]
async fn test_stopped_engine_is_reported() {
    let (control, rx) = ControlHandle::detached();
    drop(rx);
    let addr = serve(control).await;

    let response = http(&addr, "POST", "/modules/uptime/load").await;
    assert!(response.starts_with("HTTP/1.1 409"));
    assert!(response.contains("engine is not running"));
}
