//! Integration tests for the HTTP connector driven through the producer.
//!
//! Each test stands up a one-shot HTTP responder on a local port, so no
//! external service is needed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use credlink_core::{
    ConnectError, ConnectionProducer, ErrorKind, HttpConnector, ProducerError, Statements,
    StaticUserConfig,
};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one request, answer with `status_line`, and return the raw request.
async fn serve_once(status_line: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let response =
            format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

fn make_producer() -> ConnectionProducer<HttpConnector> {
    ConnectionProducer::new(HttpConnector::default())
}

#[tokio::test]
async fn verification_sends_bearer_token() {
    let (url, server) = serve_once("HTTP/1.1 200 OK").await;
    let p = make_producer();

    p.initialize(
        payload(json!({"url": url, "apitoken": "tok-123", "verify_path": "/api/v1/me"})),
        true,
    )
    .await
    .unwrap();
    assert!(p.has_connection().await);

    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /api/v1/me "));
    assert!(request.contains("authorization: bearer tok-123"));
    assert!(request.contains("user-agent: credlink/"));
}

#[tokio::test]
async fn rejected_token_fails_verification() {
    let (url, _server) = serve_once("HTTP/1.1 401 Unauthorized").await;
    let p = make_producer();

    let err = p
        .initialize(payload(json!({"url": url, "apitoken": "bad"})), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProducerError::VerificationFailed(ConnectError::Unauthorized { status: 401 })
    ));
    assert!(p.is_initialized().await);
    assert!(!p.has_connection().await);
}

#[tokio::test]
async fn server_error_is_connection_failure() {
    let (url, _server) = serve_once("HTTP/1.1 503 Service Unavailable").await;
    let p = make_producer();
    p.initialize(payload(json!({"url": url, "apitoken": "t"})), false)
        .await
        .unwrap();

    let err = p.connection().await.unwrap_err();
    assert!(matches!(
        err,
        ProducerError::ConnectionFailed(ConnectError::UnexpectedStatus { status: 503 })
    ));
    assert!(!p.has_connection().await);
}

#[tokio::test]
async fn unreachable_endpoint_leaves_no_connection() {
    // Reserve a port, then free it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let p = make_producer();
    p.initialize(
        payload(json!({"url": format!("http://{addr}"), "apitoken": "t", "connect_timeout": 2})),
        false,
    )
    .await
    .unwrap();

    let err = p.connection().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    assert!(!p.has_connection().await);

    // Closing a never-connected producer is a no-op.
    p.close().await.unwrap();
}

#[tokio::test]
async fn connection_exposes_base_url() {
    let (url, _server) = serve_once("HTTP/1.1 204 No Content").await;
    let p = make_producer();
    p.initialize(payload(json!({"url": url.clone(), "apitoken": "t"})), false)
        .await
        .unwrap();

    let conn = p.connection().await.unwrap();
    assert_eq!(conn.base_url().as_str(), format!("{url}/"));
    assert_eq!(p.type_name(), "http");
}

#[tokio::test]
async fn http_backend_cannot_rotate() {
    let p = make_producer();
    p.initialize(payload(json!({"url": "https://x", "apitoken": "t"})), false)
        .await
        .unwrap();

    let user = StaticUserConfig {
        username: "svc".to_owned(),
        password: "pw".to_owned(),
        expiration: None,
    };
    let err = p
        .set_credentials(&Statements::default(), &user)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert!(!p.has_connection().await);
}
