// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use landscape_server::config::FetchConfig;
use landscape_server::{AggregationError, HttpTransport, JsonFetcher, OutboundRequest};
use serde_json::{json, Value};

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "UP"})) }))
        .route(
            "/echo",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"authorization": auth}))
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({}))
            }),
        )
        .route("/text", get(|| async { "not json" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve upstream");
    });
    format!("http://{addr}")
}

fn transport() -> HttpTransport {
    HttpTransport::new(&FetchConfig {
        timeout: Duration::from_millis(150),
        max_concurrent_connections: 4,
        ..FetchConfig::default()
    })
    .expect("transport builds")
}

#[tokio::test]
async fn parses_json_and_sends_configured_headers() {
    let base = spawn_upstream().await;
    let transport = transport();

    let body = transport
        .fetch(&OutboundRequest::new(format!("{base}/health")))
        .await
        .expect("health fetch");
    assert_eq!(body, json!({"status": "UP"}));

    let mut request = OutboundRequest::new(format!("{base}/echo"))
        .with_headers(&BTreeMap::from([("x-trace".to_string(), "1".to_string())]));
    assert!(request.set_authorization("Bearer t0k3n"));
    let echoed: Value = transport.fetch(&request).await.expect("echo fetch");
    assert_eq!(echoed["authorization"], json!("Bearer t0k3n"));
}

#[tokio::test]
async fn maps_failures_to_aggregation_errors() {
    let base = spawn_upstream().await;
    let transport = transport();

    let err = transport
        .fetch(&OutboundRequest::new(format!("{base}/nope")))
        .await
        .expect_err("404");
    assert!(matches!(err, AggregationError::HttpStatus { status: 404, .. }));
    assert!(err.is_warning());

    let err = transport
        .fetch(&OutboundRequest::new(format!("{base}/slow")))
        .await
        .expect_err("timeout");
    assert!(matches!(err, AggregationError::Timeout { after_ms: 150, .. }));

    let err = transport
        .fetch(&OutboundRequest::new(format!("{base}/text")))
        .await
        .expect_err("not json");
    assert_eq!(err.code(), "malformed_payload");

    let err = transport
        .fetch(&OutboundRequest::new("http://127.0.0.1:1/health"))
        .await
        .expect_err("refused");
    assert_eq!(err.code(), "transport");
    assert!(!err.is_warning());
}
