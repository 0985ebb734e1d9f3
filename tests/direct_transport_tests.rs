//! # Direct Transport Integration Tests
//!
//! HTTP-level tests of the direct executor against a local mock server:
//! credential short-circuiting, header and content-type assembly, response
//! normalization, `Retry-After` handling, the one-shot refresh retry, and
//! timeout enforcement.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::RefreshingProvider;
use request_gateway::{
    DirectTransport, GatewayConfig, GatewayError, RequestDescriptor, RequestGateway,
    StaticConfigProvider, TimeoutConfig, Transport,
};

fn direct_for(config: GatewayConfig) -> DirectTransport {
    common::init_tracing();
    DirectTransport::new(
        Arc::new(StaticConfigProvider::new(config)),
        TimeoutConfig::default(),
    )
}

#[tokio::test]
async fn test_missing_api_key_short_circuits_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), ""));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.status, 401);
    assert!(response.error.as_deref().unwrap().contains("connection settings"));
}

#[tokio::test]
async fn test_placeholder_api_key_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "your-api-key-here"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert!(response.error.as_deref().unwrap().contains("placeholder"));
}

#[tokio::test]
async fn test_success_normalization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .and(header("x-api-key", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Custom-Header", "yes")
                .set_body_json(json!({"data": [{"id": "m1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "secret"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.status, 200);
    assert_eq!(response.data.unwrap()["data"][0]["id"], "m1");
    // header names come back lower-cased
    let headers = response.headers.unwrap();
    assert_eq!(headers.get("x-custom-header").map(String::as_str), Some("yes"));
    // no Retry-After header means no parsed value
    assert!(response.retry_after.is_none());
}

#[tokio::test]
async fn test_json_body_gets_default_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"model": "default"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "secret"));
    let response = transport
        .execute(&RequestDescriptor::post("/api/v1/chat/completions").json(json!({"model": "default"})))
        .await
        .unwrap();

    assert!(response.ok);
}

#[tokio::test]
async fn test_retry_after_and_log_suppression() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_json(json!({"detail": "Rate limit exceeded"})),
        )
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "secret"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(response.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(response.error.as_deref(), Some("Rate limit exceeded"));

    // the same failure twice in a row is recorded once
    let gateway = RequestGateway::builder()
        .config_provider(Arc::new(StaticConfigProvider::new(
            GatewayConfig::single_key(server.uri(), "secret"),
        )))
        .build()
        .unwrap();

    for _ in 0..2 {
        let err = gateway
            .request(RequestDescriptor::get("/api/v1/models"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Request { status: 429, .. }));
    }
    assert_eq!(gateway.error_log().len(), 1);
    assert!(gateway.error_log().last_error().is_some());
}

#[tokio::test]
async fn test_single_key_401_never_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid API key"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "stale-but-real"));
    let response = transport
        .execute(&RequestDescriptor::post("/api/v1/chat/completions").json(json!({})))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Invalid API key"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_multi_user_refresh_then_retry_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/boards"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/boards"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"boards": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(RefreshingProvider::with_refreshed_token(
        GatewayConfig::multi_user(server.uri(), "stale-token", Some("refresh".into())),
        "fresh-token",
    ));
    let transport = DirectTransport::new(provider.clone(), TimeoutConfig::default());

    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/boards"))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.data.unwrap(), json!({"boards": []}));
    // exactly one refresh and one retry
    assert_eq!(provider.refresh_count(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_refresh_exhausted_keeps_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .mount(&server)
        .await;

    // provider has a refresh token but no working refresh hook
    let provider = Arc::new(RefreshingProvider::new(GatewayConfig::multi_user(
        server.uri(),
        "stale-token",
        Some("refresh".into()),
    )));
    let transport = DirectTransport::new(provider.clone(), TimeoutConfig::default());

    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/boards"))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(provider.refresh_count(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_timeout_maps_to_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "secret"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models").timeout(Duration::from_millis(50)))
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.status, 0);
    assert!(response.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_connection_failure_maps_to_status_zero() {
    // nothing listens on this port
    let transport = direct_for(GatewayConfig::single_key("http://127.0.0.1:9", "secret"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.status, 0);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn test_error_detail_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad input"})))
        .mount(&server)
        .await;

    let transport = direct_for(GatewayConfig::single_key(server.uri(), "secret"));
    let response = transport
        .execute(&RequestDescriptor::get("/api/v1/models"))
        .await
        .unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(response.error.as_deref(), Some("bad input"));
}

#[tokio::test]
async fn test_absolute_path_bypasses_server_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    // no base URL configured at all
    let transport = direct_for(GatewayConfig::single_key("", "secret"));
    let response = transport
        .execute(&RequestDescriptor::get(format!("{}/healthz", server.uri())))
        .await
        .unwrap();

    assert!(response.ok);
}

#[tokio::test]
async fn test_cancelled_call_classified_not_logged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let gateway = RequestGateway::builder()
        .config_provider(Arc::new(StaticConfigProvider::new(
            GatewayConfig::single_key(server.uri(), "secret"),
        )))
        .build()
        .unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();

    // an already-cancelled token fails immediately, and doing it again
    // produces the same terminal error
    for _ in 0..2 {
        let err = gateway
            .request(RequestDescriptor::get("/api/v1/models").cancellation(token.clone()))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
    assert!(gateway.error_log().is_empty());
}
