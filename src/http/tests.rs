//! Tests for the HTTP module

use super::*;
use crate::auth::{AuthConfig, Authenticator};
use crate::backoff::{Backoff, BackoffChain, ConstantBackoffStrategy, WaitTimeFromHeaderBackoffStrategy};
use crate::error::Error;
use crate::types::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client(max_retries: u32) -> HttpClient {
    let config = HttpClientConfig::builder().max_retries(max_retries).build();
    HttpClient::with_config(config)
        .unwrap()
        .with_backoff(Arc::new(BackoffChain::single(Backoff::Constant(
            ConstantBackoffStrategy::new(Duration::from_millis(10)),
        ))))
}

// ============================================================================
// Snapshot types
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 5);
    assert!(config.user_agent.starts_with("solidafy-builder/"));
}

#[test]
fn test_request_builders() {
    let request = HttpRequest::new(Method::GET, "https://api.example.com/items?a=1")
        .with_header("X-Request-Id", "abc123")
        .with_query([("page", "2"), ("q", "a b")])
        .unwrap();

    assert_eq!(request.url, "https://api.example.com/items?a=1&page=2&q=a+b");
    assert_eq!(
        request.headers.get("X-Request-Id").map(String::as_str),
        Some("abc123")
    );

    let with_body = HttpRequest::new(Method::POST, "https://api.example.com/search")
        .with_json_body(&json!({"k": "v"}))
        .unwrap();
    assert_eq!(with_body.body.as_deref(), Some(r#"{"k":"v"}"#));
    assert_eq!(
        with_body.headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );
}

#[test]
fn test_request_serializes_with_http_method() {
    let request = HttpRequest::new(Method::GET, "https://api.example.com");
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["http_method"], json!("GET"));
    assert_eq!(value["url"], json!("https://api.example.com"));
    assert!(value.get("body").is_none());
}

#[test]
fn test_response_links() {
    let response = HttpResponse::new(200, "{}").with_header(
        "Link",
        r#"<https://api.example.com/items?page=2>; rel="next", <https://api.example.com/items?page=9>; rel="last""#,
    );

    let links = response.links();
    assert_eq!(
        links["next"],
        json!({"url": "https://api.example.com/items?page=2", "rel": "next"})
    );
    assert_eq!(
        links["last"]["url"],
        json!("https://api.example.com/items?page=9")
    );

    let headers = response.headers_with_links();
    assert_eq!(headers["link"]["next"]["url"], links["next"]["url"]);
    assert!(HttpResponse::new(200, "").links().is_empty());
}

#[test]
fn test_response_json_errors_are_decode_errors() {
    let response = HttpResponse::new(200, "<html>oops</html>");
    let err = response.json().unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));

    assert_eq!(HttpResponse::new(200, "  ").json_or_empty().unwrap(), json!({}));
}

#[test]
fn test_observer_records_and_clears() {
    let observer = ExchangeObserver::new();
    let shared = observer.clone();

    observer.record_auxiliary(AuxiliaryRequest {
        title: "Refresh token".to_string(),
        description: "Obtains access token".to_string(),
        request: HttpRequest::new(Method::POST, "https://auth.example.com/token"),
        response: None,
    });
    observer.update_config(json!({"a": 1}));

    assert_eq!(shared.auxiliary_requests().len(), 1);
    assert_eq!(shared.latest_config_update(), Some(json!({"a": 1})));

    shared.clear();
    assert!(observer.auxiliary_requests().is_empty());
    assert!(observer.latest_config_update().is_none());
}

// ============================================================================
// Client
// ============================================================================

#[tokio::test]
async fn test_http_client_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total", "2")
                .set_body_json(json!({"users": []})),
        )
        .mount(&mock_server)
        .await;

    let client = fast_client(0);
    let request = HttpRequest::new(Method::GET, format!("{}/api/users?page=1", mock_server.uri()));
    let exchange = client.send(request).await.unwrap();

    assert_eq!(exchange.response.status, 200);
    assert_eq!(exchange.response.header("x-total"), Some("2"));
    assert_eq!(exchange.response.json().unwrap(), json!({"users": []}));
}

#[tokio::test]
async fn test_http_client_post_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_json(json!({"query": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = fast_client(0);
    let request = HttpRequest::new(Method::POST, format!("{}/api/search", mock_server.uri()))
        .with_json_body(&json!({"query": "x"}))
        .unwrap();
    let exchange = client.send(request).await.unwrap();
    assert_eq!(exchange.response.status, 200);
}

#[tokio::test]
async fn test_http_client_applies_default_headers_and_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("X-Client", "builder"))
        .and(header("Authorization", "Bearer t0k"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .header("X-Client", "builder")
        .max_retries(0)
        .build();
    let client = HttpClient::with_config(config)
        .unwrap()
        .with_authenticator(Arc::new(Authenticator::new(AuthConfig::Bearer {
            token: "t0k".to_string(),
        })));

    let exchange = client
        .send(HttpRequest::new(Method::GET, format!("{}/api/me", mock_server.uri())))
        .await
        .unwrap();

    // The recorded request is the one actually sent
    assert_eq!(
        exchange.request.headers.get("Authorization").map(String::as_str),
        Some("Bearer t0k")
    );
}

#[tokio::test]
async fn test_http_client_404_fails_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(3);
    let url = format!("{}/api/missing", mock_server.uri());
    let err = client
        .send(HttpRequest::new(Method::GET, url.as_str()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.inner(),
        Error::HttpStatus { status: 404, .. }
    ));
    assert_eq!(err.request().map(|r| r.url.as_str()), Some(url.as_str()));
    assert_eq!(err.response().map(|r| r.body.as_str()), Some("Not found"));
}

#[tokio::test]
async fn test_http_client_retry_on_500() {
    let mock_server = MockServer::start().await;

    // First two calls return 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = fast_client(3);
    let exchange = client
        .send(HttpRequest::new(Method::GET, format!("{}/api/flaky", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(exchange.response.status, 200);
}

#[tokio::test]
async fn test_http_client_429_uses_wait_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0.01")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(HttpClientConfig::builder().max_retries(2).build())
        .unwrap()
        .with_backoff(Arc::new(BackoffChain::single(Backoff::WaitTimeFromHeader(
            WaitTimeFromHeaderBackoffStrategy::new("retry-after"),
        ))));

    let exchange = client
        .send(HttpRequest::new(Method::GET, format!("{}/api/limited", mock_server.uri())))
        .await
        .unwrap();
    assert_eq!(exchange.response.status, 200);
}

#[tokio::test]
async fn test_http_client_backoff_gives_up() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&mock_server)
        .await;

    // No retry-after header, so the only strategy has no answer
    let client = HttpClient::with_config(HttpClientConfig::builder().max_retries(5).build())
        .unwrap()
        .with_backoff(Arc::new(BackoffChain::single(Backoff::WaitTimeFromHeader(
            WaitTimeFromHeaderBackoffStrategy::new("retry-after"),
        ))));

    let err = client
        .send(HttpRequest::new(Method::GET, format!("{}/api/limited", mock_server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::BackoffGaveUp { attempts: 1, .. }));
    assert_eq!(err.response().map(|r| r.status), Some(429));
}

#[tokio::test]
async fn test_http_client_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/always-fail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(2);
    let err = client
        .send(HttpRequest::new(Method::GET, format!("{}/api/always-fail", mock_server.uri())))
        .await
        .unwrap_err();

    match err.inner() {
        Error::MaxRetriesExceeded {
            max_retries,
            last_error,
        } => {
            assert_eq!(*max_retries, 2);
            assert_eq!(last_error, "HTTP 500: Server error");
        }
        other => panic!("unexpected error: {other}"),
    }
    let response = err.response().unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.body, "Server error");
}

#[tokio::test]
async fn test_http_client_cache_can_be_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(0);
    let url = format!("{}/api/cached", mock_server.uri());

    // Second call is served from cache
    client.send(HttpRequest::new(Method::GET, url.as_str())).await.unwrap();
    client.send(HttpRequest::new(Method::GET, url.as_str())).await.unwrap();

    client.disable_cache();
    assert!(!client.cache_enabled());
    client.send(HttpRequest::new(Method::GET, url.as_str())).await.unwrap();
    client.send(HttpRequest::new(Method::GET, url.as_str())).await.unwrap();
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::new().unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("cache_enabled"));
}

#[test]
fn test_join_url() {
    assert_eq!(
        join_url("https://api.example.com/v1/", "/items"),
        "https://api.example.com/v1/items"
    );
    assert_eq!(
        join_url("https://api.example.com/v1", "items"),
        "https://api.example.com/v1/items"
    );
    assert_eq!(join_url("https://api.example.com", ""), "https://api.example.com");
    assert_eq!(
        join_url("https://api.example.com", "https://other.example.com/next?page=2"),
        "https://other.example.com/next?page=2"
    );
}
