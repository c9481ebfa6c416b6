//! End-to-end tests: real upstream servers behind a real gateway.
//!
//! Every test starts its own upstream Axum servers and its own gateway on
//! ephemeral ports, then talks to the gateway over HTTP with `reqwest`.
//! Nothing outside the test process is required.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::sleep;

use api_gateway::config::RateLimitSettings;
use api_gateway::models::{LoadBalancingStrategy, RateLimitConfig, RouteDefinition, ServiceInstance};
use api_gateway::{AppState, Config, GatewayConfig, build_router};

/// Serve `app` on an ephemeral port and return its address.
async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to ephemeral port");
    let addr = listener.local_addr().expect("Failed to get local address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    addr
}

/// A port nothing listens on.
fn closed_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to ephemeral port")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

/// Upstream that echoes what it received as JSON.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    (
        [("x-upstream", "echo")],
        axum::Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "body": String::from_utf8_lossy(&body),
            "request_id": header("x-request-id"),
            "user_id": header("x-user-id"),
        })),
    )
}

fn echo_app(name: &'static str) -> Router {
    Router::new()
        .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }))
        .route("/whoami", get(move || async move { name }))
        .fallback(echo)
}

/// Upstream whose first call is slow and every later call is fast.
fn slow_then_fast_app(calls: Arc<AtomicUsize>, delay: Duration) -> Router {
    Router::new()
        .fallback(move |State(calls): State<Arc<AtomicUsize>>| async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                sleep(delay).await;
            }
            "recovered"
        })
        .with_state(calls)
}

/// Gateway under test.
struct TestGateway {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestGateway {
    async fn start(routes: Vec<RouteDefinition>, rate_limiting: RateLimitSettings) -> Self {
        let config = Config {
            host: "127.0.0.1".to_string(),
            seed_default_instances: false,
            ..Config::default()
        };
        let gateway = GatewayConfig {
            rate_limiting,
            routes,
        };
        gateway.validate().expect("Invalid gateway config");

        let state = AppState::new(config, gateway).expect("Failed to build state");
        let addr = spawn_server(build_router(state.clone())).await;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn register(&self, id: &str, service: &str, addr: SocketAddr) {
        self.state.registry.register_instance(ServiceInstance::new(
            id,
            service,
            "127.0.0.1",
            addr.port(),
        ));
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }
}

// =============================================================================
// Forwarding
// =============================================================================

#[tokio::test]
async fn test_wildcard_route_strips_prefix_and_keeps_query() {
    let upstream = spawn_server(echo_app("catalog-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("catalog", "/gateway/catalog/**", "catalog")],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("catalog-1", "catalog", upstream);

    let response = gw.get("/gateway/catalog/items/42?sort=asc&page=2").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-upstream"], "echo");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["method"], "GET");
    assert_eq!(body["path"], "/items/42");
    assert_eq!(body["query"], "sort=asc&page=2");
}

#[tokio::test]
async fn test_route_without_strip_forwards_full_path() {
    let upstream = spawn_server(echo_app("search-1")).await;
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("search", "/gateway/search/**", "search")
                .with_strip_prefix(false),
        ],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("search-1", "search", upstream);

    let body: Value = gw.get("/gateway/search/books").await.json().await.unwrap();
    assert_eq!(body["path"], "/gateway/search/books");
}

#[tokio::test]
async fn test_exact_route_strips_to_root() {
    let upstream = spawn_server(echo_app("ping-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("ping", "/gateway/ping", "ping")],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("ping-1", "ping", upstream);

    let body: Value = gw.get("/gateway/ping").await.json().await.unwrap();
    assert_eq!(body["path"], "/");
}

#[tokio::test]
async fn test_template_route() {
    let upstream = spawn_server(echo_app("users-1")).await;
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("users", "/users/{id}/orders", "users").with_strip_prefix(false),
        ],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("users-1", "users", upstream);

    let response = gw.get("/users/7/orders").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["path"], "/users/7/orders");

    let missing = gw.get("/users/7/invoices").await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_post_body_and_request_id_forwarded() {
    let upstream = spawn_server(echo_app("orders-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("orders", "/gateway/orders/**", "orders")],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("orders-1", "orders", upstream);

    let response = gw
        .client
        .post(gw.url("/gateway/orders/new"))
        .header("x-request-id", "trace-me")
        .header("x-user-id", "alice")
        .body(r#"{"sku":"A-1","qty":2}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "trace-me");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/new");
    assert_eq!(body["body"], r#"{"sku":"A-1","qty":2}"#);
    assert_eq!(body["request_id"], "trace-me");
    assert_eq!(body["user_id"], "alice");
}

#[tokio::test]
async fn test_upstream_error_status_passes_through() {
    let upstream = spawn_server(echo_app("tea-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("tea", "/gateway/tea/**", "tea")],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("tea-1", "tea", upstream);

    let response = gw.get("/gateway/tea/teapot").await;
    assert_eq!(response.status(), 418);
    assert_eq!(response.text().await.unwrap(), "short and stout");
}

#[tokio::test]
async fn test_round_robin_across_instances() {
    let a = spawn_server(echo_app("svc-a")).await;
    let b = spawn_server(echo_app("svc-b")).await;
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("svc", "/gateway/svc/**", "svc")
                .with_strategy(LoadBalancingStrategy::RoundRobin),
        ],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("svc-a", "svc", a);
    gw.register("svc-b", "svc", b);

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(gw.get("/gateway/svc/whoami").await.text().await.unwrap());
    }
    assert_eq!(seen, vec!["svc-a", "svc-b", "svc-a", "svc-b"]);
}

// =============================================================================
// Routing failures
// =============================================================================

#[tokio::test]
async fn test_unknown_route_is_404() {
    let gw = TestGateway::start(Vec::new(), RateLimitSettings::default()).await;

    let response = gw.get("/gateway/missing").await;
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.text().await.unwrap(),
        "Route not found: /gateway/missing"
    );
}

#[tokio::test]
async fn test_service_without_instances_is_500() {
    let gw = TestGateway::start(
        vec![RouteDefinition::new("ghost", "/gateway/ghost/**", "ghost")],
        RateLimitSettings::default(),
    )
    .await;

    let response = gw.get("/gateway/ghost/x").await;
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "Service unavailable: ghost");
}

#[tokio::test]
async fn test_patch_is_rejected() {
    let upstream = spawn_server(echo_app("docs-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("docs", "/gateway/docs/**", "docs")],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("docs-1", "docs", upstream);

    let response = gw
        .client
        .patch(gw.url("/gateway/docs/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "Unsupported method: PATCH");
}

#[tokio::test]
async fn test_unreachable_instance_is_500() {
    let gw = TestGateway::start(
        vec![RouteDefinition::new("down", "/gateway/down/**", "down").with_retry_attempts(1)],
        RateLimitSettings::default(),
    )
    .await;
    gw.register(
        "down-1",
        "down",
        SocketAddr::from(([127, 0, 0, 1], closed_port())),
    );

    let response = gw.get("/gateway/down/x").await;
    assert_eq!(response.status(), 500);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .starts_with("Request forwarding failed:")
    );
}

// =============================================================================
// Timeout and retry
// =============================================================================

#[tokio::test]
async fn test_get_retried_after_timeout() {
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream =
        spawn_server(slow_then_fast_app(calls.clone(), Duration::from_millis(1500))).await;
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("flaky", "/gateway/flaky/**", "flaky")
                .with_timeout_ms(300)
                .with_retry_attempts(1),
        ],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("flaky-1", "flaky", upstream);

    let response = gw.get("/gateway/flaky/x").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_post_not_retried_after_timeout() {
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream =
        spawn_server(slow_then_fast_app(calls.clone(), Duration::from_millis(1500))).await;
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("flaky", "/gateway/flaky/**", "flaky")
                .with_timeout_ms(300)
                .with_retry_attempts(3),
        ],
        RateLimitSettings::default(),
    )
    .await;
    gw.register("flaky-1", "flaky", upstream);

    let response = gw
        .client
        .post(gw.url("/gateway/flaky/x"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(
        response.text().await.unwrap(),
        "Request forwarding failed: upstream timed out after 300ms"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Rate limiting
// =============================================================================

fn limited(rpm: u64, burst: u64) -> RateLimitSettings {
    RateLimitSettings {
        enabled: true,
        default_limit: RateLimitConfig::per_minute(rpm).with_burst(burst),
        ..RateLimitSettings::default()
    }
}

#[tokio::test]
async fn test_rate_limit_headers_and_429() {
    let upstream = spawn_server(echo_app("rl-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("rl", "/gateway/rl/**", "rl")],
        limited(60, 2),
    )
    .await;
    gw.register("rl-1", "rl", upstream);

    let send = || {
        gw.client
            .get(gw.url("/gateway/rl/x"))
            .header("x-user-id", "bob")
            .send()
    };

    let first = send().await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["x-ratelimit-limit"], "60");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "1");
    assert!(first.headers().contains_key("x-ratelimit-reset"));

    let second = send().await.unwrap();
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers()["x-ratelimit-remaining"], "0");

    let third = send().await.unwrap();
    assert_eq!(third.status(), 429);
    assert_eq!(third.headers()["retry-after"], "1");
    assert_eq!(third.headers()["x-ratelimit-remaining"], "0");
    let body: Value = third.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(
        body["message"],
        "Too many requests. Limit: 60 requests per minute"
    );
    assert_eq!(body["retryAfter"], 1);

    // Another client has its own bucket
    let other = gw
        .client
        .get(gw.url("/gateway/rl/x"))
        .header("x-user-id", "carol")
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), 200);
}

#[tokio::test]
async fn test_health_bypasses_rate_limit() {
    let gw = TestGateway::start(Vec::new(), limited(60, 1)).await;

    for _ in 0..5 {
        let response = gw.get("/health").await;
        assert_eq!(response.status(), 200);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn test_socket_address_identifies_anonymous_clients() {
    let gw = TestGateway::start(Vec::new(), limited(60, 1)).await;

    // Unknown routes still consume tokens; the client is 127.0.0.1
    assert_eq!(gw.get("/gateway/none").await.status(), 404);
    assert_eq!(gw.get("/gateway/none").await.status(), 429);

    let bucket = gw.get("/debug/ratelimit/127.0.0.1").await;
    assert_eq!(bucket.status(), 200);
    let body: Value = bucket.json().await.unwrap();
    assert_eq!(body["client_type"], "ip_based");
}

// =============================================================================
// Debug endpoints
// =============================================================================

#[tokio::test]
async fn test_register_route_and_deregister() {
    let upstream = spawn_server(echo_app("late-1")).await;
    let gw = TestGateway::start(
        vec![RouteDefinition::new("late", "/gateway/late/**", "late")],
        RateLimitSettings::default(),
    )
    .await;

    assert_eq!(gw.get("/gateway/late/x").await.status(), 500);

    let created = gw
        .client
        .post(gw.url("/debug/services"))
        .json(&json!({
            "id": "late-1",
            "name": "late",
            "host": "127.0.0.1",
            "port": upstream.port(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    assert_eq!(gw.get("/gateway/late/x").await.status(), 200);

    let services: Value = gw.get("/debug/services").await.json().await.unwrap();
    assert_eq!(services["total_services"], 1);
    assert_eq!(services["registered_services"]["late"][0]["id"], "late-1");

    let unhealthy = gw
        .client
        .put(gw.url("/debug/services/late-1/health"))
        .json(&json!({ "healthy": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(unhealthy.status(), 200);
    assert_eq!(gw.get("/gateway/late/x").await.status(), 500);

    let deleted = gw
        .client
        .delete(gw.url("/debug/services/late-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let missing = gw
        .client
        .put(gw.url("/debug/services/late-1/health"))
        .json(&json!({ "healthy": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_debug_routes_listing() {
    let gw = TestGateway::start(
        vec![
            RouteDefinition::new("a", "/gateway/a/**", "a"),
            RouteDefinition::new("b", "/b/{id}", "b").with_retry_attempts(0),
        ],
        RateLimitSettings::default(),
    )
    .await;

    let body: Value = gw.get("/debug/routes").await.json().await.unwrap();
    assert_eq!(body["total_routes"], 2);
    assert_eq!(body["configured_routes"][0]["id"], "a");
    assert_eq!(body["configured_routes"][1]["path"], "/b/{id}");
}

#[tokio::test]
async fn test_reset_bucket_restores_capacity() {
    let gw = TestGateway::start(Vec::new(), limited(60, 1)).await;
    let send = || {
        gw.client
            .get(gw.url("/gateway/none"))
            .header("x-api-key", "key-123")
            .send()
    };

    assert_eq!(send().await.unwrap().status(), 404);
    assert_eq!(send().await.unwrap().status(), 429);

    let reset = gw
        .client
        .delete(gw.url("/debug/ratelimit/key-123"))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), 204);

    assert_eq!(send().await.unwrap().status(), 404);
}
