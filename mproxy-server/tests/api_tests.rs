//! Integration tests for mproxy-server API endpoints
//!
//! Tests cover:
//! - Proxy endpoint (GET and POST) under the fixed and pooled policies
//! - Envelope codes for request errors (400) and upstream failures (500)
//! - Health and provider listing endpoints
//! - CORS headers
//!
//! Upstreams are a stub axum server bound to an ephemeral loopback port.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use mproxy_common::config::{
    FirstPartyEndpoints, PoolDialect, PoolEndpoint, ProviderPolicy, ProvidersConfig,
};
use mproxy_common::ProxyConfig;
use mproxy_server::provider::{ProviderEndpoint, ProviderSelector};
use mproxy_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: Start a stub upstream and return its base URL
///
/// - `/unavailable` answers 503
/// - `/html` answers 200 with a non-JSON body
/// - `/slow` answers after 3 seconds
/// - `/large` answers with a 4 KiB JSON document
/// - anything else echoes path, query and selected request headers as JSON
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route(
            "/unavailable",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
        )
        .route("/html", get(|| async { "<html>not json</html>" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"late": true}))
            }),
        )
        .route(
            "/large",
            get(|| async { Json(json!({"padding": "x".repeat(4096)})) }),
        )
        .fallback(echo);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn echo(uri: Uri, headers: HeaderMap) -> Json<Value> {
    let get_header = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "path": uri.path(),
        "query": uri.query(),
        "referer": get_header(header::REFERER),
        "origin": get_header(header::ORIGIN),
        "user_agent": get_header(header::USER_AGENT),
    }))
}

/// Test helper: Fixed-policy config whose netease endpoints live under `prefix`
fn fixed_config(base: &str, prefix: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.providers.fixed.insert(
        "netease".to_string(),
        FirstPartyEndpoints {
            search: format!("{}{}/search", base, prefix),
            song_url: format!("{}{}/url", base, prefix),
            lyric: format!("{}{}/lyric", base, prefix),
            detail: format!("{}{}/detail", base, prefix),
        },
    );
    config
}

/// Test helper: Fixed-policy config where every endpoint is the same path
fn fixed_config_all(base: &str, path: &str) -> ProxyConfig {
    let url = format!("{}{}", base, path);
    let mut config = ProxyConfig::default();
    config.providers.fixed.insert(
        "netease".to_string(),
        FirstPartyEndpoints {
            search: url.clone(),
            song_url: url.clone(),
            lyric: url.clone(),
            detail: url,
        },
    );
    config
}

/// Test helper: Pooled-policy config
fn pooled_config(entries: Vec<(String, PoolDialect)>) -> ProxyConfig {
    ProxyConfig {
        providers: ProvidersConfig {
            policy: ProviderPolicy::Pooled,
            pool: entries
                .into_iter()
                .map(|(url, dialect)| PoolEndpoint { url, dialect })
                .collect(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Test helper: App state that talks to the loopback stub directly
fn test_state(config: &ProxyConfig) -> AppState {
    let mut config = config.clone();
    config.upstream.use_system_proxy = false;
    AppState::new(&config).expect("Should build app state")
}

fn setup_app(config: &ProxyConfig) -> Router {
    build_router(test_state(config))
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Fixed Policy
// =============================================================================

#[tokio::test]
async fn test_search_success_wraps_upstream_json() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (status, body) = call(&app, get_request("/?types=search&keywords=a%20b&limit=5")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["types"], "search");
    assert_eq!(body["source"], "netease");
    assert!(body["timestamp"].is_i64());
    assert!(body.get("providerUsed").is_none());
    assert_eq!(body["data"]["path"], "/api/search");
    assert_eq!(body["data"]["query"], "s=a%20b&type=1&limit=5&offset=0");
}

#[tokio::test]
async fn test_upstream_sees_browser_headers() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (_, body) = call(&app, get_request("/?types=lyric&id=1")).await;

    assert_eq!(body["data"]["referer"], "https://music.163.com/");
    assert_eq!(body["data"]["origin"], "https://music.163.com");
    assert!(body["data"]["user_agent"]
        .as_str()
        .unwrap()
        .starts_with("Mozilla/5.0"));
}

#[tokio::test]
async fn test_song_url_level_resolution() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (_, body) = call(&app, get_request("/?types=url&id=33&br=lossless")).await;
    let query = body["data"]["query"].as_str().unwrap();
    assert!(query.contains("br=999000"));
    assert!(query.ends_with("level=lossless"));

    let (status, body) = call(&app, get_request("/?types=url&id=33&br=bogus")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["query"].as_str().unwrap().ends_with("level=exhigh"));
}

#[tokio::test]
async fn test_unknown_type_is_400() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (status, body) = call(&app, get_request("/?types=playlist&id=1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["types"], "playlist");
    assert_eq!(body["msg"], "Unsupported request type");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_missing_type_is_400() {
    let app = setup_app(&ProxyConfig::default());

    let (status, body) = call(&app, get_request("/")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body.get("types").is_none());
}

#[tokio::test]
async fn test_unknown_source_is_400() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (status, body) = call(&app, get_request("/?types=search&keywords=x&source=kuwo")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Unsupported platform or request type");
    assert_eq!(body["source"], "kuwo");
    assert_eq!(body["types"], "search");
}

#[tokio::test]
async fn test_missing_id_is_400() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (status, body) = call(&app, get_request("/?types=detail")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Missing required parameter: id");
}

#[tokio::test]
async fn test_upstream_503_is_500_with_status_in_msg() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config_all(&base, "/unavailable"));

    let (status, body) = call(&app, get_request("/?types=lyric&id=9")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert_eq!(body["types"], "lyric");
    let msg = body["msg"].as_str().unwrap();
    assert!(msg.contains("503"), "msg was {msg}");
    assert!(msg.starts_with("Proxy request failed: "));
}

#[tokio::test]
async fn test_upstream_non_json_is_500_echoing_types() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config_all(&base, "/html"));

    let (status, body) = call(&app, get_request("/?types=detail&id=9")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert_eq!(body["types"], "detail");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_upstream_timeout_is_500() {
    let base = spawn_upstream().await;
    let mut config = fixed_config_all(&base, "/slow");
    config.upstream.timeout_secs = 1;
    let app = setup_app(&config);

    let (status, body) = call(&app, get_request("/?types=lyric&id=1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["msg"]
        .as_str()
        .unwrap()
        .contains("Upstream unreachable"));
}

#[tokio::test]
async fn test_upstream_body_over_limit_is_500() {
    let base = spawn_upstream().await;
    let mut config = fixed_config_all(&base, "/large");
    config.upstream.max_body_bytes = 1024;
    let app = setup_app(&config);

    let (status, body) = call(&app, get_request("/?types=detail&id=1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["types"], "detail");
    assert_eq!(
        body["msg"],
        "Proxy request failed: Upstream response exceeds 1024 bytes"
    );

    // Same body passes under the default limit
    let app = setup_app(&fixed_config_all(&base, "/large"));
    let (status, body) = call(&app, get_request("/?types=detail&id=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["padding"].as_str().unwrap().len(), 4096);
}

#[tokio::test]
async fn test_repeated_types_is_400_envelope() {
    let app = setup_app(&ProxyConfig::default());

    let response = app
        .clone()
        .oneshot(get_request("/?types=search&types=url&id=1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["types"], "search");
    assert!(body["timestamp"].is_i64());
    let msg = body["msg"].as_str().unwrap();
    assert!(msg.starts_with("Invalid query string"), "msg was {msg}");
    assert!(msg.contains("types"));
}

#[tokio::test]
async fn test_repeated_id_is_400_envelope() {
    let app = setup_app(&ProxyConfig::default());

    let (status, body) = call(&app, get_request("/?types=lyric&id=1&id=2")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["types"], "lyric");
    assert!(body["msg"].as_str().unwrap().contains("id"));
}

// =============================================================================
// POST /
// =============================================================================

#[tokio::test]
async fn test_post_json_body_same_as_get() {
    let base = spawn_upstream().await;
    let app = setup_app(&fixed_config(&base, "/api"));

    let (status, body) = call(&app, post_json("/", r#"{"types":"lyric","id":42}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["path"], "/api/lyric");
    assert_eq!(body["data"]["query"], "id=42&lv=-1&kv=-1&tv=-1");
}

#[tokio::test]
async fn test_post_malformed_body_is_400_envelope() {
    let app = setup_app(&ProxyConfig::default());

    let (status, body) = call(&app, post_json("/", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["msg"].as_str().unwrap().starts_with("Invalid request body"));
    assert!(body.get("types").is_none());
}

// =============================================================================
// Pooled Policy
// =============================================================================

/// Always picks the last pool entry
struct LastSelector;

impl ProviderSelector for LastSelector {
    fn choose<'a>(&self, pool: &'a [ProviderEndpoint]) -> Option<&'a ProviderEndpoint> {
        pool.last()
    }
}

#[tokio::test]
async fn test_pooled_random_selection_varies() {
    let base = spawn_upstream().await;
    let config = pooled_config(vec![
        (format!("{}/a", base), PoolDialect::Rest),
        (format!("{}/b", base), PoolDialect::Rest),
    ]);
    let app = setup_app(&config);

    let mut used = HashSet::new();
    for _ in 0..40 {
        let (status, body) = call(&app, get_request("/?types=lyric&id=1")).await;
        assert_eq!(status, StatusCode::OK);
        used.insert(body["providerUsed"].as_str().unwrap().to_string());
    }

    assert!(used.len() > 1, "only saw {:?}", used);
}

#[tokio::test]
async fn test_pooled_injected_selector_and_dialects() {
    let base = spawn_upstream().await;
    let config = pooled_config(vec![
        (format!("{}/rest", base), PoolDialect::Rest),
        (format!("{}/relay", base), PoolDialect::Relay),
    ]);
    let state = test_state(&config).with_selector(Arc::new(LastSelector));
    let app = build_router(state);

    let (status, body) = call(&app, get_request("/?types=search&keywords=x%20y")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providerUsed"], format!("{}/relay", base));
    assert_eq!(body["data"]["path"], "/relay");
    assert_eq!(body["data"]["query"], "type=search&id=x%20y");

    // Relay dialect has no detail form
    let (status, body) = call(&app, get_request("/?types=detail&id=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Unsupported platform or request type");
}

#[tokio::test]
async fn test_pooled_ignores_source() {
    let base = spawn_upstream().await;
    let app = setup_app(&pooled_config(vec![(base.clone(), PoolDialect::Rest)]));

    let (status, body) = call(&app, get_request("/?types=detail&id=5&source=kuwo")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "kuwo");
    assert_eq!(body["data"]["path"], "/song/detail");
    assert_eq!(body["data"]["query"], "ids=5");
}

// =============================================================================
// Health and Provider Listing
// =============================================================================

#[tokio::test]
async fn test_health_ignores_query_and_has_no_code() {
    let app = setup_app(&ProxyConfig::default());

    let (status, body) = call(&app, get_request("/health?types=bogus&code=500")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "music-proxy");
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_i64());
    assert!(body.get("code").is_none());
    assert!(body.get("availableAPIs").is_none());
}

#[tokio::test]
async fn test_pooled_health_and_apis() {
    let config = pooled_config(vec![
        ("https://one.example".to_string(), PoolDialect::Rest),
        ("https://two.example".to_string(), PoolDialect::Relay),
    ]);
    let app = setup_app(&config);

    let (_, health) = call(&app, get_request("/health")).await;
    assert_eq!(health["availableAPIs"], 2);

    let (status, apis) = call(&app, get_request("/apis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(apis["code"], 200);
    assert_eq!(apis["count"], 2);
    assert_eq!(
        apis["data"],
        json!(["https://one.example", "https://two.example"])
    );
}

#[tokio::test]
async fn test_apis_not_found_under_fixed_policy() {
    let app = setup_app(&ProxyConfig::default());

    let response = app.oneshot(get_request("/apis")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let app = setup_app(&ProxyConfig::default());

    let response = app.oneshot(get_request("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = setup_app(&ProxyConfig::default());

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .header(header::ORIGIN, "https://player.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight_allows_post() {
    let app = setup_app(&ProxyConfig::default());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://player.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}
