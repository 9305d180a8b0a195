//! End-to-end HTTP surface tests driven through `axum-test::TestServer`
//! against the router `create_server` returns — no component is mocked.

use axum::http::StatusCode;
use axum_test::TestServer;
use mcp_gateway::config::Config;
use mcp_gateway::server::create_server;
use serde_json::json;

async fn server_with(config: Config) -> TestServer {
    let app = create_server(config).await.unwrap();
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn registration_and_tools_list_reflects_builtin_memory_plugin() {
    let server = server_with(Config::default()).await;

    let response = server
        .post("/mcp")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<serde_json::Value>();
    let tools: Vec<String> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert!(tools.contains(&"memory.memory_set".to_string()));
    assert!(tools.contains(&"memory.memory_get".to_string()));
}

#[tokio::test]
async fn plugin_resource_read_returns_memory_stats() {
    let server = server_with(Config::default()).await;

    let response = server
        .post("/mcp")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": { "uri": "plugin://memory/memory_stats" },
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<serde_json::Value>();
    let content = &body["result"]["uri"];
    assert_eq!(content, "plugin://memory/memory_stats");
    assert_eq!(body["result"]["mime_type"], "application/json");
}

#[tokio::test]
async fn rate_limit_returns_429_on_the_third_request_in_one_second() {
    let mut config = Config::default();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 2;
    let server = server_with(config).await;

    let first = server.get("/health").await;
    let second = server.get("/health").await;
    let third = server.get("/health").await;

    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(second.status_code(), StatusCode::OK);
    assert_eq!(third.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(third.headers().get("x-ratelimit-limit").unwrap(), "2");
    assert!(third.headers().get("x-ratelimit-reset").is_some());
    assert!(third.headers().get("retry-after").is_some());
    let body = third.json::<serde_json::Value>();
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert!(body["message"].is_string());
    assert!(body["retry_after"].is_number());
    assert!(body["reset_time"].is_number());
}

#[tokio::test]
async fn admin_auth_rejects_missing_key_and_accepts_matching_key() {
    let mut config = Config::default();
    config.admin.api_key = Some("K".to_string());
    let server = server_with(config).await;

    let unauthorized = server.get("/admin/services").await;
    assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    let unauthorized_body = unauthorized.json::<serde_json::Value>();
    assert_eq!(unauthorized_body["error"], "authentication_required");

    let authorized = server
        .get("/admin/services")
        .add_header(
            axum::http::HeaderName::from_static("x-admin-api-key"),
            axum::http::HeaderValue::from_static("K"),
        )
        .await;
    assert_eq!(authorized.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn wildcard_rbac_allows_listing_but_denies_execution() {
    let mut config = Config::default();
    config.rbac.enabled = true;
    config.rbac.jwt_secret = "test-secret".to_string();
    let server = server_with(config.clone()).await;

    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use mcp_gateway::rbac::GatewayClaims;
    use mcp_gateway_core::PermissionRecord;
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let mut capabilities = std::collections::HashMap::new();
    capabilities.insert(
        "*".to_string(),
        PermissionRecord {
            can_read: true,
            can_write: false,
            can_execute: false,
            can_admin: false,
        },
    );
    let claims = GatewayClaims {
        sub: "wildcard-reader".to_string(),
        iss: config.rbac.issuer.clone(),
        aud: config.rbac.audience.clone(),
        exp: now + 3600,
        iat: now,
        capabilities,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.rbac.jwt_secret.as_bytes()),
    )
    .unwrap();
    let auth_header = format!("Bearer {token}");

    let list_response = server
        .post("/mcp")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_str(&auth_header).unwrap(),
        )
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
        .await;
    assert_eq!(list_response.status_code(), StatusCode::OK);
    let list_body = list_response.json::<serde_json::Value>();
    assert!(!list_body["result"]["tools"].as_array().unwrap().is_empty());

    let call_response = server
        .post("/mcp")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_str(&auth_header).unwrap(),
        )
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "memory.memory_set", "arguments": { "key": "a", "value": "b" } },
        }))
        .await;
    assert_eq!(call_response.status_code(), StatusCode::OK);
    let call_body = call_response.json::<serde_json::Value>();
    assert!(call_body["error"].is_object());
    assert_eq!(call_body["error"]["data"]["kind"], "authorization");
}

#[tokio::test]
async fn resources_read_with_malformed_uri_is_a_validation_error() {
    let server = server_with(Config::default()).await;

    let response = server
        .post("/mcp")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "resources/read",
            "params": { "uri": "plugin://" },
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["error"]["data"]["kind"], "validation");
}
