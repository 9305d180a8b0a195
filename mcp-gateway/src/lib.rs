//! # MCP Gateway
//!
//! HTTP surface for the gateway: a JSON-RPC 2.0 endpoint that dispatches
//! MCP calls to in-process plugins or registered external providers, plus
//! an admin REST API for operating the registry, load balancer, and
//! plugin handler defined in `mcp-gateway-core`.
//!
//! ## Architecture
//!
//! - [`config`] — configuration loading, validation, environment overrides
//! - [`rbac`] — JWT-backed capability resolution for inbound requests
//! - [`mcp_router`] — JSON-RPC method dispatch to plugins or providers
//! - [`admin`] — the `/admin` REST surface
//! - [`middleware`] — the HTTP request pipeline (logging, metrics, rate
//!   limiting, compression, CORS, admin auth)
//! - [`metrics`] — Prometheus exposition
//! - [`error`] — the gateway's HTTP-facing error type
//! - [`server`] — ties everything together into a router and owns the
//!   background registry/health loops
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcp_gateway::{config::Config, server::create_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("gateway.toml")?;
//!     let app = create_server(config).await?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod mcp_router;
pub mod metrics;
pub mod middleware;
pub mod rbac;
pub mod server;

pub use config::Config;
pub use error::GatewayError;
pub use server::create_server;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    #[tokio::test]
    async fn health_check_reports_ok() {
        let config = Config::default();
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_prometheus_text() {
        let config = Config::default();
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server.get("/metrics").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.text();
        assert!(body.contains("# HELP"));
    }

    #[tokio::test]
    async fn admin_routes_reject_missing_api_key_when_configured() {
        let mut config = Config::default();
        config.admin.api_key = Some("secret".to_string());
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server.get("/admin/services").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mcp_initialize_reports_protocol_version() {
        let config = Config::default();
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();
        let response = server
            .post("/mcp")
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": "initialize",
                "params": {},
                "id": 1,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    }
}
