//! # Gateway Assembly and Shutdown
//!
//! Builds every long-lived piece of the gateway — registry, health
//! monitor, load balancer, plugin handler (with the three reference
//! plugins auto-registered), RBAC engine, rate limiter — folds them into
//! [`AppState`], wires the middleware pipeline and route tree, and spawns
//! the background registry/health loops that run until the root shutdown
//! signal fires.

use crate::config::Config;
use crate::error::GatewayError;
use crate::mcp_router;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::{
    admin_auth_middleware, build_cors_layer, compression_middleware, logging_middleware,
    metrics_middleware, rate_limit_middleware,
};
use crate::rbac::RbacEngine;
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mcp_gateway_core::{
    HealthCheckConfig, HealthMonitor, JsonRpcRequest, LoadBalancer, LoadBalancerConfig,
    PluginHandler, PluginHandlerConfig, RegistryConfig, ServiceRegistry, Strategy,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ServiceRegistry>,
    pub load_balancer: Arc<LoadBalancer>,
    pub health_monitor: Arc<HealthMonitor>,
    pub plugin_handler: Arc<PluginHandler>,
    pub rbac: Arc<RbacEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub http_client: reqwest::Client,
}

/// `CreateServer(config)`. Builds every subsystem, registers the three
/// reference plugins, assembles the router, and returns it ready for
/// `axum::serve`. Background loops are spawned here and own no handle the
/// caller needs — they're cancelled when the process exits.
pub async fn create_server(config: Config) -> anyhow::Result<Router> {
    let config = Arc::new(config);

    let registry = ServiceRegistry::new(RegistryConfig {
        discovery_interval: config.registry.discovery_interval,
        health_check_interval: config.registry.health_check_interval,
        cleanup_interval: config.registry.cleanup_interval,
        inactive_service_timeout: config.registry.inactive_service_timeout,
        max_failures: config.registry.max_failures,
    });

    let strategy = Strategy::parse(&config.load_balancer.strategy)
        .ok_or_else(|| anyhow::anyhow!("unknown load balancer strategy"))?;
    let load_balancer = LoadBalancer::new(LoadBalancerConfig {
        strategy,
        healthy_threshold: config.load_balancer.healthy_threshold,
        circuit_breaker_timeout: config.load_balancer.circuit_breaker_timeout,
        circuit_breaker_enabled: config.load_balancer.circuit_breaker_enabled,
        min_requests_for_ratio: 10,
    });

    let health_monitor = Arc::new(HealthMonitor::new(HealthCheckConfig {
        timeout: config.registry.health_probe_timeout,
        ..Default::default()
    }));

    let mut plugin_handler = PluginHandler::new(PluginHandlerConfig::default());
    plugin_handler.register(Arc::new(mcp_gateway_core::plugins::MemoryPlugin::new()));
    plugin_handler.register(Arc::new(mcp_gateway_core::plugins::VcsPlugin::new()));
    plugin_handler.register(Arc::new(mcp_gateway_core::plugins::EditorPlugin::new()));
    let plugin_handler = Arc::new(plugin_handler);

    let rbac = Arc::new(RbacEngine::new(config.rbac.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.requests_per_second));

    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = Arc::new(AppState {
        config: config.clone(),
        registry: registry.clone(),
        load_balancer: load_balancer.clone(),
        health_monitor: health_monitor.clone(),
        plugin_handler,
        rbac,
        rate_limiter: rate_limiter.clone(),
        http_client,
    });

    spawn_discovery_loop(state.clone());
    spawn_health_loop(state.clone());
    spawn_cleanup_loop(state.clone());
    spawn_rate_limiter_sweep(rate_limiter);

    Ok(build_router(state))
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors);

    let mcp_routes = Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/mcp/tools/list", post(handle_mcp_tools_list))
        .route("/mcp/tools/call", post(handle_mcp_tools_call))
        .route("/mcp/resources/list", post(handle_mcp_resources_list))
        .route("/mcp/resources/read", post(handle_mcp_resources_read))
        .route("/mcp/prompts/list", post(handle_mcp_prompts_list))
        .route("/mcp/prompts/get", post(handle_mcp_prompts_get));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/metrics", get(metrics_endpoint));

    let admin_routes = crate::admin::router().layer(from_fn_with_state(
        state.clone(),
        admin_auth_middleware,
    ));

    Router::new()
        .merge(mcp_routes)
        .merge(health_routes)
        .nest("/admin", admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(state.clone(), logging_middleware))
                .layer(from_fn_with_state(state.clone(), metrics_middleware))
                .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
                .layer(axum::middleware::from_fn(compression_middleware))
                .layer(cors_layer),
        )
        .with_state(state)
}

async fn handle_mcp(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    respond_to_rpc(&state, &headers, request).await
}

/// The `/mcp/{method}` convenience paths: the HTTP path itself supplies the
/// JSON-RPC method, and the request body is taken as-is for `params`.
async fn convenience(
    state: Arc<AppState>,
    headers: axum::http::HeaderMap,
    method: &'static str,
    params: Value,
) -> Response {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: Some(json!(1)),
    };
    respond_to_rpc(&state, &headers, request).await
}

async fn handle_mcp_tools_list(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "tools/list", params).await
}

async fn handle_mcp_tools_call(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "tools/call", params).await
}

async fn handle_mcp_resources_list(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "resources/list", params).await
}

async fn handle_mcp_resources_read(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "resources/read", params).await
}

async fn handle_mcp_prompts_list(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "prompts/list", params).await
}

async fn handle_mcp_prompts_get(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    convenience(state, headers, "prompts/get", params).await
}

async fn respond_to_rpc(
    state: &Arc<AppState>,
    headers: &axum::http::HeaderMap,
    request: JsonRpcRequest,
) -> Response {
    let auth_header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let caps = match state.rbac.resolve(auth_header) {
        Ok(caps) => caps,
        Err(err) => {
            return GatewayError::authentication(err.to_string())
                .with_service("rbac")
                .with_operation("resolve")
                .into_response();
        }
    };
    let response = mcp_router::dispatch(state, request, &caps).await;
    Json(response).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health_live() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    let healthy = !state.registry.get_healthy().await.is_empty();
    if healthy {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready" })),
        )
            .into_response()
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::metrics().render_prometheus(),
    )
}

fn spawn_discovery_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.registry.discovery_interval);
        loop {
            interval.tick().await;
            let reconciled = state.registry.reconcile_discovery().await;
            tracing::debug!(reconciled, "discovery reconciliation pass completed");
        }
    });
}

fn spawn_health_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.registry.health_check_interval);
        loop {
            interval.tick().await;
            let providers = state.registry.get_all().await;
            for provider in providers {
                let (healthy, health_state) = if provider.is_plugin() {
                    match state.plugin_handler.get(&provider.name) {
                        Some(plugin) => {
                            let result = state.health_monitor.probe_plugin(&plugin).await;
                            (result.healthy, result.state)
                        }
                        None => continue,
                    }
                } else {
                    let result = state.health_monitor.probe_external(&provider).await;
                    (result.healthy, result.state)
                };
                crate::metrics::metrics().record_health_check(&provider.id, healthy);
                state
                    .registry
                    .record_health_result(&provider.id, healthy, health_state)
                    .await;
            }
        }
    });
}

fn spawn_cleanup_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.registry.cleanup_interval);
        loop {
            interval.tick().await;
            let removed = state.registry.sweep_inactive().await;
            if !removed.is_empty() {
                tracing::info!(count = removed.len(), "swept inactive services");
            }
            let live_ids: Vec<String> = state.registry.get_all().await.into_iter().map(|p| p.id).collect();
            state.load_balancer.cleanup_stale_state(&live_ids).await;
        }
    });
}

fn spawn_rate_limiter_sweep(rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            rate_limiter.sweep_idle();
        }
    });
}

/// Waits for `ctrl_c` (or, on unix, `SIGTERM`) and returns, letting
/// `axum::serve(...).with_graceful_shutdown(...)` drain in-flight requests
/// for up to `shutdown_timeout` before the process exits.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
