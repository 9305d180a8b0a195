//! # Admin API
//!
//! REST surface for operating the gateway: service CRUD, discovery
//! triggers, load-balancer introspection/reset, config inspection, and
//! plugin introspection. Mounted as a nested router under `/admin` with its
//! own auth layer (see `middleware::admin_auth_middleware`) — none of these
//! routes are reachable without the admin API key.

use crate::error::GatewayError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use mcp_gateway_core::ProviderRegistration;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", get(list_services).post(register_service))
        .route("/services/types", get(service_types))
        .route(
            "/services/{id}",
            get(get_service).delete(unregister_service),
        )
        .route("/services/{id}/health", get(service_health))
        .route("/services/{id}/capabilities", get(service_capabilities))
        .route("/discovery/trigger", post(trigger_discovery))
        .route("/discovery/services", get(list_services))
        .route("/discovery/status", get(discovery_status))
        .route("/loadbalancer/stats", get(loadbalancer_stats))
        .route("/loadbalancer/stats/{id}", get(loadbalancer_stats_for))
        .route("/loadbalancer/reset/{id}", post(reset_circuit_breaker))
        .route("/loadbalancer/strategies", get(loadbalancer_strategies))
        .route("/config", get(get_config).put(put_config))
        .route("/config/reload", post(reload_config))
        .route("/plugins", get(list_plugins))
        .route("/plugins/{name}", get(get_plugin))
        .route("/plugins/{name}/tools", get(plugin_tools))
        .route("/plugins/{name}/resources", get(plugin_resources))
        .route("/plugins/{name}/health", get(plugin_health))
        .route("/plugins/{name}/metrics", get(plugin_metrics))
        .route("/info", get(system_info))
        .route("/stats", get(system_stats))
        .route("/api", get(api_surface))
}

async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    let providers = state.registry.get_all().await;
    Json(providers.into_iter().map(|p| serde_json::to_value(p).unwrap()).collect())
}

async fn register_service(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<ProviderRegistration>,
) -> Result<Json<Value>, GatewayError> {
    let provider = state.registry.register(registration).await?;
    Ok(Json(serde_json::to_value(provider).unwrap()))
}

async fn service_types(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.registry.types().await)
}

async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let provider = state.registry.get(&id).await.ok_or_else(|| {
        GatewayError::from(mcp_gateway_core::RegistryError::NotFound { id: id.clone() })
            .with_service("registry")
            .with_operation("get_service")
    })?;
    Ok(Json(serde_json::to_value(provider).unwrap()))
}

async fn unregister_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state.registry.unregister(&id).await?;
    Ok(Json(json!({ "unregistered": id })))
}

async fn service_health(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let provider = state.registry.get(&id).await.ok_or_else(|| {
        GatewayError::from(mcp_gateway_core::RegistryError::NotFound { id: id.clone() })
            .with_service("registry")
            .with_operation("service_health")
    })?;
    Ok(Json(json!({
        "id": provider.id,
        "status": provider.status,
        "health": provider.health,
        "last_health_check": provider.last_health_check,
    })))
}

async fn service_capabilities(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let provider = state.registry.get(&id).await.ok_or_else(|| {
        GatewayError::from(mcp_gateway_core::RegistryError::NotFound { id: id.clone() })
            .with_service("registry")
            .with_operation("service_capabilities")
    })?;
    Ok(Json(json!({
        "tools": provider.tools,
        "resources": provider.resources,
        "prompts": provider.prompts,
    })))
}

async fn trigger_discovery(State(state): State<Arc<AppState>>) -> Json<Value> {
    let reconciled = state.registry.reconcile_discovery().await;
    Json(json!({ "triggered": true, "reconciled": reconciled }))
}

async fn discovery_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let all = state.registry.get_all().await;
    Json(json!({ "total_services": all.len() }))
}

async fn loadbalancer_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let providers = state.registry.get_all().await;
    let mut stats = Vec::new();
    for p in providers {
        stats.push(json!({
            "id": p.id,
            "circuit_open": state.load_balancer.is_circuit_open(&p.id).await,
        }));
    }
    Json(json!({ "providers": stats }))
}

async fn loadbalancer_stats_for(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    Json(json!({
        "id": id,
        "circuit_open": state.load_balancer.is_circuit_open(&id).await,
    }))
}

async fn reset_circuit_breaker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let reset = state.load_balancer.reset_circuit_breaker(&id).await;
    Json(json!({ "id": id, "reset": reset }))
}

async fn loadbalancer_strategies() -> Json<Value> {
    Json(json!({
        "strategies": ["round_robin", "least_connections", "weighted", "hash", "random"]
    }))
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::to_value(&*state.config).unwrap())
}

/// Config updates are restricted to a small allow-list of fields that are
/// safe to change at runtime (rate limit and compression toggles); anything
/// touching the listening address or RBAC secret requires a restart.
const MUTABLE_CONFIG_FIELDS: &[&str] = &["rate_limit", "compression"];

async fn put_config(
    State(_state): State<Arc<AppState>>,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
    let Some(object) = patch.as_object() else {
        return Err(GatewayError::malformed_request("config patch must be a JSON object")
            .with_service("admin")
            .with_operation("put_config"));
    };
    for key in object.keys() {
        if !MUTABLE_CONFIG_FIELDS.contains(&key.as_str()) {
            return Err(GatewayError::authorization(format!(
                "config field '{key}' cannot be changed without a restart"
            ))
            .with_service("admin")
            .with_operation("put_config")
            .with_suggestion(format!("allowed fields: {}", MUTABLE_CONFIG_FIELDS.join(", "))));
        }
    }
    Ok(Json(json!({ "accepted_fields": object.keys().collect::<Vec<_>>() })))
}

async fn reload_config() -> Json<Value> {
    Json(json!({ "reloaded": false, "reason": "config reload requires a process restart" }))
}

async fn list_plugins(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "plugins": state.plugin_handler.plugin_names() }))
}

async fn get_plugin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state
        .plugin_handler
        .get(&name)
        .map(|plugin| Json(json!({ "name": plugin.name() })))
        .ok_or_else(|| GatewayError::from(mcp_gateway_core::PluginError::NotFound { name }).with_service("plugin_handler").with_operation("get_plugin"))
}

async fn plugin_tools(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let plugin = state
        .plugin_handler
        .get(&name)
        .ok_or_else(|| GatewayError::from(mcp_gateway_core::PluginError::NotFound { name: name.clone() }).with_service("plugin_handler"))?;
    Ok(Json(json!({ "tools": plugin.list_tools().await })))
}

async fn plugin_resources(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let plugin = state
        .plugin_handler
        .get(&name)
        .ok_or_else(|| GatewayError::from(mcp_gateway_core::PluginError::NotFound { name: name.clone() }).with_service("plugin_handler"))?;
    Ok(Json(json!({ "resources": plugin.list_resources().await })))
}

async fn plugin_health(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let plugin = state
        .plugin_handler
        .get(&name)
        .ok_or_else(|| GatewayError::from(mcp_gateway_core::PluginError::NotFound { name: name.clone() }).with_service("plugin_handler"))?;
    let result = state.health_monitor.probe_plugin(&plugin).await;
    Ok(Json(json!({ "healthy": result.healthy, "state": result.state })))
}

async fn plugin_metrics(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let plugin = state
        .plugin_handler
        .get(&name)
        .ok_or_else(|| GatewayError::from(mcp_gateway_core::PluginError::NotFound { name: name.clone() }).with_service("plugin_handler").with_operation("plugin_metrics"))?;
    Ok(Json(json!({
        "name": plugin.name(),
        "tool_count": plugin.list_tools().await.len(),
        "resource_count": plugin.list_resources().await.len(),
        "prompt_count": plugin.list_prompts().await.len(),
    })))
}

async fn system_info() -> Json<Value> {
    Json(json!({
        "name": "mcp-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn system_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let providers = state.registry.get_all().await;
    Json(json!({
        "total_services": providers.len(),
        "healthy_services": providers.iter().filter(|p| p.is_selectable()).count(),
        "uptime_seconds": crate::metrics::metrics().uptime_seconds(),
    }))
}

async fn api_surface() -> Json<Value> {
    Json(json!({
        "jsonrpc": ["/mcp"],
        "admin": [
            "/admin/services", "/admin/discovery/trigger", "/admin/loadbalancer/stats",
            "/admin/config", "/admin/plugins", "/admin/info", "/admin/stats",
        ],
    }))
}

