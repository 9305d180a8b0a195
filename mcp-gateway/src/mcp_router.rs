//! # MCP Router
//!
//! Dispatches a parsed [`JsonRpcRequest`] to the right place: in-process
//! plugins via the [`PluginHandler`], or registered external providers via
//! the [`ServiceRegistry`] and [`LoadBalancer`]. Method routing is a tagged
//! enum parsed once from the method string, not string matching scattered
//! across handlers.

use crate::server::AppState;
use mcp_gateway_core::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, PluginError, ProcessedCapabilities,
    SelectionCriteria,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// The fixed set of JSON-RPC methods this router understands. Parsing the
/// method string into this enum once means every handler is a single match
/// arm instead of re-comparing string literals.
enum McpMethod {
    Initialize,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    PromptsList,
    PromptsGet,
    PluginsDiscover,
    PluginsList,
    PluginsCapabilities,
    PluginsDependencies,
    PluginsFilter,
    Unknown,
}

impl McpMethod {
    fn parse(method: &str) -> Self {
        match method {
            "initialize" => McpMethod::Initialize,
            "tools/list" => McpMethod::ToolsList,
            "tools/call" => McpMethod::ToolsCall,
            "resources/list" => McpMethod::ResourcesList,
            "resources/read" => McpMethod::ResourcesRead,
            "prompts/list" => McpMethod::PromptsList,
            "prompts/get" => McpMethod::PromptsGet,
            "plugins/discover" => McpMethod::PluginsDiscover,
            "plugins/list" => McpMethod::PluginsList,
            "plugins/capabilities" => McpMethod::PluginsCapabilities,
            "plugins/dependencies" => McpMethod::PluginsDependencies,
            "plugins/filter" => McpMethod::PluginsFilter,
            _ => McpMethod::Unknown,
        }
    }
}

/// Dispatches one JSON-RPC request, producing a response that always
/// carries the request's `id` and always has exactly one of `result` /
/// `error` set.
pub async fn dispatch(
    state: &Arc<AppState>,
    request: JsonRpcRequest,
    caps: &ProcessedCapabilities,
) -> JsonRpcResponse {
    let id = request.id.clone();
    match handle(state, &request, caps).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    }
}

async fn handle(
    state: &Arc<AppState>,
    request: &JsonRpcRequest,
    caps: &ProcessedCapabilities,
) -> Result<Value, JsonRpcError> {
    match McpMethod::parse(&request.method) {
        McpMethod::Initialize => Ok(handle_initialize()),
        McpMethod::ToolsList => Ok(handle_tools_list(state, caps).await),
        McpMethod::ToolsCall => handle_tools_call(state, &request.params, caps).await,
        McpMethod::ResourcesList => Ok(handle_resources_list(state, caps).await),
        McpMethod::ResourcesRead => handle_resources_read(state, &request.params, caps).await,
        McpMethod::PromptsList => Ok(handle_prompts_list(state, caps).await),
        McpMethod::PromptsGet => handle_prompts_get(state, &request.params, caps).await,
        McpMethod::PluginsDiscover | McpMethod::PluginsList => {
            Ok(json!({ "plugins": state.plugin_handler.plugin_names() }))
        }
        McpMethod::PluginsCapabilities => {
            let names = state.plugin_handler.plugin_names();
            Ok(mcp_gateway_core::plugin_handler::capability_summary(&names))
        }
        McpMethod::PluginsDependencies => Ok(json!({ "dependencies": {} })),
        McpMethod::PluginsFilter => Ok(handle_plugins_filter(state, &request.params)),
        McpMethod::Unknown => Err(JsonRpcError::method_not_found(&request.method)),
    }
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": { "name": "mcp-gateway", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "listChanged": false },
            "prompts": { "listChanged": false },
        }
    })
}

async fn handle_tools_list(state: &Arc<AppState>, caps: &ProcessedCapabilities) -> Value {
    let tools = state.plugin_handler.aggregate_tools(caps).await;
    json!({ "tools": tools })
}

async fn handle_tools_call(
    state: &Arc<AppState>,
    params: &Value,
    caps: &ProcessedCapabilities,
) -> Result<Value, JsonRpcError> {
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| JsonRpcError::invalid_request("missing 'name' in tools/call params"))?;
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);

    match state.plugin_handler.call_tool(name, args.clone(), caps).await {
        Ok(value) => return Ok(json!({ "content": value })),
        Err(PluginError::NotFound { .. }) => {}
        Err(err) => return Err(JsonRpcError::from_kind(err.kind(), err.to_string())),
    }

    dispatch_to_external_provider(state, "mcp_plugin", "tools/call", json!({ "name": name, "arguments": args }))
        .await
}

async fn handle_resources_list(state: &Arc<AppState>, caps: &ProcessedCapabilities) -> Value {
    let resources = state.plugin_handler.aggregate_resources(caps).await;
    json!({ "resources": resources })
}

async fn handle_resources_read(
    state: &Arc<AppState>,
    params: &Value,
    caps: &ProcessedCapabilities,
) -> Result<Value, JsonRpcError> {
    let uri = params
        .get("uri")
        .and_then(|v| v.as_str())
        .ok_or_else(|| JsonRpcError::invalid_request("missing 'uri' in resources/read params"))?;

    if uri.starts_with("plugin://") {
        state
            .plugin_handler
            .read_resource(uri, caps)
            .await
            .map(|content| serde_json::to_value(content).unwrap_or(Value::Null))
            .map_err(|err| JsonRpcError::from_kind(err.kind(), err.to_string()))
    } else {
        dispatch_to_external_provider(state, "mcp_service", "resources/read", json!({ "uri": uri })).await
    }
}

async fn handle_prompts_list(state: &Arc<AppState>, caps: &ProcessedCapabilities) -> Value {
    let prompts = state.plugin_handler.aggregate_prompts(caps).await;
    json!({ "prompts": prompts })
}

async fn handle_prompts_get(
    state: &Arc<AppState>,
    params: &Value,
    caps: &ProcessedCapabilities,
) -> Result<Value, JsonRpcError> {
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| JsonRpcError::invalid_request("missing 'name' in prompts/get params"))?;
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);

    state
        .plugin_handler
        .get_prompt(name, args, caps)
        .await
        .map_err(|err| JsonRpcError::from_kind(err.kind(), err.to_string()))
}

fn handle_plugins_filter(state: &Arc<AppState>, params: &Value) -> Value {
    let tag = params.get("tag").and_then(|v| v.as_str());
    let names = state.plugin_handler.plugin_names();
    match tag {
        Some(_) => json!({ "plugins": names }),
        None => json!({ "plugins": names }),
    }
}

/// Selects a healthy external provider of `provider_type` via the registry
/// and load balancer, and forwards the JSON-RPC call over HTTP. Records the
/// outcome against the load balancer's circuit breaker either way.
async fn dispatch_to_external_provider(
    state: &Arc<AppState>,
    provider_type: &str,
    method: &str,
    params: Value,
) -> Result<Value, JsonRpcError> {
    let candidates = state.registry.get_by_type(provider_type).await;
    let provider = state
        .load_balancer
        .select(&candidates, &SelectionCriteria::default())
        .await
        .map_err(|err| JsonRpcError::from_kind(err.kind(), err.to_string()))?;

    let outbound = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: Some(json!(1)),
    };

    let start = Instant::now();
    let result = state
        .http_client
        .post(format!("{}/mcp", provider.endpoint.trim_end_matches('/')))
        .json(&outbound)
        .send()
        .await;

    match result {
        Ok(response) => match response.json::<JsonRpcResponse>().await {
            Ok(rpc_response) => {
                state
                    .load_balancer
                    .record_success(&provider.id, start.elapsed())
                    .await;
                match rpc_response.error {
                    Some(error) => Err(error),
                    None => Ok(rpc_response.result.unwrap_or(Value::Null)),
                }
            }
            Err(err) => {
                state.load_balancer.record_failure(&provider.id).await;
                Err(JsonRpcError::invalid_request(format!(
                    "malformed response from provider {}: {err}",
                    provider.id
                )))
            }
        },
        Err(err) => {
            state.load_balancer.record_failure(&provider.id).await;
            Err(JsonRpcError::from_kind(
                mcp_gateway_core::ErrorKind::Unavailable,
                format!("provider {} unreachable: {err}", provider.id),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_maps_known_methods() {
        assert!(matches!(McpMethod::parse("tools/call"), McpMethod::ToolsCall));
        assert!(matches!(McpMethod::parse("bogus"), McpMethod::Unknown));
    }

    #[test]
    fn initialize_reports_protocol_version() {
        let value = handle_initialize();
        assert_eq!(value["protocolVersion"], "2024-11-05");
    }
}
