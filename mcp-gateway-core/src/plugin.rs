//! # Plugin Interface
//!
//! The contract every in-process plugin satisfies. Plugins are registered
//! as `Provider`s with the reserved `plugin://internal` endpoint; the
//! `PluginHandler` is the transport for dispatch into them and owns the
//! RBAC-filtered aggregation logic described for the gateway's plugin
//! runtime.

use crate::error::PluginError;
use crate::types::{Prompt, Resource, Tool};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Contract each in-process plugin satisfies.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable plugin name, used for namespacing (`{plugin}.{tool}`) and as
    /// the RBAC permission key.
    fn name(&self) -> &str;

    async fn initialize(&self) -> Result<(), PluginError>;

    async fn shutdown(&self) -> Result<(), PluginError>;

    async fn health_check(&self) -> PluginHealth;

    async fn list_tools(&self) -> Vec<Tool>;

    async fn list_resources(&self) -> Vec<Resource>;

    async fn list_prompts(&self) -> Vec<Prompt>;

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, PluginError>;

    async fn read_resource(&self, resource: &str) -> Result<Value, PluginError>;

    async fn get_prompt(&self, prompt: &str, args: Value) -> Result<Value, PluginError>;
}

/// Derives the MCP `mimeType` for a plugin resource value by shape: string
/// payloads are `text/plain`, structured (object/array) payloads are
/// `application/json`, anything else falls back to
/// `application/octet-stream`.
pub fn mime_type_for_value(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "text/plain",
        Value::Object(_) | Value::Array(_) => "application/json",
        _ => "application/octet-stream",
    }
}

/// Stringifies a plugin result the way `resources/read` formats its
/// `ResourceContent.text` field: strings pass through, everything else is
/// serialized as JSON text.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
