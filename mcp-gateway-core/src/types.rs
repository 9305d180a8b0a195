//! # Capability Records and Data Model
//!
//! The immutable descriptors (`Tool`, `Resource`, `Prompt`) and the mutable
//! per-provider record (`Provider`) that the registry, load balancer and
//! plugin handler all operate on. These mirror the data model described for
//! the registry one-to-one; nothing here performs dispatch or I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The reserved endpoint scheme for in-process plugins.
pub const PLUGIN_ENDPOINT: &str = "plugin://internal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Registering,
    Active,
    Inactive,
    Error,
    Draining,
    Maintenance,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub input_schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Declared by the provider/plugin as safe to retry without side
    /// effects; consulted by the router's idempotent-retry policy.
    #[serde(default)]
    pub idempotent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    pub r#type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Optional rate limit attached to a provider's security block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub requests_per_minute: u32,
}

/// Security metadata carried alongside a provider registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityBlock {
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub allowed_clients: Vec<String>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSpec>,
}

/// Per-provider runtime counters, distinct from the load balancer's
/// `ServiceState` (which owns selection-time bookkeeping). These track
/// registry-observed activity: how often the provider has been seen and
/// how its health probes have gone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCounters {
    pub request_count: u64,
    pub error_count: u64,
    pub average_latency_ms: f64,
    pub consecutive_failures: u32,
}

/// A registered dispatch target: an in-process plugin (`endpoint =
/// "plugin://internal"`) or an external HTTP(S) MCP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub r#type: String,
    pub version: String,
    pub endpoint: String,
    pub protocol: String,

    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,

    pub status: ProviderStatus,
    pub health: HealthState,

    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,

    #[serde(default)]
    pub counters: ProviderCounters,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub configuration: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub security: SecurityBlock,
}

impl Provider {
    pub fn is_plugin(&self) -> bool {
        self.endpoint.starts_with("plugin://")
    }

    pub fn is_selectable(&self) -> bool {
        self.status == ProviderStatus::Active && self.health == HealthState::Healthy
    }
}

/// A provider registration request, as received by `RegisterService` / the
/// admin `POST /services` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRegistration {
    pub name: String,
    pub r#type: String,
    pub version: String,
    pub endpoint: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub configuration: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub security: SecurityBlock,
}

fn default_protocol() -> String {
    "mcp".to_string()
}

/// Aggregate capability counts maintained per provider `type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesByType {
    pub tool_count: usize,
    pub tool_categories: HashSet<String>,
    pub resource_count: usize,
    pub resource_types: HashSet<String>,
    pub prompt_count: usize,
    pub prompt_categories: HashSet<String>,
}

impl CapabilitiesByType {
    /// Fold a provider's capabilities into this aggregate (used on
    /// register). Inverse of `remove`.
    pub fn add(&mut self, provider: &Provider) {
        self.tool_count += provider.tools.len();
        for t in &provider.tools {
            if let Some(c) = &t.category {
                self.tool_categories.insert(c.clone());
            }
        }
        self.resource_count += provider.resources.len();
        for r in &provider.resources {
            if let Some(t) = &r.r#type {
                self.resource_types.insert(t.clone());
            }
        }
        self.prompt_count += provider.prompts.len();
        for p in &provider.prompts {
            if let Some(c) = p.metadata.get("category").and_then(|v| v.as_str()) {
                self.prompt_categories.insert(c.to_string());
            }
        }
    }

    /// Remove a provider's contribution (used on unregister). Category sets
    /// are rebuilt from the remaining providers by the caller rather than
    /// decremented in place, since set membership isn't a simple counter.
    pub fn remove_counts(&mut self, provider: &Provider) {
        self.tool_count = self.tool_count.saturating_sub(provider.tools.len());
        self.resource_count = self.resource_count.saturating_sub(provider.resources.len());
        self.prompt_count = self.prompt_count.saturating_sub(provider.prompts.len());
    }
}

/// A single plugin's permission record for one principal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub can_read: bool,
    pub can_write: bool,
    pub can_execute: bool,
    pub can_admin: bool,
}

impl PermissionRecord {
    pub fn full() -> Self {
        Self {
            can_read: true,
            can_write: true,
            can_execute: true,
            can_admin: true,
        }
    }
}

/// Per-principal plugin permission map, keyed by plugin name or the
/// wildcard `"*"`. A wildcard entry only applies when it is the sole entry.
#[derive(Debug, Clone, Default)]
pub struct ProcessedCapabilities {
    pub permissions: HashMap<String, PermissionRecord>,
}

impl ProcessedCapabilities {
    pub fn wildcard(record: PermissionRecord) -> Self {
        let mut permissions = HashMap::new();
        permissions.insert("*".to_string(), record);
        Self { permissions }
    }

    /// Resolve the effective permission record for a given plugin name.
    pub fn for_plugin(&self, plugin: &str) -> PermissionRecord {
        if self.permissions.len() == 1 {
            if let Some(record) = self.permissions.get("*") {
                return *record;
            }
        }
        self.permissions.get(plugin).copied().unwrap_or_default()
    }

    /// Names of plugins this principal may see at all (any permission bit
    /// set), used for capability aggregation. Returns `None` when the sole
    /// entry is a wildcard, meaning "all plugins".
    pub fn authorized_plugin_names(&self) -> Option<Vec<String>> {
        if self.permissions.len() == 1 && self.permissions.contains_key("*") {
            return None;
        }
        Some(self.permissions.keys().cloned().collect())
    }
}
