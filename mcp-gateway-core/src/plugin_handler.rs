//! # Plugin Handler
//!
//! Direct in-process dispatch to plugins, and RBAC-filtered aggregation of
//! their capabilities. Tool names are namespaced on the wire as
//! `{plugin}.{tool}`; resource URIs as `plugin://{plugin}/{resource}`;
//! prompts as `{plugin}.{prompt}`.

use crate::error::PluginError;
use crate::plugin::{mime_type_for_value, stringify_value, Plugin};
use crate::types::{PermissionRecord, Prompt, ProcessedCapabilities, Resource, Tool};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A resource read result shaped like MCP's `ResourceContent`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: &'static str,
    pub text: String,
}

pub struct PluginHandlerConfig {
    pub call_timeout: Duration,
    pub max_retries: u32,
}

impl Default for PluginHandlerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

pub struct PluginHandler {
    plugins: HashMap<String, Arc<dyn Plugin>>,
    config: PluginHandlerConfig,
}

impl PluginHandler {
    pub fn new(config: PluginHandlerConfig) -> Self {
        Self {
            plugins: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Plugin names the given capabilities authorize the caller to see at
    /// all (any permission bit set).
    fn authorized_plugins<'a>(&'a self, caps: &ProcessedCapabilities) -> Vec<&'a str> {
        match caps.authorized_plugin_names() {
            None => self.plugins.keys().map(|s| s.as_str()).collect(),
            Some(names) => names
                .iter()
                .filter_map(|n| self.plugins.get_key_value(n).map(|(k, _)| k.as_str()))
                .collect(),
        }
    }

    pub async fn aggregate_tools(&self, caps: &ProcessedCapabilities) -> Vec<Tool> {
        let mut out = Vec::new();
        for name in self.authorized_plugins(caps) {
            let plugin = &self.plugins[name];
            for mut tool in plugin.list_tools().await {
                tool.name = format!("{name}.{}", tool.name);
                out.push(tool);
            }
        }
        out
    }

    pub async fn aggregate_resources(&self, caps: &ProcessedCapabilities) -> Vec<Resource> {
        let mut out = Vec::new();
        for name in self.authorized_plugins(caps) {
            let plugin = &self.plugins[name];
            for mut resource in plugin.list_resources().await {
                resource.uri = format!("plugin://{name}/{}", resource.name);
                out.push(resource);
            }
        }
        out
    }

    pub async fn aggregate_prompts(&self, caps: &ProcessedCapabilities) -> Vec<Prompt> {
        let mut out = Vec::new();
        for name in self.authorized_plugins(caps) {
            let plugin = &self.plugins[name];
            for mut prompt in plugin.list_prompts().await {
                prompt.name = format!("{name}.{}", prompt.name);
                out.push(prompt);
            }
        }
        out
    }

    pub async fn call_tool(
        &self,
        name: &str,
        args: Value,
        caps: &ProcessedCapabilities,
    ) -> Result<Value, PluginError> {
        let permitted = self.authorized_plugins(caps);
        let (plugin_name, tool_name) = self.resolve_tool_name(name, &permitted).await?;

        let record: PermissionRecord = caps.for_plugin(&plugin_name);
        if !record.can_execute {
            return Err(PluginError::Forbidden {
                plugin: plugin_name,
                message: "principal lacks execute permission".to_string(),
            });
        }

        let plugin = self
            .plugins
            .get(&plugin_name)
            .ok_or_else(|| PluginError::NotFound {
                name: plugin_name.clone(),
            })?
            .clone();

        self.call_with_retry(plugin, &plugin_name, &tool_name, args).await
    }

    async fn resolve_tool_name(
        &self,
        name: &str,
        permitted: &[&str],
    ) -> Result<(String, String), PluginError> {
        if let Some((plugin, tool)) = name.split_once('.') {
            if permitted.contains(&plugin) {
                return Ok((plugin.to_string(), tool.to_string()));
            }
        }
        if let Some((plugin, tool)) = name.split_once('_') {
            if permitted.contains(&plugin) {
                return Ok((plugin.to_string(), tool.to_string()));
            }
        }
        for plugin_name in permitted {
            if let Some(plugin) = self.plugins.get(*plugin_name) {
                let has = plugin
                    .list_tools()
                    .await
                    .iter()
                    .any(|t| t.name == name);
                if has {
                    return Ok((plugin_name.to_string(), name.to_string()));
                }
            }
        }
        Err(PluginError::NotFound {
            name: name.to_string(),
        })
    }

    async fn call_with_retry(
        &self,
        plugin: Arc<dyn Plugin>,
        plugin_name: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<Value, PluginError> {
        let mut attempt = 0;
        loop {
            let call = tokio::time::timeout(
                self.config.call_timeout,
                plugin.call_tool(tool_name, args.clone()),
            )
            .await;

            match call {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if attempt < self.config.max_retries && is_transient(&err) => {
                    let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        continue;
                    }
                    return Err(PluginError::Timeout {
                        plugin: plugin_name.to_string(),
                    });
                }
            }
        }
    }

    pub async fn read_resource(
        &self,
        uri: &str,
        caps: &ProcessedCapabilities,
    ) -> Result<ResourceContent, PluginError> {
        let (plugin_name, resource_name) = parse_plugin_uri(uri)?;

        let record = caps.for_plugin(&plugin_name);
        if !record.can_read {
            return Err(PluginError::Forbidden {
                plugin: plugin_name,
                message: "principal lacks read permission".to_string(),
            });
        }

        let plugin = self
            .plugins
            .get(&plugin_name)
            .ok_or_else(|| PluginError::NotFound {
                name: plugin_name.clone(),
            })?;

        let value = plugin.read_resource(&resource_name).await?;
        let mime_type = mime_type_for_value(&value);
        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type,
            text: stringify_value(&value),
        })
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        args: Value,
        caps: &ProcessedCapabilities,
    ) -> Result<Value, PluginError> {
        let permitted = self.authorized_plugins(caps);
        let (plugin_name, prompt_name) = if let Some((plugin, prompt)) = name.split_once('.') {
            (plugin.to_string(), prompt.to_string())
        } else {
            return Err(PluginError::NotFound {
                name: name.to_string(),
            });
        };
        if !permitted.contains(&plugin_name.as_str()) {
            return Err(PluginError::NotFound {
                name: name.to_string(),
            });
        }
        let record = caps.for_plugin(&plugin_name);
        if !record.can_read {
            return Err(PluginError::Forbidden {
                plugin: plugin_name,
                message: "principal lacks read permission".to_string(),
            });
        }
        let plugin = self
            .plugins
            .get(&plugin_name)
            .ok_or_else(|| PluginError::NotFound {
                name: plugin_name.clone(),
            })?;
        plugin.get_prompt(&prompt_name, args).await
    }
}

/// Parses a `plugin://{plugin}/{resource}` URI into its parts.
pub fn parse_plugin_uri(uri: &str) -> Result<(String, String), PluginError> {
    let rest = uri
        .strip_prefix("plugin://")
        .ok_or_else(|| PluginError::InvalidUri {
            uri: uri.to_string(),
        })?;
    let (plugin, resource) = rest.split_once('/').ok_or_else(|| PluginError::InvalidUri {
        uri: uri.to_string(),
    })?;
    if plugin.is_empty() || resource.is_empty() {
        return Err(PluginError::InvalidUri {
            uri: uri.to_string(),
        });
    }
    Ok((plugin.to_string(), resource.to_string()))
}

fn is_transient(err: &PluginError) -> bool {
    matches!(err, PluginError::Timeout { .. })
}

/// Convenience JSON shape for the `plugins/capabilities` introspection
/// method.
pub fn capability_summary(names: &[String]) -> Value {
    json!({ "plugins": names })
}
