use crate::error::PluginError;
use crate::plugin::{Plugin, PluginHealth};
use crate::types::{Prompt, Resource, Tool};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

/// In-process key/value store plugin. Backs `memory_set`/`memory_get`/
/// `memory_delete`/`memory_list` tools and a `memory_stats` resource.
pub struct MemoryPlugin {
    store: DashMap<String, Value>,
}

impl Default for MemoryPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlugin {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, PluginError> {
        args.get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PluginError::ExecutionFailed {
                plugin: "memory".to_string(),
                message: format!("missing string argument `{key}`"),
            })
    }
}

#[async_trait]
impl Plugin for MemoryPlugin {
    fn name(&self) -> &str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.store.clear();
        Ok(())
    }

    async fn health_check(&self) -> PluginHealth {
        PluginHealth::Healthy
    }

    async fn list_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "memory_set".to_string(),
                description: "Store a value under a key".to_string(),
                category: Some("memory".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}, "value": {}},
                    "required": ["key", "value"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
            Tool {
                name: "memory_get".to_string(),
                description: "Retrieve a value by key".to_string(),
                category: Some("memory".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}},
                    "required": ["key"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
            Tool {
                name: "memory_delete".to_string(),
                description: "Delete a stored key".to_string(),
                category: Some("memory".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}},
                    "required": ["key"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: false,
            },
            Tool {
                name: "memory_list".to_string(),
                description: "List all stored keys".to_string(),
                category: Some("memory".to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
        ]
    }

    async fn list_resources(&self) -> Vec<Resource> {
        vec![Resource {
            uri: "plugin://memory/memory_stats".to_string(),
            name: "memory_stats".to_string(),
            r#type: Some("stats".to_string()),
            mime_type: Some("application/json".to_string()),
            size: None,
            metadata: Default::default(),
        }]
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        vec![]
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, PluginError> {
        match tool {
            "memory_set" => {
                let key = Self::arg_str(&args, "key")?.to_string();
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                self.store.insert(key.clone(), value);
                Ok(json!({"stored": key}))
            }
            "memory_get" => {
                let key = Self::arg_str(&args, "key")?;
                self.store
                    .get(key)
                    .map(|v| v.clone())
                    .ok_or_else(|| PluginError::ExecutionFailed {
                        plugin: "memory".to_string(),
                        message: format!("no value stored for key `{key}`"),
                    })
            }
            "memory_delete" => {
                let key = Self::arg_str(&args, "key")?;
                let removed = self.store.remove(key).is_some();
                Ok(json!({"deleted": removed}))
            }
            "memory_list" => {
                let keys: Vec<String> = self.store.iter().map(|e| e.key().clone()).collect();
                Ok(json!({"keys": keys}))
            }
            other => Err(PluginError::ToolNotFound {
                plugin: "memory".to_string(),
                tool: other.to_string(),
            }),
        }
    }

    async fn read_resource(&self, resource: &str) -> Result<Value, PluginError> {
        match resource {
            "memory_stats" => Ok(json!({"entries": self.store.len()})),
            other => Err(PluginError::ResourceNotFound {
                plugin: "memory".to_string(),
                resource: other.to_string(),
            }),
        }
    }

    async fn get_prompt(&self, prompt: &str, _args: Value) -> Result<Value, PluginError> {
        Err(PluginError::PromptNotFound {
            plugin: "memory".to_string(),
            prompt: prompt.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let plugin = MemoryPlugin::new();
        plugin
            .call_tool("memory_set", json!({"key": "a", "value": 1}))
            .await
            .unwrap();
        let got = plugin.call_tool("memory_get", json!({"key": "a"})).await.unwrap();
        assert_eq!(got, json!(1));
    }

    #[tokio::test]
    async fn missing_key_is_execution_error() {
        let plugin = MemoryPlugin::new();
        let err = plugin
            .call_tool("memory_get", json!({"key": "missing"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn memory_stats_resource_reports_entry_count() {
        let plugin = MemoryPlugin::new();
        plugin
            .call_tool("memory_set", json!({"key": "a", "value": 1}))
            .await
            .unwrap();
        let stats = plugin.read_resource("memory_stats").await.unwrap();
        assert_eq!(stats["entries"], json!(1));
    }
}
