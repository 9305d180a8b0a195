use crate::error::PluginError;
use crate::plugin::{Plugin, PluginHealth};
use crate::types::{Prompt, Resource, Tool};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

/// File-buffer editor facade over an in-memory buffer map. Stands in for a
/// real file-editing integration whose business logic is out of scope;
/// only the tool contract (`editor_open`, `editor_edit`, `editor_save`)
/// matters.
pub struct EditorPlugin {
    buffers: DashMap<String, String>,
}

impl Default for EditorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorPlugin {
    pub fn new() -> Self {
        Self {
            buffers: DashMap::new(),
        }
    }

    fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, PluginError> {
        args.get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PluginError::ExecutionFailed {
                plugin: "editor".to_string(),
                message: format!("missing string argument `{key}`"),
            })
    }
}

#[async_trait]
impl Plugin for EditorPlugin {
    fn name(&self) -> &str {
        "editor"
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.buffers.clear();
        Ok(())
    }

    async fn health_check(&self) -> PluginHealth {
        PluginHealth::Healthy
    }

    async fn list_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "editor_open".to_string(),
                description: "Open a path into an in-memory buffer".to_string(),
                category: Some("editor".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
            Tool {
                name: "editor_edit".to_string(),
                description: "Replace the contents of an open buffer".to_string(),
                category: Some("editor".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                    "required": ["path", "content"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: false,
            },
            Tool {
                name: "editor_save".to_string(),
                description: "Report the current buffer contents".to_string(),
                category: Some("editor".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
        ]
    }

    async fn list_resources(&self) -> Vec<Resource> {
        vec![]
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        vec![]
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, PluginError> {
        match tool {
            "editor_open" => {
                let path = Self::arg_str(&args, "path")?.to_string();
                self.buffers.entry(path.clone()).or_insert_with(String::new);
                Ok(json!({"opened": path}))
            }
            "editor_edit" => {
                let path = Self::arg_str(&args, "path")?.to_string();
                let content = Self::arg_str(&args, "content")?.to_string();
                self.buffers.insert(path.clone(), content);
                Ok(json!({"edited": path}))
            }
            "editor_save" => {
                let path = Self::arg_str(&args, "path")?;
                let content = self
                    .buffers
                    .get(path)
                    .map(|v| v.clone())
                    .ok_or_else(|| PluginError::ExecutionFailed {
                        plugin: "editor".to_string(),
                        message: format!("no open buffer for `{path}`"),
                    })?;
                Ok(json!({"path": path, "content": content}))
            }
            other => Err(PluginError::ToolNotFound {
                plugin: "editor".to_string(),
                tool: other.to_string(),
            }),
        }
    }

    async fn read_resource(&self, resource: &str) -> Result<Value, PluginError> {
        Err(PluginError::ResourceNotFound {
            plugin: "editor".to_string(),
            resource: resource.to_string(),
        })
    }

    async fn get_prompt(&self, prompt: &str, _args: Value) -> Result<Value, PluginError> {
        Err(PluginError::PromptNotFound {
            plugin: "editor".to_string(),
            prompt: prompt.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_edit_save_round_trips() {
        let plugin = EditorPlugin::new();
        plugin
            .call_tool("editor_open", json!({"path": "a.txt"}))
            .await
            .unwrap();
        plugin
            .call_tool("editor_edit", json!({"path": "a.txt", "content": "hi"}))
            .await
            .unwrap();
        let saved = plugin
            .call_tool("editor_save", json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(saved["content"], json!("hi"));
    }
}
