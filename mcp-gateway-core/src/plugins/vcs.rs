use crate::error::PluginError;
use crate::plugin::{Plugin, PluginHealth};
use crate::types::{Prompt, Resource, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// Minimal version-control facade over an in-memory commit log. Stands in
/// for a real VCS integration whose business logic is out of scope; only
/// the tool contract (`vcs_status`, `vcs_diff`, `vcs_commit`) matters.
pub struct VcsPlugin {
    commits: Mutex<Vec<String>>,
}

impl Default for VcsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl VcsPlugin {
    pub fn new() -> Self {
        Self {
            commits: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Plugin for VcsPlugin {
    fn name(&self) -> &str {
        "vcs"
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn health_check(&self) -> PluginHealth {
        PluginHealth::Healthy
    }

    async fn list_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "vcs_status".to_string(),
                description: "Report the current working tree status".to_string(),
                category: Some("vcs".to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
            Tool {
                name: "vcs_diff".to_string(),
                description: "Show the pending diff".to_string(),
                category: Some("vcs".to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: true,
            },
            Tool {
                name: "vcs_commit".to_string(),
                description: "Record a commit message".to_string(),
                category: Some("vcs".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
                output_schema: None,
                examples: vec![],
                metadata: Default::default(),
                idempotent: false,
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
            "vcs_status" => {
                let commits = self.commits.lock().await;
                Ok(json!({"clean": true, "commit_count": commits.len()}))
            }
            "vcs_diff" => Ok(json!({"diff": ""})),
            "vcs_commit" => {
                let message = args
                    .get("message")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| PluginError::ExecutionFailed {
                        plugin: "vcs".to_string(),
                        message: "missing string argument `message`".to_string(),
                    })?
                    .to_string();
                let mut commits = self.commits.lock().await;
                commits.push(message.clone());
                Ok(json!({"committed": message, "revision": commits.len()}))
            }
            other => Err(PluginError::ToolNotFound {
                plugin: "vcs".to_string(),
                tool: other.to_string(),
            }),
        }
    }

    async fn read_resource(&self, resource: &str) -> Result<Value, PluginError> {
        Err(PluginError::ResourceNotFound {
            plugin: "vcs".to_string(),
            resource: resource.to_string(),
        })
    }

    async fn get_prompt(&self, prompt: &str, _args: Value) -> Result<Value, PluginError> {
        Err(PluginError::PromptNotFound {
            plugin: "vcs".to_string(),
            prompt: prompt.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_increments_revision() {
        let plugin = VcsPlugin::new();
        let result = plugin
            .call_tool("vcs_commit", json!({"message": "first"}))
            .await
            .unwrap();
        assert_eq!(result["revision"], json!(1));
    }
}
