//! Agent tools bridging the tagging agent to the hub client.

use std::sync::Arc;

use async_trait::async_trait;
use curator_agent_core::{AgentTool, ToolExecutionResult};
use curator_ai::ToolDefinition;
use serde_json::{json, Value};

fn required_string_argument(arguments: &Value, name: &str) -> Result<String, String> {
    let value = arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(format!("missing required argument '{name}'"));
    }
    Ok(value.to_string())
}

/// Reads the current tag set of a repository.
pub struct RepoTagsReadTool {
    client: Arc<crate::HubClient>,
}

impl RepoTagsReadTool {
    pub fn new(client: Arc<crate::HubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for RepoTagsReadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "repo_tags_read".to_string(),
            description: "Read the current tags of a hub repository.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo_name": {
                        "type": "string",
                        "description": "Namespaced repository name, e.g. acme/widget"
                    }
                },
                "required": ["repo_name"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let repo_name = match required_string_argument(&arguments, "repo_name") {
            Ok(value) => value,
            Err(message) => return ToolExecutionResult::error(json!(message)),
        };

        match self.client.get_repo_tags(&repo_name).await {
            Ok(tags) => ToolExecutionResult::ok(json!({
                "repo_name": repo_name,
                "tags": tags,
            })),
            Err(error) => ToolExecutionResult::error(json!(format!(
                "failed to read tags for '{repo_name}': {error}"
            ))),
        }
    }
}

/// Adds a single tag to a repository.
pub struct RepoTagAddTool {
    client: Arc<crate::HubClient>,
}

impl RepoTagAddTool {
    pub fn new(client: Arc<crate::HubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for RepoTagAddTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "repo_tag_add".to_string(),
            description: "Add one tag to a hub repository. Read the current \
                          tags first and only add tags that are not already present."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "repo_name": {
                        "type": "string",
                        "description": "Namespaced repository name, e.g. acme/widget"
                    },
                    "tag": {
                        "type": "string",
                        "description": "Tag to add"
                    }
                },
                "required": ["repo_name", "tag"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let repo_name = match required_string_argument(&arguments, "repo_name") {
            Ok(value) => value,
            Err(message) => return ToolExecutionResult::error(json!(message)),
        };
        let tag = match required_string_argument(&arguments, "tag") {
            Ok(value) => value,
            Err(message) => return ToolExecutionResult::error(json!(message)),
        };

        match self.client.add_repo_tag(&repo_name, &tag).await {
            Ok(()) => ToolExecutionResult::ok(json!({
                "repo_name": repo_name,
                "tag": tag,
                "added": true,
            })),
            Err(error) => ToolExecutionResult::error(json!(format!(
                "failed to add tag '{tag}' to '{repo_name}': {error}"
            ))),
        }
    }
}
