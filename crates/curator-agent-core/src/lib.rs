//! Core runtime primitives for building tool-using LLM agents in Curator.
use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use curator_ai::{
    ChatRequest, CuratorAiError, LlmClient, Message, MessageRole, ToolCall, ToolDefinition,
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone)]
/// Public struct `AgentConfig` used across Curator components.
pub struct AgentConfig {
    pub agent_id: String,
    pub model: String,
    pub system_prompt: String,
    pub max_turns: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_timeout_ms: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: "curator-agent".to_string(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: String::new(),
            max_turns: 8,
            temperature: Some(0.0),
            max_tokens: None,
            tool_timeout_ms: Some(60_000),
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates supported `AgentError` values.
pub enum AgentError {
    #[error("ai provider error: {0}")]
    Ai(#[from] CuratorAiError),
    #[error("agent exceeded maximum turns ({0})")]
    MaxTurnsExceeded(usize),
}

#[derive(Debug, Clone)]
/// Public struct `ToolExecutionResult` used across Curator components.
pub struct ToolExecutionResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolExecutionResult {
    /// Creates a successful tool result.
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Creates a failed tool result.
    pub fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// Converts the payload to text for insertion into a tool message.
    pub fn as_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

#[async_trait]
/// Trait contract for `AgentTool` behavior.
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;
}

struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn AgentTool>,
}

/// A bounded-turn agent: sends chat requests with the registered tool
/// definitions, executes any returned tool calls, feeds results back, and
/// stops on the first plain assistant reply.
pub struct Agent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
    messages: Vec<Message>,
    tools: HashMap<String, RegisteredTool>,
}

impl Agent {
    /// Creates a new [`Agent`] with an initial system message when configured.
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        let mut messages = Vec::new();
        if !config.system_prompt.trim().is_empty() {
            messages.push(Message::system(config.system_prompt.clone()));
        }

        Self {
            client,
            config,
            messages,
            tools: HashMap::new(),
        }
    }

    /// Registers a tool exposed to the language model.
    pub fn register_tool<T>(&mut self, tool: T)
    where
        T: AgentTool + 'static,
    {
        let definition = tool.definition();
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                tool: Arc::new(tool),
            },
        );
    }

    /// Returns sorted registered tool names.
    pub fn registered_tool_names(&self) -> Vec<String> {
        let mut names = self.tools.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Full message history, including the system prompt when present.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sends `text` as a user message and runs the turn loop until the model
    /// answers without tool calls. Returns the messages added by this prompt.
    pub async fn prompt(&mut self, text: impl Into<String>) -> Result<Vec<Message>, AgentError> {
        let start_index = self.messages.len();
        self.messages.push(Message::user(text));
        self.run_loop(start_index).await
    }

    async fn run_loop(&mut self, start_index: usize) -> Result<Vec<Message>, AgentError> {
        for _turn in 1..=self.config.max_turns {
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: self.messages.clone(),
                tools: self.tool_definitions(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let response = self.client.complete(request).await?;
            let assistant = response.message;
            self.messages.push(assistant.clone());

            let tool_calls = assistant.tool_calls();
            if tool_calls.is_empty() {
                return Ok(self.messages[start_index..].to_vec());
            }

            for call in tool_calls {
                let result = self.execute_tool_call(&call).await;
                self.messages.push(Message::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    result.as_text(),
                    result.is_error,
                ));
            }
        }

        Err(AgentError::MaxTurnsExceeded(self.config.max_turns))
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> ToolExecutionResult {
        let Some(registered) = self.tools.get(&call.name) else {
            return ToolExecutionResult::error(serde_json::json!(format!(
                "unknown tool '{}'",
                call.name
            )));
        };

        let execution = registered.tool.execute(call.arguments.clone());
        match timeout_duration_from_ms(self.config.tool_timeout_ms) {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => ToolExecutionResult::error(serde_json::json!(format!(
                    "tool '{}' timed out after {}ms",
                    call.name,
                    limit.as_millis()
                ))),
            },
            None => execution.await,
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self
            .tools
            .values()
            .map(|registered| registered.definition.clone())
            .collect::<Vec<_>>();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

/// Returns the text of the last assistant message, if any.
pub fn final_assistant_text(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|message| message.role == MessageRole::Assistant)
        .map(Message::text_content)
}

fn timeout_duration_from_ms(timeout_ms: Option<u64>) -> Option<Duration> {
    timeout_ms
        .filter(|timeout_ms| *timeout_ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use curator_ai::{ChatResponse, ChatUsage, ContentBlock};
    use serde_json::json;

    use super::*;

    struct ScriptedClient {
        responses: Mutex<VecDeque<ChatResponse>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, CuratorAiError> {
            self.responses
                .lock()
                .expect("script lock")
                .pop_front()
                .ok_or_else(|| CuratorAiError::InvalidResponse("script exhausted".to_string()))
        }
    }

    fn assistant_response(content: Vec<ContentBlock>, finish_reason: &str) -> ChatResponse {
        ChatResponse {
            message: Message::assistant_blocks(content),
            finish_reason: Some(finish_reason.to_string()),
            usage: ChatUsage::default(),
        }
    }

    struct EchoTool;

    #[async_trait]
    impl AgentTool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echoes the arguments back".to_string(),
                parameters: json!({ "type": "object" }),
            }
        }

        async fn execute(&self, arguments: Value) -> ToolExecutionResult {
            ToolExecutionResult::ok(arguments)
        }
    }

    struct SlowTool;

    #[async_trait]
    impl AgentTool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".to_string(),
                description: "Sleeps longer than the configured timeout".to_string(),
                parameters: json!({ "type": "object" }),
            }
        }

        async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
            tokio::time::sleep(Duration::from_millis(5_000)).await;
            ToolExecutionResult::ok(json!("never returned"))
        }
    }

    fn tool_call_block(id: &str, name: &str, arguments: Value) -> ContentBlock {
        ContentBlock::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn prompt_executes_tool_calls_and_continues() {
        let client = ScriptedClient::new(vec![
            assistant_response(
                vec![tool_call_block("call-1", "echo", json!({ "value": 7 }))],
                "tool_calls",
            ),
            assistant_response(
                vec![ContentBlock::Text {
                    text: "done".to_string(),
                }],
                "stop",
            ),
        ]);

        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(EchoTool);

        let new_messages = agent.prompt("run the tool").await.expect("prompt");
        let tool_message = new_messages
            .iter()
            .find(|message| message.role == MessageRole::Tool)
            .expect("tool result message");
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call-1"));
        assert!(!tool_message.is_error);
        assert_eq!(
            final_assistant_text(&new_messages).as_deref(),
            Some("done")
        );
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_and_loop_continues() {
        let client = ScriptedClient::new(vec![
            assistant_response(
                vec![tool_call_block("call-1", "missing", json!({}))],
                "tool_calls",
            ),
            assistant_response(
                vec![ContentBlock::Text {
                    text: "recovered".to_string(),
                }],
                "stop",
            ),
        ]);

        let mut agent = Agent::new(client, AgentConfig::default());
        let new_messages = agent.prompt("call something").await.expect("prompt");

        let tool_message = new_messages
            .iter()
            .find(|message| message.role == MessageRole::Tool)
            .expect("tool result message");
        assert!(tool_message.is_error);
        assert!(tool_message.text_content().contains("unknown tool"));
        assert_eq!(
            final_assistant_text(&new_messages).as_deref(),
            Some("recovered")
        );
    }

    #[tokio::test]
    async fn regression_tool_timeout_is_reported_as_error_result() {
        let client = ScriptedClient::new(vec![
            assistant_response(
                vec![tool_call_block("call-1", "slow", json!({}))],
                "tool_calls",
            ),
            assistant_response(
                vec![ContentBlock::Text {
                    text: "gave up on the tool".to_string(),
                }],
                "stop",
            ),
        ]);

        let mut agent = Agent::new(
            client,
            AgentConfig {
                tool_timeout_ms: Some(20),
                ..AgentConfig::default()
            },
        );
        agent.register_tool(SlowTool);

        let new_messages = agent.prompt("be patient").await.expect("prompt");
        let tool_message = new_messages
            .iter()
            .find(|message| message.role == MessageRole::Tool)
            .expect("tool result message");
        assert!(tool_message.is_error);
        assert!(tool_message.text_content().contains("timed out"));
    }

    #[tokio::test]
    async fn max_turns_exceeded_when_model_never_stops_calling_tools() {
        let looping_turn = assistant_response(
            vec![tool_call_block("call-n", "echo", json!({}))],
            "tool_calls",
        );
        let client = ScriptedClient::new(vec![looping_turn.clone(), looping_turn]);

        let mut agent = Agent::new(
            client,
            AgentConfig {
                max_turns: 2,
                ..AgentConfig::default()
            },
        );
        agent.register_tool(EchoTool);

        let error = agent.prompt("loop forever").await.expect_err("max turns");
        assert!(matches!(error, AgentError::MaxTurnsExceeded(2)));
    }

    #[test]
    fn system_prompt_seeds_message_history() {
        let client = ScriptedClient::new(Vec::new());
        let agent = Agent::new(
            client,
            AgentConfig {
                system_prompt: "only use the provided tools".to_string(),
                ..AgentConfig::default()
            },
        );
        assert_eq!(agent.messages().len(), 1);
        assert_eq!(agent.messages()[0].role, MessageRole::System);
    }
}
