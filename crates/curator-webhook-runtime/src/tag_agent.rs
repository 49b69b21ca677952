//! The tool-calling agent adapter: one bounded natural-language instruction
//! per candidate tag, two idempotency-preserving tools, free-text result
//! returned verbatim.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use curator_agent_core::{final_assistant_text, Agent, AgentConfig};
use curator_ai::{OpenAiClient, OpenAiConfig};
use curator_hub::{HubClient, RepoTagAddTool, RepoTagsReadTool};

const TAG_AGENT_SYSTEM_PROMPT: &str = "You curate tags for hub repositories. \
Always read the repository's current tags with repo_tags_read before \
deciding anything. Only call repo_tag_add for a tag that is not already \
present and that fits the repository. Finish with a one-sentence summary of \
what you did.";

const TAG_AGENT_MAX_TURNS: usize = 6;

#[async_trait]
/// Trait contract for `TagAgent` behavior.
pub trait TagAgent: Send + Sync {
    /// Whether the adapter has the external credential it needs.
    fn is_configured(&self) -> bool;

    /// Instructs the agent to consider `tag` for `repo_name` and returns the
    /// agent's free-text summary verbatim.
    async fn apply_tag(&self, repo_name: &str, tag: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
/// Public struct `LlmTagAgentConfig` used across Curator components.
pub struct LlmTagAgentConfig {
    pub hub_token: Option<String>,
    pub hub_api_base: Option<String>,
    pub inference_api_base: String,
    pub model: String,
    pub request_timeout_ms: u64,
}

struct LlmTagAgentInner {
    llm: Arc<OpenAiClient>,
    hub: Arc<HubClient>,
    model: String,
}

/// Production [`TagAgent`]: drives an LLM through the hub tag tools. Left
/// unconfigured (and reported as such) when the hub credential is absent, so
/// the service starts and answers `/health` either way.
pub struct LlmTagAgent {
    inner: Option<LlmTagAgentInner>,
}

impl LlmTagAgent {
    pub fn from_config(config: &LlmTagAgentConfig) -> Result<Self> {
        let token = config
            .hub_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let api_base = config
            .hub_api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty());

        let (Some(token), Some(api_base)) = (token, api_base) else {
            return Ok(Self { inner: None });
        };

        let llm = OpenAiClient::new(OpenAiConfig {
            api_base: config.inference_api_base.clone(),
            api_key: token.to_string(),
            request_timeout_ms: config.request_timeout_ms,
            max_retries: 2,
        })
        .context("failed to construct inference client")?;
        let hub = HubClient::new(api_base, token, config.request_timeout_ms)
            .context("failed to construct hub client")?;

        Ok(Self {
            inner: Some(LlmTagAgentInner {
                llm: Arc::new(llm),
                hub: Arc::new(hub),
                model: config.model.clone(),
            }),
        })
    }
}

fn tag_instruction(repo_name: &str, tag: &str) -> String {
    format!(
        "Repository '{repo_name}' may be missing the tag '{tag}'. Read the \
         repository's current tags; if '{tag}' is not already present and is \
         a valid tag for it, add it. Then summarise the outcome."
    )
}

#[async_trait]
impl TagAgent for LlmTagAgent {
    fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    async fn apply_tag(&self, repo_name: &str, tag: &str) -> Result<String> {
        let Some(inner) = self.inner.as_ref() else {
            bail!("hub token not configured; tagging agent unavailable");
        };

        let mut agent = Agent::new(
            inner.llm.clone(),
            AgentConfig {
                agent_id: "curator-tagger".to_string(),
                model: inner.model.clone(),
                system_prompt: TAG_AGENT_SYSTEM_PROMPT.to_string(),
                max_turns: TAG_AGENT_MAX_TURNS,
                ..AgentConfig::default()
            },
        );
        agent.register_tool(RepoTagsReadTool::new(inner.hub.clone()));
        agent.register_tool(RepoTagAddTool::new(inner.hub.clone()));

        let messages = agent
            .prompt(tag_instruction(repo_name, tag))
            .await
            .with_context(|| format!("tagging agent failed for tag '{tag}'"))?;

        final_assistant_text(&messages)
            .filter(|text| !text.trim().is_empty())
            .with_context(|| format!("tagging agent returned no reply for tag '{tag}'"))
    }
}
