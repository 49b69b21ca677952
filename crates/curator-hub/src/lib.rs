//! Hub infrastructure adapter: the tag-collection HTTP client and the two
//! idempotency-preserving agent tools (`repo_tags_read`, `repo_tag_add`)
//! exposed to Curator's tagging agent.
mod hub_client;
mod tag_tools;

pub use hub_client::{HubClient, HubError};
pub use tag_tools::{RepoTagAddTool, RepoTagsReadTool};
