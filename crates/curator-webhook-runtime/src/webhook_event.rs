//! Inbound webhook payload model, parsing, and accept/ignore classification.

use serde::Deserialize;

/// Action value of events the runtime processes.
pub const ACCEPTED_ACTION: &str = "create";
/// Scope value of events the runtime processes.
pub const ACCEPTED_SCOPE: &str = "discussion.comment";

#[derive(Debug, Clone, Deserialize)]
/// Public struct `InboundEvent` used across Curator components.
pub struct InboundEvent {
    pub event: EventHeader,
    #[serde(default)]
    pub comment: Option<CommentSection>,
    #[serde(default)]
    pub discussion: Option<DiscussionSection>,
    #[serde(default)]
    pub repo: Option<RepoSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventHeader {
    pub action: String,
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentSection {
    pub content: String,
    pub author: AuthorSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorSection {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionSection {
    pub title: String,
    pub num: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSection {
    pub name: String,
}

/// Parses the raw request body into an [`InboundEvent`].
pub fn parse_inbound_event(body: &[u8]) -> Result<InboundEvent, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `EventDisposition` values.
pub enum EventDisposition {
    Accepted,
    Ignored { reason: String },
}

/// Accepts exactly `create` on `discussion.comment`; every other pair is
/// ignored (a valid event of no interest, not an error).
pub fn classify_event(event: &InboundEvent) -> EventDisposition {
    if event.event.action == ACCEPTED_ACTION && event.event.scope == ACCEPTED_SCOPE {
        return EventDisposition::Accepted;
    }
    EventDisposition::Ignored {
        reason: format!(
            "event {}/{} is not a new discussion comment",
            event.event.action, event.event.scope
        ),
    }
}

#[derive(Debug, Clone)]
/// The flattened, fully-populated view of an accepted event, moved by value
/// into the background work item.
pub struct AcceptedEvent {
    pub repo_name: String,
    pub discussion_num: u64,
    pub discussion_title: String,
    pub author_id: String,
    pub comment_content: String,
}

impl AcceptedEvent {
    /// Flattens an accepted payload, rejecting ones whose comment, discussion,
    /// or repo sections are absent.
    pub fn from_inbound(event: InboundEvent) -> Result<Self, String> {
        let Some(comment) = event.comment else {
            return Err("accepted event is missing the comment section".to_string());
        };
        let Some(discussion) = event.discussion else {
            return Err("accepted event is missing the discussion section".to_string());
        };
        let Some(repo) = event.repo else {
            return Err("accepted event is missing the repo section".to_string());
        };

        Ok(Self {
            repo_name: repo.name,
            discussion_num: discussion.num,
            discussion_title: discussion.title,
            author_id: comment.author.id,
            comment_content: comment.content,
        })
    }
}
