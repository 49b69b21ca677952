//! Background processing of accepted events: the
//! `processing -> {no_tags | error | completed}` state machine.

use std::sync::Arc;

use curator_core::current_unix_timestamp_ms;
use tracing::{info, warn};

use crate::{
    operation_ledger::{OperationLedger, OperationStatus, TagToolCallResult},
    tag_agent::TagAgent,
    tag_extraction::extract_candidate_tags,
    webhook_event::AcceptedEvent,
};

/// One unit of detached work: the record it owns plus the event by value.
pub struct WorkItem {
    pub operation_id: u64,
    pub event: AcceptedEvent,
}

#[derive(Clone)]
/// Everything a worker needs; cloned into each worker task.
pub struct ProcessingContext {
    pub ledger: OperationLedger,
    pub agent: Arc<dyn TagAgent>,
}

/// Drives one accepted event from `processing` to a terminal status. The
/// record was appended by the accepting request; from here on only this
/// worker mutates it.
pub async fn process_work_item(context: &ProcessingContext, item: WorkItem) {
    let WorkItem {
        operation_id,
        event,
    } = item;

    let tags = extract_candidate_tags(&event.comment_content, &event.discussion_title);
    context
        .ledger
        .set_extracted_tags(operation_id, tags.clone());

    if tags.is_empty() {
        context
            .ledger
            .set_status(operation_id, OperationStatus::NoTags);
        info!(
            operation_id,
            repo = %event.repo_name,
            "no candidate tags extracted"
        );
        return;
    }

    if !context.agent.is_configured() {
        context.ledger.fail(
            operation_id,
            "hub token not configured; tagging agent unavailable",
        );
        warn!(
            operation_id,
            repo = %event.repo_name,
            "tagging agent unconfigured; operation recorded as error"
        );
        return;
    }

    for tag in &tags {
        // A per-tag failure is isolated to this tag's result; the remaining
        // tags are still attempted.
        match context.agent.apply_tag(&event.repo_name, tag).await {
            Ok(response) => {
                context.ledger.record_tag_result(
                    operation_id,
                    TagToolCallResult {
                        tag: tag.clone(),
                        response: Some(response),
                        error: None,
                        completed_unix_ms: current_unix_timestamp_ms(),
                    },
                );
            }
            Err(error) => {
                warn!(operation_id, tag = %tag, "tag application failed: {error:#}");
                context.ledger.record_tag_result(
                    operation_id,
                    TagToolCallResult {
                        tag: tag.clone(),
                        response: None,
                        error: Some(format!("{error:#}")),
                        completed_unix_ms: current_unix_timestamp_ms(),
                    },
                );
            }
        }
    }

    // Completed means "every tag was attempted", not "every tag succeeded";
    // callers inspect the per-tag results for the actual outcome.
    context
        .ledger
        .set_status(operation_id, OperationStatus::Completed);
    info!(
        operation_id,
        repo = %event.repo_name,
        tags = tags.len(),
        "operation completed"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::*;

    /// Scripted [`TagAgent`] double: records every call and fails the tags it
    /// is told to fail.
    pub(crate) struct ScriptedTagAgent {
        pub(crate) configured: bool,
        pub(crate) failing_tags: Vec<String>,
        pub(crate) calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTagAgent {
        pub(crate) fn configured() -> Self {
            Self {
                configured: true,
                failing_tags: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn unconfigured() -> Self {
            Self {
                configured: false,
                failing_tags: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TagAgent for ScriptedTagAgent {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn apply_tag(&self, repo_name: &str, tag: &str) -> Result<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((repo_name.to_string(), tag.to_string()));
            if self.failing_tags.iter().any(|failing| failing == tag) {
                bail!("simulated tool failure for '{tag}'");
            }
            Ok(format!("added '{tag}' to '{repo_name}'"))
        }
    }

    fn accepted_event(comment: &str, title: &str) -> AcceptedEvent {
        AcceptedEvent {
            repo_name: "acme/widget".to_string(),
            discussion_num: 12,
            discussion_title: title.to_string(),
            author_id: "user-7".to_string(),
            comment_content: comment.to_string(),
        }
    }

    fn context_with(agent: ScriptedTagAgent) -> ProcessingContext {
        ProcessingContext {
            ledger: OperationLedger::new(16),
            agent: Arc::new(agent),
        }
    }

    #[tokio::test]
    async fn empty_extraction_terminates_as_no_tags_without_agent_calls() {
        let context = context_with(ScriptedTagAgent::configured());
        let id = context.ledger.append("acme/widget", 12, "user-7", "looks good");
        process_work_item(
            &context,
            WorkItem {
                operation_id: id,
                event: accepted_event("looks good", "thanks"),
            },
        )
        .await;

        let record = context.ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::NoTags);
        assert!(record.extracted_tags.is_empty());
        assert!(record.tag_results.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_agent_terminates_as_error_with_no_tag_results() {
        let context = context_with(ScriptedTagAgent::unconfigured());
        let id = context.ledger.append("acme/widget", 12, "user-7", "p");
        process_work_item(
            &context,
            WorkItem {
                operation_id: id,
                event: accepted_event("needs tags: pytorch", "Missing tags"),
            },
        )
        .await;

        let record = context.ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::Error);
        assert!(record.error.as_deref().unwrap_or_default().contains("not configured"));
        assert!(record.tag_results.is_empty());
        assert_eq!(record.extracted_tags, vec!["pytorch"]);
    }

    #[tokio::test]
    async fn regression_first_tag_failure_does_not_abort_remaining_tags() {
        let agent = Arc::new(ScriptedTagAgent {
            failing_tags: vec!["pytorch".to_string()],
            ..ScriptedTagAgent::configured()
        });
        let context = ProcessingContext {
            ledger: OperationLedger::new(16),
            agent: agent.clone(),
        };
        let id = context.ledger.append("acme/widget", 12, "user-7", "p");
        process_work_item(
            &context,
            WorkItem {
                operation_id: id,
                event: accepted_event("needs tags: pytorch, transformers", "Missing tags"),
            },
        )
        .await;

        let record = context.ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.extracted_tags, vec!["pytorch", "transformers"]);
        assert_eq!(record.tag_results.len(), 2);
        assert!(record.tag_results[0].error.as_deref().unwrap_or_default().contains("simulated"));
        assert!(record.tag_results[1].response.is_some());

        let calls = agent.calls.lock().expect("calls lock");
        assert_eq!(
            *calls,
            vec![
                ("acme/widget".to_string(), "pytorch".to_string()),
                ("acme/widget".to_string(), "transformers".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn successful_run_records_one_result_per_tag_in_order() {
        let context = context_with(ScriptedTagAgent::configured());
        let id = context.ledger.append("acme/widget", 12, "user-7", "p");
        process_work_item(
            &context,
            WorkItem {
                operation_id: id,
                event: accepted_event("pytorch and vision work", "demo"),
            },
        )
        .await;

        let record = context.ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.extracted_tags, vec!["pytorch", "vision"]);
        let tags: Vec<&str> = record
            .tag_results
            .iter()
            .map(|result| result.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["pytorch", "vision"]);
    }
}
