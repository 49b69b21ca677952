//! Append-only, size-bounded audit ledger of webhook processing attempts.
//!
//! Writers (the worker that owns a record) append and mutate through the
//! handle; readers get cloned snapshots of the most recent window and never
//! block writers for longer than the clone.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use curator_core::current_unix_timestamp_ms;
use serde::{Deserialize, Serialize};

pub const OPERATION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `OperationStatus` values.
pub enum OperationStatus {
    Processing,
    NoTags,
    Error,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Per-tag outcome of one agent invocation; child of exactly one record.
pub struct TagToolCallResult {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_unix_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `OperationRecord` used across Curator components.
pub struct OperationRecord {
    pub schema_version: u32,
    pub operation_id: u64,
    pub created_unix_ms: u64,
    pub repo_name: String,
    pub discussion_num: u64,
    pub author_id: String,
    pub extracted_tags: Vec<String>,
    pub comment_preview: String,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tag_results: Vec<TagToolCallResult>,
}

struct LedgerInner {
    records: VecDeque<OperationRecord>,
    capacity: usize,
    next_operation_id: u64,
    total_appended: u64,
}

#[derive(Clone)]
/// Cheaply-cloneable handle to the shared ledger. Constructed once at service
/// startup and handed to every worker and every read endpoint; tests build
/// their own instances.
pub struct OperationLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl OperationLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerInner {
                records: VecDeque::new(),
                capacity: capacity.max(1),
                next_operation_id: 1,
                total_appended: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a fresh `processing` record and returns its operation id. The
    /// oldest record is evicted once the capacity is reached.
    pub fn append(
        &self,
        repo_name: impl Into<String>,
        discussion_num: u64,
        author_id: impl Into<String>,
        comment_preview: impl Into<String>,
    ) -> u64 {
        let mut inner = self.lock();
        let operation_id = inner.next_operation_id;
        inner.next_operation_id += 1;
        inner.total_appended += 1;

        let record = OperationRecord {
            schema_version: OPERATION_SCHEMA_VERSION,
            operation_id,
            created_unix_ms: current_unix_timestamp_ms(),
            repo_name: repo_name.into(),
            discussion_num,
            author_id: author_id.into(),
            extracted_tags: Vec::new(),
            comment_preview: comment_preview.into(),
            status: OperationStatus::Processing,
            error: None,
            tag_results: Vec::new(),
        };

        if inner.records.len() == inner.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(record);
        operation_id
    }

    pub fn set_extracted_tags(&self, operation_id: u64, tags: Vec<String>) {
        self.with_record(operation_id, |record| record.extracted_tags = tags);
    }

    pub fn record_tag_result(&self, operation_id: u64, result: TagToolCallResult) {
        self.with_record(operation_id, |record| record.tag_results.push(result));
    }

    pub fn set_status(&self, operation_id: u64, status: OperationStatus) {
        self.with_record(operation_id, |record| record.status = status);
    }

    /// Closes a record as `error` with a message.
    pub fn fail(&self, operation_id: u64, message: impl Into<String>) {
        self.with_record(operation_id, |record| {
            record.status = OperationStatus::Error;
            record.error = Some(message.into());
        });
    }

    /// Most recent records, newest first, bounded to `limit`.
    pub fn snapshot(&self, limit: usize) -> Vec<OperationRecord> {
        let inner = self.lock();
        inner
            .records
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, operation_id: u64) -> Option<OperationRecord> {
        let inner = self.lock();
        inner
            .records
            .iter()
            .find(|record| record.operation_id == operation_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Total records ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.lock().total_appended
    }

    fn with_record(&self, operation_id: u64, mutate: impl FnOnce(&mut OperationRecord)) {
        let mut inner = self.lock();
        // A record evicted under churn is silently gone; the mutation is a
        // no-op rather than an error.
        if let Some(record) = inner
            .records
            .iter_mut()
            .find(|record| record.operation_id == operation_id)
        {
            mutate(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_monotonic_ids_and_snapshot_is_newest_first() {
        let ledger = OperationLedger::new(16);
        let first = ledger.append("acme/widget", 1, "user-1", "first");
        let second = ledger.append("acme/widget", 2, "user-2", "second");
        assert!(second > first);

        let snapshot = ledger.snapshot(10);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].operation_id, second);
        assert_eq!(snapshot[0].status, OperationStatus::Processing);
        assert_eq!(snapshot[0].schema_version, OPERATION_SCHEMA_VERSION);
    }

    #[test]
    fn capacity_evicts_oldest_records() {
        let ledger = OperationLedger::new(2);
        let first = ledger.append("acme/widget", 1, "user-1", "a");
        ledger.append("acme/widget", 2, "user-1", "b");
        ledger.append("acme/widget", 3, "user-1", "c");

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.total_appended(), 3);
        assert!(ledger.get(first).is_none());
        // Mutating an evicted record is a silent no-op.
        ledger.fail(first, "late failure");
    }

    #[test]
    fn fail_sets_terminal_error_with_message() {
        let ledger = OperationLedger::new(4);
        let id = ledger.append("acme/widget", 1, "user-1", "preview");
        ledger.fail(id, "hub token not configured");

        let record = ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::Error);
        assert_eq!(record.error.as_deref(), Some("hub token not configured"));
        assert!(record.tag_results.is_empty());
    }

    #[test]
    fn tag_results_accumulate_in_order() {
        let ledger = OperationLedger::new(4);
        let id = ledger.append("acme/widget", 1, "user-1", "preview");
        ledger.set_extracted_tags(id, vec!["pytorch".to_string(), "vision".to_string()]);
        ledger.record_tag_result(
            id,
            TagToolCallResult {
                tag: "pytorch".to_string(),
                response: Some("added".to_string()),
                error: None,
                completed_unix_ms: 1,
            },
        );
        ledger.record_tag_result(
            id,
            TagToolCallResult {
                tag: "vision".to_string(),
                response: None,
                error: Some("hub unavailable".to_string()),
                completed_unix_ms: 2,
            },
        );
        ledger.set_status(id, OperationStatus::Completed);

        let record = ledger.get(id).expect("record");
        assert_eq!(record.status, OperationStatus::Completed);
        assert_eq!(record.tag_results.len(), 2);
        assert_eq!(record.tag_results[0].tag, "pytorch");
        assert_eq!(record.tag_results[1].error.as_deref(), Some("hub unavailable"));
    }

    #[test]
    fn status_serialises_snake_case() {
        let rendered = serde_json::to_string(&OperationStatus::NoTags).expect("serialize");
        assert_eq!(rendered, "\"no_tags\"");
    }

    #[test]
    fn concurrent_writers_and_readers_never_observe_partial_records() {
        let ledger = OperationLedger::new(128);
        let mut writers = Vec::new();
        for writer in 0..10u64 {
            let ledger = ledger.clone();
            writers.push(std::thread::spawn(move || {
                for n in 0..50u64 {
                    let id = ledger.append("acme/widget", n, format!("user-{writer}"), "p");
                    ledger.set_extracted_tags(id, vec!["pytorch".to_string()]);
                    ledger.set_status(id, OperationStatus::Completed);
                }
            }));
        }

        for _ in 0..200 {
            for record in ledger.snapshot(64) {
                assert_eq!(record.schema_version, OPERATION_SCHEMA_VERSION);
                assert!(matches!(
                    record.status,
                    OperationStatus::Processing | OperationStatus::Completed
                ));
            }
        }

        for writer in writers {
            writer.join().expect("writer thread");
        }
        assert_eq!(ledger.total_appended(), 500);
        assert_eq!(ledger.len(), 128);
    }
}
