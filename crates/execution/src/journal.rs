//! The queryable execution log store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use tawi_core::{ExecutionId, WorkflowId};

use crate::record::ExecutionRecord;
use crate::result::NodeExecutionResult;
use crate::status::ExecutionState;

/// The hard cap on rows returned by a query.
pub const MAX_QUERY_LIMIT: usize = 1_000;

/// Filters for querying execution records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalQuery {
    /// Only records of this workflow.
    pub workflow_id: Option<WorkflowId>,
    /// Only records in this state.
    pub state: Option<ExecutionState>,
    /// Only records started at or after this instant.
    pub started_at_from: Option<DateTime<Utc>>,
    /// Only records started at or before this instant.
    pub started_at_to: Option<DateTime<Utc>>,
    /// Row cap; clamped to [`MAX_QUERY_LIMIT`].
    pub limit: Option<usize>,
}

/// Append-only store of execution records.
///
/// Every write is total and idempotent on the execution id: logging a
/// start twice, or a node result against a missing record, never errors.
#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    /// Create a record in the `running` state. No-op if it exists.
    async fn log_start(&self, execution_id: ExecutionId, workflow_id: WorkflowId, version: u32);

    /// Append a node result to an invocation's record.
    async fn log_node(&self, execution_id: ExecutionId, result: NodeExecutionResult);

    /// Move a record to a terminal state. No-op once terminal.
    async fn log_end(&self, execution_id: ExecutionId, state: ExecutionState);

    /// Replace the stored record wholesale (used by the engine to attach
    /// final output and error alongside the terminal state).
    async fn store(&self, record: ExecutionRecord);

    /// Fetch one record.
    async fn get(&self, execution_id: ExecutionId) -> Option<ExecutionRecord>;

    /// Query records, newest first.
    async fn query(&self, query: JournalQuery) -> Vec<ExecutionRecord>;
}

/// In-memory journal.
///
/// A single `RwLock` over the map is enough here: writes are tiny
/// appends, and reads clone records out rather than holding the lock.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    records: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
}

impl InMemoryJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionJournal for InMemoryJournal {
    async fn log_start(&self, execution_id: ExecutionId, workflow_id: WorkflowId, version: u32) {
        self.records
            .write()
            .entry(execution_id)
            .or_insert_with(|| ExecutionRecord::started(execution_id, workflow_id, version));
    }

    async fn log_node(&self, execution_id: ExecutionId, result: NodeExecutionResult) {
        if let Some(record) = self.records.write().get_mut(&execution_id) {
            record.node_results.push(result);
        }
    }

    async fn log_end(&self, execution_id: ExecutionId, state: ExecutionState) {
        if let Some(record) = self.records.write().get_mut(&execution_id) {
            record.finish(state);
        }
    }

    async fn store(&self, record: ExecutionRecord) {
        self.records.write().insert(record.execution_id, record);
    }

    async fn get(&self, execution_id: ExecutionId) -> Option<ExecutionRecord> {
        self.records.read().get(&execution_id).cloned()
    }

    async fn query(&self, query: JournalQuery) -> Vec<ExecutionRecord> {
        let limit = query.limit.unwrap_or(MAX_QUERY_LIMIT).min(MAX_QUERY_LIMIT);

        let mut matches: Vec<ExecutionRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.workflow_id.is_none_or(|w| r.workflow_id == w))
            .filter(|r| query.state.is_none_or(|s| r.state == s))
            .filter(|r| query.started_at_from.is_none_or(|t| r.started_at >= t))
            .filter(|r| query.started_at_to.is_none_or(|t| r.started_at <= t))
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matches.truncate(limit);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;

    fn journal() -> InMemoryJournal {
        InMemoryJournal::new()
    }

    #[tokio::test]
    async fn start_get_end_cycle() {
        let j = journal();
        let execution_id = ExecutionId::v4();
        let workflow_id = WorkflowId::v4();

        j.log_start(execution_id, workflow_id, 3).await;
        let record = j.get(execution_id).await.unwrap();
        assert_eq!(record.state, ExecutionState::Running);
        assert_eq!(record.workflow_version, 3);

        j.log_end(execution_id, ExecutionState::Completed).await;
        let record = j.get(execution_id).await.unwrap();
        assert_eq!(record.state, ExecutionState::Completed);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn log_start_is_idempotent() {
        let j = journal();
        let execution_id = ExecutionId::v4();
        let workflow_id = WorkflowId::v4();

        j.log_start(execution_id, workflow_id, 1).await;
        j.log_node(
            execution_id,
            NodeExecutionResult::skipped("n", "disabled"),
        )
        .await;
        j.log_start(execution_id, workflow_id, 1).await;

        // The second start did not wipe the node result.
        let record = j.get(execution_id).await.unwrap();
        assert_eq!(record.node_results.len(), 1);
    }

    #[tokio::test]
    async fn log_node_against_missing_record_is_a_noop() {
        let j = journal();
        j.log_node(
            ExecutionId::v4(),
            NodeExecutionResult::error(
                "n",
                NodeError::permanent("x", "y"),
                5,
                0,
            ),
        )
        .await;
        // Nothing to assert beyond "did not panic"; the record was never created.
        assert!(j.get(ExecutionId::v4()).await.is_none());
    }

    #[tokio::test]
    async fn query_filters_and_sorts_newest_first() {
        let j = journal();
        let workflow_a = WorkflowId::v4();
        let workflow_b = WorkflowId::v4();

        let mut ids = Vec::new();
        for (workflow, state) in [
            (workflow_a, ExecutionState::Completed),
            (workflow_a, ExecutionState::Failed),
            (workflow_b, ExecutionState::Completed),
            (workflow_a, ExecutionState::Completed),
        ] {
            let execution_id = ExecutionId::v4();
            j.log_start(execution_id, workflow, 1).await;
            j.log_end(execution_id, state).await;
            ids.push(execution_id);
        }

        let results = j
            .query(JournalQuery {
                workflow_id: Some(workflow_a),
                state: Some(ExecutionState::Completed),
                limit: Some(10),
                ..JournalQuery::default()
            })
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.workflow_id == workflow_a));
        assert!(results.iter().all(|r| r.state == ExecutionState::Completed));
        // Newest first.
        assert!(results[0].started_at >= results[1].started_at);
    }

    #[tokio::test]
    async fn query_limit_is_capped() {
        let j = journal();
        let workflow = WorkflowId::v4();
        for _ in 0..5 {
            j.log_start(ExecutionId::v4(), workflow, 1).await;
        }

        let results = j
            .query(JournalQuery {
                limit: Some(2),
                ..JournalQuery::default()
            })
            .await;
        assert_eq!(results.len(), 2);

        let results = j
            .query(JournalQuery {
                limit: Some(10_000_000),
                ..JournalQuery::default()
            })
            .await;
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn query_time_range() {
        let j = journal();
        let workflow = WorkflowId::v4();
        let execution_id = ExecutionId::v4();
        j.log_start(execution_id, workflow, 1).await;

        let record = j.get(execution_id).await.unwrap();
        let before = record.started_at - chrono::Duration::seconds(1);
        let after = record.started_at + chrono::Duration::seconds(1);

        let hits = j
            .query(JournalQuery {
                started_at_from: Some(before),
                started_at_to: Some(after),
                ..JournalQuery::default()
            })
            .await;
        assert_eq!(hits.len(), 1);

        let misses = j
            .query(JournalQuery {
                started_at_from: Some(after),
                ..JournalQuery::default()
            })
            .await;
        assert!(misses.is_empty());
    }
}
