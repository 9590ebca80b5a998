//! In-memory implementation of RunEventStore

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::approval::ApprovalStatus;
use crate::order::OrderStep;
use crate::run::{RunEvent, RunSignal};

/// Internal run state
struct RunState {
    status: RunStatus,
    input: serde_json::Value,
    current_step: Option<OrderStep>,
    approval_status: Option<ApprovalStatus>,
    result: Option<String>,
    error: Option<String>,
    events: Vec<RunEvent>,
    signals: Vec<RunSignal>,
}

/// In-memory implementation of RunEventStore
///
/// Keeps every run's history in process memory with the same semantics a
/// durable implementation would provide (optimistic sequence checks,
/// pending signal stash). Runs do not survive a process exit with this
/// store; it backs tests and single-node deployments.
///
/// # Example
///
/// ```
/// use orderflow_durable::InMemoryRunEventStore;
///
/// let store = InMemoryRunEventStore::new();
/// ```
pub struct InMemoryRunEventStore {
    runs: RwLock<HashMap<Uuid, RunState>>,
}

impl InMemoryRunEventStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of runs
    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.runs.write().clear();
    }
}

impl Default for InMemoryRunEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunEventStore for InMemoryRunEventStore {
    async fn create_run(&self, run_id: Uuid, input: serde_json::Value) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        runs.insert(
            run_id,
            RunState {
                status: RunStatus::Pending,
                input,
                current_step: None,
                approval_status: None,
                result: None,
                error: None,
                events: vec![],
                signals: vec![],
            },
        );
        Ok(())
    }

    async fn get_run_status(&self, run_id: Uuid) -> Result<RunStatus, StoreError> {
        let runs = self.runs.read();
        runs.get(&run_id)
            .map(|r| r.status)
            .ok_or(StoreError::RunNotFound(run_id))
    }

    async fn get_run_info(&self, run_id: Uuid) -> Result<RunInfo, StoreError> {
        let runs = self.runs.read();
        let run = runs.get(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        Ok(RunInfo {
            id: run_id,
            status: run.status,
            input: run.input.clone(),
            current_step: run.current_step,
            approval_status: run.approval_status.clone(),
            result: run.result.clone(),
            error: run.error.clone(),
        })
    }

    async fn append_events(
        &self,
        run_id: Uuid,
        expected_sequence: i32,
        events: Vec<RunEvent>,
    ) -> Result<i32, StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        let current_sequence = run.events.len() as i32;
        if current_sequence != expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_sequence,
                actual: current_sequence,
            });
        }

        run.events.extend(events);
        Ok(run.events.len() as i32)
    }

    async fn load_events(&self, run_id: Uuid) -> Result<Vec<(i32, RunEvent)>, StoreError> {
        let runs = self.runs.read();
        let run = runs.get(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        Ok(run
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| (i as i32, e.clone()))
            .collect())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        run.status = status;
        if result.is_some() {
            run.result = result;
        }
        if error.is_some() {
            run.error = error;
        }
        Ok(())
    }

    async fn set_current_step(&self, run_id: Uuid, step: OrderStep) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        run.current_step = Some(step);
        Ok(())
    }

    async fn set_approval_status(
        &self,
        run_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        run.approval_status = status;
        Ok(())
    }

    async fn send_signal(&self, run_id: Uuid, signal: RunSignal) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        run.signals.push(signal);
        Ok(())
    }

    async fn take_pending_signals(&self, run_id: Uuid) -> Result<Vec<RunSignal>, StoreError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;

        Ok(std::mem::take(&mut run.signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get_run() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store
            .create_run(run_id, json!({"productName": "Widget"}))
            .await
            .unwrap();

        let status = store.get_run_status(run_id).await.unwrap();
        assert_eq!(status, RunStatus::Pending);
        assert_eq!(store.run_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let store = InMemoryRunEventStore::new();
        let result = store.get_run_status(Uuid::now_v7()).await;

        assert!(matches!(result, Err(StoreError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_append_and_load_events() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store.create_run(run_id, json!({})).await.unwrap();

        let seq = store
            .append_events(run_id, 0, vec![RunEvent::RunStarted { input: json!({}) }])
            .await
            .unwrap();
        assert_eq!(seq, 1);

        let seq = store
            .append_events(run_id, 1, vec![RunEvent::TimerFired])
            .await
            .unwrap();
        assert_eq!(seq, 2);

        let events = store.load_events(run_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 0);
        assert_eq!(events[1].0, 1);
    }

    #[tokio::test]
    async fn test_concurrency_conflict() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store.create_run(run_id, json!({})).await.unwrap();

        let result = store
            .append_events(
                run_id,
                5, // Wrong sequence
                vec![RunEvent::RunStarted { input: json!({}) }],
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_and_result_update() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store.create_run(run_id, json!({})).await.unwrap();
        store
            .update_run_status(run_id, RunStatus::Completed, Some("report".to_string()), None)
            .await
            .unwrap();

        let info = store.get_run_info(run_id).await.unwrap();
        assert_eq!(info.status, RunStatus::Completed);
        assert_eq!(info.result.as_deref(), Some("report"));
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn test_approval_status_publish_and_clear() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store.create_run(run_id, json!({})).await.unwrap();

        let status = ApprovalStatus::for_run(run_id, "http://localhost:3000");
        store
            .set_approval_status(run_id, Some(status.clone()))
            .await
            .unwrap();
        let info = store.get_run_info(run_id).await.unwrap();
        assert_eq!(info.approval_status, Some(status));

        store.set_approval_status(run_id, None).await.unwrap();
        let info = store.get_run_info(run_id).await.unwrap();
        assert!(info.approval_status.is_none());
    }

    #[tokio::test]
    async fn test_signal_stash_is_drained_once() {
        let store = InMemoryRunEventStore::new();
        let run_id = Uuid::now_v7();

        store.create_run(run_id, json!({})).await.unwrap();
        store
            .send_signal(run_id, RunSignal::approval(true))
            .await
            .unwrap();

        let signals = store.take_pending_signals(run_id).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert!(signals[0].approved);

        let signals = store.take_pending_signals(run_id).await.unwrap();
        assert!(signals.is_empty());
    }
}
