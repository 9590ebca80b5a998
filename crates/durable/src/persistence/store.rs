//! RunEventStore trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::ApprovalStatus;
use crate::order::OrderStep;
use crate::run::{RunEvent, RunSignal};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Run not found
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// Concurrency conflict (optimistic sequence check failed)
    #[error("concurrency conflict: expected sequence {expected}, got {actual}")]
    ConcurrencyConflict { expected: i32, actual: i32 },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run created but the driver has not picked it up yet
    Pending,

    /// Run is advancing through the step sequence
    Running,

    /// Run completed and rendered its report
    Completed,

    /// Run aborted on a handler failure
    Failed,
}

impl RunStatus {
    /// Check if the run can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Run information stored alongside the event history
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub id: Uuid,
    pub status: RunStatus,

    /// The raw input document the run was started with
    pub input: serde_json::Value,

    /// Step currently executing, for observability
    pub current_step: Option<OrderStep>,

    /// Published while the approval race is waiting, cleared afterwards
    pub approval_status: Option<ApprovalStatus>,

    /// Final report once completed
    pub result: Option<String>,

    /// Handler error once failed
    pub error: Option<String>,
}

/// Store for run histories and signals
///
/// Implementations must be thread-safe; the engine and external
/// signal deliveries touch the store concurrently.
#[async_trait]
pub trait RunEventStore: Send + Sync + 'static {
    /// Create a new run instance
    async fn create_run(&self, run_id: Uuid, input: serde_json::Value) -> Result<(), StoreError>;

    /// Get run status
    async fn get_run_status(&self, run_id: Uuid) -> Result<RunStatus, StoreError>;

    /// Get full run info
    async fn get_run_info(&self, run_id: Uuid) -> Result<RunInfo, StoreError>;

    /// Append events to a run (with optimistic concurrency)
    ///
    /// Returns the new sequence number after appending.
    async fn append_events(
        &self,
        run_id: Uuid,
        expected_sequence: i32,
        events: Vec<RunEvent>,
    ) -> Result<i32, StoreError>;

    /// Load the full history of a run (for replay)
    async fn load_events(&self, run_id: Uuid) -> Result<Vec<(i32, RunEvent)>, StoreError>;

    /// Update run status and, on termination, its result or error
    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Record the step currently executing
    async fn set_current_step(&self, run_id: Uuid, step: OrderStep) -> Result<(), StoreError>;

    /// Publish or clear the externally observable approval status
    async fn set_approval_status(
        &self,
        run_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> Result<(), StoreError>;

    /// Stash a signal for a run that is not currently waiting on one
    async fn send_signal(&self, run_id: Uuid, signal: RunSignal) -> Result<(), StoreError>;

    /// Take (and remove) all pending signals for a run
    async fn take_pending_signals(&self, run_id: Uuid) -> Result<Vec<RunSignal>, StoreError>;
}
