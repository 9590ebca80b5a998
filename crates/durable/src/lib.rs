//! # Durable Order Orchestration Engine
//!
//! An event-sourced step sequencer for a single order-processing pipeline.
//!
//! ## Features
//!
//! - **Checkpointed steps**: every step result is persisted as an event
//!   before the next step runs, enabling replay and recovery
//! - **Restart-safe resume**: a resumed run re-derives its position from
//!   the history and never re-invokes a checkpointed step
//! - **Approval race**: the approval step races a timer against an
//!   external boolean signal; only the first resolution counts, and the
//!   decided outcome is itself checkpointed
//! - **No dedicated thread per wait**: the approval window (human-scale)
//!   suspends the run cooperatively instead of blocking a thread
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    OrchestrationEngine                       │
//! │  (drives the fixed step sequence, replays checkpoints)      │
//! └─────────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌───────────────────────────┐  ┌─────────────────────────────┐
//! │       RunEventStore       │  │  Activity handlers / race   │
//! │  (append-only run events) │  │  (side effects live here)   │
//! └───────────────────────────┘  └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use orderflow_durable::prelude::*;
//!
//! let store = Arc::new(InMemoryRunEventStore::new());
//! let engine = Arc::new(OrchestrationEngine::new(store));
//!
//! let run_id = engine.start(input).await?;
//! tokio::spawn({
//!     let engine = engine.clone();
//!     async move { engine.drive(run_id).await }
//! });
//!
//! // Later, from the outside:
//! engine.raise_event(run_id, APPROVAL_EVENT, true).await?;
//! ```

pub mod activity;
pub mod approval;
pub mod engine;
pub mod order;
pub mod persistence;
pub mod run;

/// Prelude for common imports
pub mod prelude {
    pub use crate::activity::ActivityError;
    pub use crate::approval::{ApprovalOutcome, ApprovalRace, ApprovalStatus, RaceWinner};
    pub use crate::engine::{EngineConfig, EngineError, OrchestrationEngine, STEP_SEQUENCE};
    pub use crate::order::{InputOrder, Money, OrderStep, ProcessingState, REJECTION_REPORT};
    pub use crate::persistence::{
        InMemoryRunEventStore, RunEventStore, RunInfo, RunStatus, StoreError,
    };
    pub use crate::run::{RunEvent, RunSignal, APPROVAL_EVENT};
}

// Re-export key types at crate root
pub use activity::ActivityError;
pub use approval::{ApprovalOutcome, ApprovalRace, ApprovalStatus, RaceWinner};
pub use engine::{EngineConfig, EngineError, OrchestrationEngine, STEP_SEQUENCE};
pub use order::{InputOrder, Money, OrderStep, ProcessingState, REJECTION_REPORT};
pub use persistence::{InMemoryRunEventStore, RunEventStore, RunInfo, RunStatus, StoreError};
pub use run::{RunEvent, RunSignal, APPROVAL_EVENT};
