//! The orchestration engine
//!
//! Owns the canonical step order and drives one run at a time through it,
//! checkpointing every step result before moving on.

mod executor;

pub use executor::{EngineConfig, EngineError, OrchestrationEngine};

use crate::order::OrderStep;

/// The canonical, ordered step sequence
///
/// Part of the engine's contract: steps execute top to bottom, never
/// skipped, reordered, or parallelized; each depends on state produced by
/// its predecessor.
pub const STEP_SEQUENCE: [OrderStep; 5] = [
    OrderStep::OrderRequest,
    OrderStep::Payment,
    OrderStep::Approval,
    OrderStep::ProcessOrder,
    OrderStep::SendOrder,
];
