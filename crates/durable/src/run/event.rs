//! Checkpoint events for persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RunSignal;
use crate::order::{OrderStep, ProcessingState};

/// Events forming the append-only history of one run
///
/// Events are immutable once written. A run's position is reconstructed by
/// folding the history in sequence order; a step whose result appears here
/// is never re-dispatched on resume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run was started with the given input document
    RunStarted {
        /// The raw input provided when starting the run
        input: serde_json::Value,
    },

    /// A step produced its result; this is the per-step checkpoint
    StepCompleted {
        /// Which step ran
        step: OrderStep,

        /// The full state after the step, as returned by its handler
        state: ProcessingState,
    },

    /// The approval race started; the deadline is recorded so a resumed
    /// run keeps the original window instead of restarting it
    ApprovalWaitStarted {
        /// When the timeout wait resolves
        due_at: DateTime<Utc>,
    },

    /// An external signal reached the approval race
    SignalReceived {
        /// The signal that was received
        signal: RunSignal,
    },

    /// The approval timeout elapsed before any signal
    TimerFired,

    /// The approval timer was cancelled because the signal won the race
    TimerCancelled,

    /// Run completed normally with the rendered report
    RunCompleted {
        /// The final report string
        report: String,
    },

    /// Run aborted because a step handler failed
    RunFailed {
        /// Error message from the failing handler
        error: String,
    },
}

impl RunEvent {
    /// Get the step if this is a step checkpoint
    pub fn step(&self) -> Option<OrderStep> {
        match self {
            Self::StepCompleted { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Check if this is a terminal run event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }
}
