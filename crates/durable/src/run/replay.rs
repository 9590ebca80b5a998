//! Replay fold: rebuild a run's resumable position from its history
//!
//! Replay is a pure function of the checkpointed history. It never invokes
//! a handler, reads a clock, or draws randomness, so re-evaluating it
//! after a restart reproduces the exact same position.

use chrono::{DateTime, Utc};

use super::RunEvent;
use crate::approval::RaceWinner;
use crate::engine::STEP_SEQUENCE;
use crate::order::{OrderStep, ProcessingState};

/// Errors from folding a run history
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// History has no events at all
    #[error("run history is empty")]
    EmptyHistory,

    /// First event must be RunStarted
    #[error("first event must be run_started")]
    MissingStart,

    /// A checkpoint disagrees with the canonical step order; the history
    /// was produced by a different sequence (non-determinism)
    #[error("checkpoint out of order: expected {expected:?}, got {got}")]
    StepOutOfOrder {
        expected: Option<OrderStep>,
        got: OrderStep,
    },

    /// Events continue past a terminal event
    #[error("event appended after terminal event")]
    EventAfterTerminal,
}

/// Terminal outcome recorded in a history
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Run completed with the rendered report
    Completed(String),

    /// Run aborted with a handler error
    Failed(String),
}

/// A run's position as reconstructed from its history
#[derive(Debug)]
pub struct ReplayedRun {
    /// State after the last checkpointed step, if any step completed
    pub state: Option<ProcessingState>,

    /// How many steps of the canonical sequence are checkpointed
    pub steps_completed: usize,

    /// Recorded approval deadline, when the race started but has not
    /// resolved; cleared once the approval step's checkpoint lands
    pub approval_due: Option<DateTime<Utc>>,

    /// Recorded race resolution, when the run crashed after the winning
    /// event was appended but before the approval step's checkpoint; a
    /// resumed run consumes this fact instead of re-running the race
    pub approval_resolution: Option<RaceWinner>,

    /// Terminal outcome, if the run already finished
    pub outcome: Option<RunOutcome>,
}

/// Fold a history into a resumable position
pub fn replay(events: &[(i32, RunEvent)]) -> Result<ReplayedRun, ReplayError> {
    let Some(((_, first), rest)) = events.split_first() else {
        return Err(ReplayError::EmptyHistory);
    };
    if !matches!(first, RunEvent::RunStarted { .. }) {
        return Err(ReplayError::MissingStart);
    }

    let mut replayed = ReplayedRun {
        state: None,
        steps_completed: 0,
        approval_due: None,
        approval_resolution: None,
        outcome: None,
    };

    for (_, event) in rest {
        if replayed.outcome.is_some() {
            return Err(ReplayError::EventAfterTerminal);
        }

        match event {
            RunEvent::StepCompleted { step, state } => {
                let expected = STEP_SEQUENCE.get(replayed.steps_completed).copied();
                if expected != Some(*step) {
                    return Err(ReplayError::StepOutOfOrder {
                        expected,
                        got: *step,
                    });
                }
                replayed.state = Some(state.clone());
                replayed.steps_completed += 1;
                if *step == OrderStep::Approval {
                    // The checkpoint carries the race's outcome; the
                    // deadline and resolution are spent
                    replayed.approval_due = None;
                    replayed.approval_resolution = None;
                }
            }

            RunEvent::ApprovalWaitStarted { due_at } => {
                replayed.approval_due = Some(*due_at);
            }

            RunEvent::SignalReceived { signal } => {
                replayed.approval_resolution = Some(RaceWinner::Signal {
                    approved: signal.approved,
                });
            }

            RunEvent::TimerFired => {
                replayed.approval_resolution = Some(RaceWinner::Timeout);
            }

            RunEvent::RunCompleted { report } => {
                replayed.outcome = Some(RunOutcome::Completed(report.clone()));
            }

            RunEvent::RunFailed { error } => {
                replayed.outcome = Some(RunOutcome::Failed(error.clone()));
            }

            RunEvent::RunStarted { .. } | RunEvent::TimerCancelled => {}
        }
    }

    Ok(replayed)
}
