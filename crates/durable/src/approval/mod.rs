//! The approval step: a race between a timeout and an external signal
//!
//! The race itself is a small synchronous state machine; the engine owns
//! the actual waiting (timer future vs. signal channel) and feeds the
//! first resolution in here. Whatever loses the race is ignored: a late
//! signal cannot flip an already-expired outcome, and a lingering timer
//! cannot undo an approval.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default approval window
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Which side of the race resolved first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceWinner {
    /// The external signal arrived first, carrying its boolean value
    Signal { approved: bool },

    /// The timeout elapsed first
    Timeout,
}

/// Terminal outcome of the approval step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Signal won with value true
    Approved,

    /// Timeout won, or the signal delivered false
    Expired,
}

impl ApprovalOutcome {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RaceState {
    Waiting,
    Resolved(ApprovalOutcome),
}

/// State machine for the approval race
///
/// Starts in Waiting. The first call to [`resolve`](Self::resolve) decides
/// the outcome; every later call is ignored and returns None, which is how
/// a signal delivered after the timeout gets dropped.
#[derive(Debug)]
pub struct ApprovalRace {
    state: RaceState,
}

impl ApprovalRace {
    /// Create a race in the Waiting state
    pub fn new() -> Self {
        Self {
            state: RaceState::Waiting,
        }
    }

    /// Feed the first race resolution
    ///
    /// Returns the decided outcome on the first call and None afterwards.
    pub fn resolve(&mut self, winner: RaceWinner) -> Option<ApprovalOutcome> {
        match self.state {
            RaceState::Waiting => {
                let outcome = match winner {
                    RaceWinner::Signal { approved: true } => ApprovalOutcome::Approved,
                    RaceWinner::Signal { approved: false } | RaceWinner::Timeout => {
                        ApprovalOutcome::Expired
                    }
                };
                self.state = RaceState::Resolved(outcome);
                Some(outcome)
            }
            RaceState::Resolved(_) => None,
        }
    }

    /// The decided outcome, if the race has concluded
    pub fn outcome(&self) -> Option<ApprovalOutcome> {
        match self.state {
            RaceState::Waiting => None,
            RaceState::Resolved(outcome) => Some(outcome),
        }
    }
}

impl Default for ApprovalRace {
    fn default() -> Self {
        Self::new()
    }
}

/// Status object published while a run waits for approval
///
/// This is the only externally readable state a run exposes while in
/// flight. Observers may use the instruction to cause a new signal; they
/// can never mutate engine-owned state directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatus {
    /// Human-readable label
    pub name: String,

    /// Ready-to-use command for delivering the approval signal
    pub instruction: String,
}

impl ApprovalStatus {
    /// Build the status for one run, with a copy-pasteable curl command
    pub fn for_run(run_id: Uuid, base_url: &str) -> Self {
        Self {
            name: "order-processing - awaiting approval".to_string(),
            instruction: format!(
                "curl -d 'true' {base_url}/orders/{run_id}/events/{} \
                 -H 'Content-Type: application/json'",
                crate::run::APPROVAL_EVENT,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_true_approves() {
        let mut race = ApprovalRace::new();
        let outcome = race.resolve(RaceWinner::Signal { approved: true });

        assert_eq!(outcome, Some(ApprovalOutcome::Approved));
        assert!(race.outcome().unwrap().is_approved());
    }

    #[test]
    fn test_signal_false_expires() {
        let mut race = ApprovalRace::new();
        let outcome = race.resolve(RaceWinner::Signal { approved: false });

        assert_eq!(outcome, Some(ApprovalOutcome::Expired));
    }

    #[test]
    fn test_timeout_expires() {
        let mut race = ApprovalRace::new();
        let outcome = race.resolve(RaceWinner::Timeout);

        assert_eq!(outcome, Some(ApprovalOutcome::Expired));
    }

    #[test]
    fn test_late_signal_ignored_after_timeout() {
        let mut race = ApprovalRace::new();
        race.resolve(RaceWinner::Timeout);

        // A true signal after the window closed must not flip the outcome
        assert_eq!(race.resolve(RaceWinner::Signal { approved: true }), None);
        assert_eq!(race.outcome(), Some(ApprovalOutcome::Expired));
    }

    #[test]
    fn test_late_timeout_ignored_after_approval() {
        let mut race = ApprovalRace::new();
        race.resolve(RaceWinner::Signal { approved: true });

        assert_eq!(race.resolve(RaceWinner::Timeout), None);
        assert_eq!(race.outcome(), Some(ApprovalOutcome::Approved));
    }

    #[test]
    fn test_status_instruction_targets_run() {
        let run_id = Uuid::now_v7();
        let status = ApprovalStatus::for_run(run_id, "http://localhost:3000");

        assert!(status.name.contains("awaiting approval"));
        assert!(status
            .instruction
            .contains(&format!("/orders/{run_id}/events/ApprovalEvent")));
    }
}
