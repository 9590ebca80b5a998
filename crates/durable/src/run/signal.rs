//! External signals delivered to a run instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the external event that resolves the approval step
pub const APPROVAL_EVENT: &str = "ApprovalEvent";

/// An external signal addressed to one run instance
///
/// Signals are the only way an outside observer can influence a run. They
/// never mutate engine-owned state directly; the engine consumes them at
/// the approval race and records the outcome as a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSignal {
    /// Signal name (currently only [`APPROVAL_EVENT`])
    pub name: String,

    /// The delivered boolean value
    pub approved: bool,

    /// When the signal was sent
    pub sent_at: DateTime<Utc>,
}

impl RunSignal {
    /// Create an approval signal carrying the given decision
    pub fn approval(approved: bool) -> Self {
        Self {
            name: APPROVAL_EVENT.to_string(),
            approved,
            sent_at: Utc::now(),
        }
    }

    /// Check whether this signal resolves the approval race
    pub fn is_approval(&self) -> bool {
        self.name == APPROVAL_EVENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_signal() {
        let signal = RunSignal::approval(true);

        assert!(signal.is_approval());
        assert!(signal.approved);
        assert_eq!(signal.name, APPROVAL_EVENT);
    }

    #[test]
    fn test_signal_serialization() {
        let signal = RunSignal::approval(false);

        let json = serde_json::to_string(&signal).unwrap();
        let parsed: RunSignal = serde_json::from_str(&json).unwrap();

        assert_eq!(signal, parsed);
    }
}
