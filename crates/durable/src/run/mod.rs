//! Run history: checkpoint events, external signals, replay

mod event;
mod replay;
mod signal;

pub use event::RunEvent;
pub use replay::{replay, ReplayError, ReplayedRun, RunOutcome};
pub use signal::{RunSignal, APPROVAL_EVENT};
