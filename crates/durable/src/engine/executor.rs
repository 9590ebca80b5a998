//! Run driver with replay support
//!
//! The `OrchestrationEngine` is responsible for:
//! - Starting new runs (including immediate rejection of invalid input)
//! - Driving the fixed step sequence, checkpointing each result
//! - Resuming interrupted runs from their checkpointed history
//! - Running the approval race and delivering external signals to it
//!
//! Everything the engine does directly is a pure function of the
//! checkpointed history; randomness and clock reads live in the activity
//! handlers, whose results are checkpointed before the run advances.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::STEP_SEQUENCE;
use crate::activity::{self, ActivityError};
use crate::approval::{
    ApprovalOutcome, ApprovalRace, ApprovalStatus, RaceWinner, DEFAULT_APPROVAL_TIMEOUT,
};
use crate::order::{InputOrder, OrderStep, ProcessingState, REJECTION_REPORT};
use crate::persistence::{RunEventStore, RunInfo, RunStatus, StoreError};
use crate::run::{replay, ReplayError, RunEvent, RunOutcome, RunSignal, APPROVAL_EVENT};

/// Configuration for the orchestration engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the approval race waits before expiring
    pub approval_timeout: Duration,

    /// Base URL embedded in the published approval instruction
    pub public_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Errors from engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Replay error (corrupt or non-deterministic history)
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    /// A step handler failed; the run aborted
    #[error("activity error: {0}")]
    Activity(#[from] ActivityError),

    /// Run already reached a terminal state
    #[error("run {0} already completed")]
    RunCompleted(Uuid),

    /// Run previously aborted on a handler failure
    #[error("run {0} previously failed: {1}")]
    RunFailed(Uuid, String),

    /// Signal name is not one this engine understands
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The orchestration engine
///
/// Drives the fixed step sequence for order-processing runs. A run is
/// started once with [`start`](Self::start) and advanced (or resumed
/// after a restart) with [`drive`](Self::drive); external observers
/// deliver approval decisions through [`raise_event`](Self::raise_event).
///
/// # Example
///
/// ```ignore
/// use orderflow_durable::prelude::*;
///
/// let store = Arc::new(InMemoryRunEventStore::new());
/// let engine = OrchestrationEngine::new(store);
///
/// let run_id = engine.start(input).await?;
/// let report = engine.drive(run_id).await?;
/// ```
pub struct OrchestrationEngine<S: RunEventStore> {
    store: Arc<S>,
    config: EngineConfig,

    /// Live signal channels, present only while a run's approval race is
    /// waiting
    waiters: DashMap<Uuid, mpsc::UnboundedSender<bool>>,
}

impl<S: RunEventStore> OrchestrationEngine<S> {
    /// Create a new engine with default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create a new engine with custom configuration
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            waiters: DashMap::new(),
        }
    }

    /// Get a reference to the store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get full run info (status, current step, published approval status)
    pub async fn info(&self, run_id: Uuid) -> Result<RunInfo, EngineError> {
        Ok(self.store.get_run_info(run_id).await?)
    }

    /// Start a new run
    ///
    /// Validates the input first: an invalid order completes the run
    /// immediately with [`REJECTION_REPORT`], allocating no processing
    /// state and dispatching no step. A valid order is recorded and left
    /// for [`drive`](Self::drive) to execute.
    #[instrument(skip(self, input))]
    pub async fn start(&self, input: InputOrder) -> Result<Uuid, EngineError> {
        let run_id = Uuid::now_v7();
        let input_json = serde_json::to_value(&input)?;

        info!(%run_id, product_name = %input.product_name, "starting new run");

        self.store.create_run(run_id, input_json.clone()).await?;
        let seq = self
            .store
            .append_events(run_id, 0, vec![RunEvent::RunStarted { input: input_json }])
            .await?;

        if !input.validate() {
            warn!(%run_id, "order failed validation, completing immediately");
            self.store
                .append_events(
                    run_id,
                    seq,
                    vec![RunEvent::RunCompleted {
                        report: REJECTION_REPORT.to_string(),
                    }],
                )
                .await?;
            self.store
                .update_run_status(
                    run_id,
                    RunStatus::Completed,
                    Some(REJECTION_REPORT.to_string()),
                    None,
                )
                .await?;
        }

        Ok(run_id)
    }

    /// Drive a run to completion, resuming from its checkpointed history
    ///
    /// Fresh runs and restarts take the same path: the history is folded
    /// into a position, already-checkpointed steps are skipped, and only
    /// steps without a recorded result are dispatched. Calling this on a
    /// completed run returns the stored report without dispatching
    /// anything.
    #[instrument(skip(self))]
    pub async fn drive(&self, run_id: Uuid) -> Result<String, EngineError> {
        let info = self.store.get_run_info(run_id).await?;
        match info.status {
            RunStatus::Completed => return Ok(info.result.unwrap_or_default()),
            RunStatus::Failed => {
                return Err(EngineError::RunFailed(
                    run_id,
                    info.error.unwrap_or_default(),
                ))
            }
            RunStatus::Pending | RunStatus::Running => {}
        }

        let events = self.store.load_events(run_id).await?;
        let replayed = replay(&events)?;
        // A history can end in a terminal event while the stored status
        // still says Running (crash between the append and the status
        // update); reconcile before returning.
        match replayed.outcome {
            Some(RunOutcome::Completed(report)) => {
                self.store
                    .update_run_status(run_id, RunStatus::Completed, Some(report.clone()), None)
                    .await?;
                self.store.set_approval_status(run_id, None).await?;
                return Ok(report);
            }
            Some(RunOutcome::Failed(message)) => {
                self.store
                    .update_run_status(run_id, RunStatus::Failed, None, Some(message.clone()))
                    .await?;
                self.store.set_approval_status(run_id, None).await?;
                return Err(EngineError::RunFailed(run_id, message));
            }
            None => {}
        }

        let input: InputOrder = serde_json::from_value(info.input)?;
        let mut seq = events.len() as i32;
        let mut state = replayed
            .state
            .unwrap_or_else(|| ProcessingState::new(&input));
        let mut approval_due = replayed.approval_due;
        let mut approval_resolution = replayed.approval_resolution;

        if replayed.steps_completed > 0 {
            debug!(
                %run_id,
                steps_completed = replayed.steps_completed,
                "resuming from checkpointed history"
            );
        }
        self.store
            .update_run_status(run_id, RunStatus::Running, None, None)
            .await?;

        for &step in &STEP_SEQUENCE[replayed.steps_completed..] {
            state.current_step = step;
            self.store.set_current_step(run_id, step).await?;
            debug!(%run_id, %step, "dispatching step");

            state = if step == OrderStep::Approval {
                self.run_approval(
                    run_id,
                    &mut seq,
                    state,
                    approval_due.take(),
                    approval_resolution.take(),
                )
                .await?
            } else {
                match activity::execute(step, state).await {
                    Ok(next) => {
                        seq = self
                            .store
                            .append_events(
                                run_id,
                                seq,
                                vec![RunEvent::StepCompleted {
                                    step,
                                    state: next.clone(),
                                }],
                            )
                            .await?;
                        next
                    }
                    Err(err) => {
                        error!(%run_id, %step, %err, "step handler failed, aborting run");
                        self.store
                            .append_events(
                                run_id,
                                seq,
                                vec![RunEvent::RunFailed {
                                    error: err.to_string(),
                                }],
                            )
                            .await?;
                        self.store
                            .update_run_status(
                                run_id,
                                RunStatus::Failed,
                                None,
                                Some(err.to_string()),
                            )
                            .await?;
                        return Err(err.into());
                    }
                }
            };
        }

        let report = state.report();
        info!(%run_id, "run completed");
        self.store
            .append_events(
                run_id,
                seq,
                vec![RunEvent::RunCompleted {
                    report: report.clone(),
                }],
            )
            .await?;
        self.store
            .update_run_status(run_id, RunStatus::Completed, Some(report.clone()), None)
            .await?;

        Ok(report)
    }

    /// Deliver an external event to a run instance
    ///
    /// Only `ApprovalEvent` with a boolean value is understood. If the
    /// run's approval race is waiting, the value is delivered to it
    /// directly; otherwise it is stashed for the race to drain on entry.
    /// A signal arriving after the race has concluded is never drained
    /// again and is thereby ignored; signals to terminal runs are
    /// rejected.
    #[instrument(skip(self))]
    pub async fn raise_event(
        &self,
        run_id: Uuid,
        event_name: &str,
        approved: bool,
    ) -> Result<(), EngineError> {
        if event_name != APPROVAL_EVENT {
            return Err(EngineError::UnknownEvent(event_name.to_string()));
        }

        let status = self.store.get_run_status(run_id).await?;
        if status.is_terminal() {
            warn!(%run_id, %status, "cannot signal a terminal run");
            return Err(EngineError::RunCompleted(run_id));
        }

        if let Some(tx) = self.waiters.get(&run_id) {
            if tx.send(approved).is_ok() {
                info!(%run_id, approved, "approval signal delivered");
                return Ok(());
            }
        }

        self.store
            .send_signal(run_id, RunSignal::approval(approved))
            .await?;
        info!(%run_id, approved, "approval signal stashed");
        Ok(())
    }

    // =========================================================================
    // Internal Methods
    // =========================================================================

    /// Run the approval step: race the timeout against the external signal
    ///
    /// The deadline is checkpointed on first entry so a resumed run keeps
    /// the original window, and the winning event is checkpointed before
    /// the step result. A resumed run consumes whichever of those facts
    /// the history already records: a recorded resolution is never
    /// re-raced, even when the deadline passed during the downtime.
    async fn run_approval(
        &self,
        run_id: Uuid,
        seq: &mut i32,
        mut state: ProcessingState,
        recorded_due: Option<DateTime<Utc>>,
        recorded_resolution: Option<RaceWinner>,
    ) -> Result<ProcessingState, EngineError> {
        let mut race = ApprovalRace::new();

        let winner = match recorded_resolution {
            Some(winner) => {
                debug!(%run_id, ?winner, "resuming with recorded race resolution");
                winner
            }
            None => self.race_approval(run_id, seq, recorded_due).await?,
        };

        // The first resolution of a fresh race always decides
        let outcome = race.resolve(winner).unwrap_or(ApprovalOutcome::Expired);
        state.is_approved = outcome.is_approved();
        if state.is_approved {
            info!(%run_id, order_number = state.order_number, "approval received");
        } else {
            info!(%run_id, order_number = state.order_number, "approval window expired");
        }

        *seq = self
            .store
            .append_events(
                run_id,
                *seq,
                vec![RunEvent::StepCompleted {
                    step: OrderStep::Approval,
                    state: state.clone(),
                }],
            )
            .await?;
        self.store.set_approval_status(run_id, None).await?;

        Ok(state)
    }

    /// Wait out the race and checkpoint the winning event
    ///
    /// Returns only after the resolution (`signal_received` or
    /// `timer_fired`) is durably appended; a crash after that point
    /// resumes with the recorded winner instead of calling back in here.
    async fn race_approval(
        &self,
        run_id: Uuid,
        seq: &mut i32,
        recorded_due: Option<DateTime<Utc>>,
    ) -> Result<RaceWinner, EngineError> {
        let due_at = match recorded_due {
            Some(due_at) => {
                debug!(%run_id, %due_at, "resuming approval wait with recorded deadline");
                due_at
            }
            None => {
                let window = chrono::Duration::from_std(self.config.approval_timeout)
                    .unwrap_or(chrono::Duration::MAX);
                let due_at = Utc::now() + window;
                *seq = self
                    .store
                    .append_events(run_id, *seq, vec![RunEvent::ApprovalWaitStarted { due_at }])
                    .await?;
                due_at
            }
        };

        // Register the live channel before draining the stash so a signal
        // cannot slip between the two deliveries.
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.waiters.insert(run_id, tx);

        let status = ApprovalStatus::for_run(run_id, &self.config.public_base_url);
        self.store.set_approval_status(run_id, Some(status)).await?;
        info!(%run_id, %due_at, "awaiting approval");

        let pending = self.store.take_pending_signals(run_id).await?;
        let stashed = pending.into_iter().find(|s| s.is_approval());

        let winner = match stashed {
            Some(signal) => {
                let approved = signal.approved;
                *seq = self
                    .store
                    .append_events(run_id, *seq, vec![RunEvent::SignalReceived { signal }])
                    .await?;
                RaceWinner::Signal { approved }
            }
            None => {
                let remaining = (due_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                let winner = tokio::select! {
                    _ = tokio::time::sleep(remaining) => RaceWinner::Timeout,
                    value = rx.recv() => RaceWinner::Signal {
                        approved: value.unwrap_or(false),
                    },
                };
                match winner {
                    RaceWinner::Signal { approved } => {
                        *seq = self
                            .store
                            .append_events(
                                run_id,
                                *seq,
                                vec![RunEvent::SignalReceived {
                                    signal: RunSignal::approval(approved),
                                }],
                            )
                            .await?;
                    }
                    RaceWinner::Timeout => {
                        *seq = self
                            .store
                            .append_events(run_id, *seq, vec![RunEvent::TimerFired])
                            .await?;
                    }
                }
                winner
            }
        };
        self.waiters.remove(&run_id);

        if matches!(winner, RaceWinner::Signal { .. }) {
            // The losing timeout wait was dropped with the select; record
            // the cancellation so no later timer fire can be observed
            *seq = self
                .store
                .append_events(run_id, *seq, vec![RunEvent::TimerCancelled])
                .await?;
        }

        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Money;
    use crate::persistence::InMemoryRunEventStore;

    fn engine() -> OrchestrationEngine<InMemoryRunEventStore> {
        OrchestrationEngine::new(Arc::new(InMemoryRunEventStore::new()))
    }

    fn valid_input() -> InputOrder {
        InputOrder {
            product_name: "Widget".to_string(),
            quantity: 5,
            unit_price: Money::from_cents(1000),
        }
    }

    fn invalid_input() -> InputOrder {
        InputOrder {
            product_name: String::new(),
            quantity: 5,
            unit_price: Money::from_cents(1000),
        }
    }

    #[tokio::test]
    async fn test_start_records_history() {
        let engine = engine();
        let run_id = engine.start(valid_input()).await.unwrap();

        let status = engine.store().get_run_status(run_id).await.unwrap();
        assert_eq!(status, RunStatus::Pending);

        let events = engine.store().load_events(run_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].1, RunEvent::RunStarted { .. }));
    }

    #[tokio::test]
    async fn test_invalid_order_completes_immediately() {
        let engine = engine();
        let run_id = engine.start(invalid_input()).await.unwrap();

        let info = engine.info(run_id).await.unwrap();
        assert_eq!(info.status, RunStatus::Completed);
        assert_eq!(info.result.as_deref(), Some(REJECTION_REPORT));

        // No step was ever dispatched
        let events = engine.store().load_events(run_id).await.unwrap();
        assert!(events.iter().all(|(_, e)| e.step().is_none()));
    }

    #[tokio::test]
    async fn test_drive_returns_stored_report_for_completed_run() {
        let engine = engine();
        let run_id = engine.start(invalid_input()).await.unwrap();

        let report = engine.drive(run_id).await.unwrap();
        assert_eq!(report, REJECTION_REPORT);
    }

    #[tokio::test]
    async fn test_drive_reconciles_status_after_terminal_event() {
        let engine = engine();
        let run_id = Uuid::now_v7();
        let input_json = serde_json::to_value(valid_input()).unwrap();

        // A crash can land between the terminal event append and the
        // status update; rebuild that history by hand
        engine
            .store()
            .create_run(run_id, input_json.clone())
            .await
            .unwrap();
        engine
            .store()
            .append_events(
                run_id,
                0,
                vec![
                    RunEvent::RunStarted { input: input_json },
                    RunEvent::RunCompleted {
                        report: "done".to_string(),
                    },
                ],
            )
            .await
            .unwrap();
        engine
            .store()
            .set_approval_status(run_id, Some(ApprovalStatus::for_run(run_id, "http://x")))
            .await
            .unwrap();

        let report = engine.drive(run_id).await.unwrap();
        assert_eq!(report, "done");

        let info = engine.info(run_id).await.unwrap();
        assert_eq!(info.status, RunStatus::Completed);
        assert_eq!(info.result.as_deref(), Some("done"));
        assert!(info.approval_status.is_none());
    }

    #[tokio::test]
    async fn test_unknown_event_rejected() {
        let engine = engine();
        let run_id = engine.start(valid_input()).await.unwrap();

        let result = engine.raise_event(run_id, "SomeOtherEvent", true).await;
        assert!(matches!(result, Err(EngineError::UnknownEvent(_))));
    }

    #[tokio::test]
    async fn test_cannot_signal_terminal_run() {
        let engine = engine();
        let run_id = engine.start(invalid_input()).await.unwrap();

        let result = engine.raise_event(run_id, APPROVAL_EVENT, true).await;
        assert!(matches!(result, Err(EngineError::RunCompleted(_))));
    }

    #[tokio::test]
    async fn test_signal_before_race_is_stashed() {
        let engine = engine();
        let run_id = engine.start(valid_input()).await.unwrap();

        engine.raise_event(run_id, APPROVAL_EVENT, true).await.unwrap();

        let signals = engine.store().take_pending_signals(run_id).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert!(signals[0].approved);
    }
}
