//! One handler per step kind

use chrono::Utc;
use rand::Rng;
use tracing::info;

use crate::order::{OrderStep, ProcessingState};

/// Error type for activity failures
///
/// None of the handlers fail under normal conditions; the engine still
/// propagates this without catching or retrying, aborting the run.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ActivityError {
    /// The step is not backed by an activity handler
    #[error("no activity handler for step {0}")]
    NoHandler(OrderStep),
}

/// Execute the handler for one step
///
/// Enumerated dispatch: one handler per step kind. The approval step is
/// not an activity; the engine routes it to the approval race instead.
pub async fn execute(
    step: OrderStep,
    state: ProcessingState,
) -> Result<ProcessingState, ActivityError> {
    match step {
        OrderStep::OrderRequest => Ok(order_request(state)),
        OrderStep::Payment => Ok(payment(state)),
        OrderStep::ProcessOrder => Ok(process_order(state)),
        OrderStep::SendOrder => Ok(send_order(state)),
        OrderStep::Approval => Err(ActivityError::NoHandler(step)),
    }
}

/// Assign a fresh random order number in [1000, 9999]
fn order_request(mut state: ProcessingState) -> ProcessingState {
    info!(
        product_name = %state.product_name,
        quantity = state.quantity,
        unit_price = %state.unit_price,
        "order request received"
    );
    state.order_number = Some(rand::thread_rng().gen_range(1000..=9999));
    state
}

/// Compute the total: quantity x unit price, exact in cents
fn payment(mut state: ProcessingState) -> ProcessingState {
    info!(order_number = state.order_number, "payment received");
    state.total_paid = Some(state.unit_price * state.quantity);
    state
}

/// Mark the order processed and refresh the update timestamp
fn process_order(mut state: ProcessingState) -> ProcessingState {
    info!(order_number = state.order_number, "order is being processed");
    state.is_order_processed = true;
    state.last_update = Some(Utc::now());
    state
}

/// Mark the order sent and refresh the update timestamp
fn send_order(mut state: ProcessingState) -> ProcessingState {
    info!(order_number = state.order_number, "order is being sent");
    state.is_order_sent = true;
    state.last_update = Some(Utc::now());
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{InputOrder, Money};

    fn state() -> ProcessingState {
        ProcessingState::new(&InputOrder {
            product_name: "Widget".to_string(),
            quantity: 3,
            unit_price: Money::from_cents(1999),
        })
    }

    #[tokio::test]
    async fn test_order_request_assigns_number_in_range() {
        let before = state();
        let after = execute(OrderStep::OrderRequest, before.clone())
            .await
            .unwrap();

        let number = after.order_number.expect("order number assigned");
        assert!((1000..=9999).contains(&number));

        // Everything else untouched
        assert_eq!(after.total_paid, before.total_paid);
        assert_eq!(after.is_approved, before.is_approved);
        assert_eq!(after.is_order_processed, before.is_order_processed);
        assert_eq!(after.last_update, before.last_update);
    }

    #[tokio::test]
    async fn test_payment_is_exact() {
        let after = execute(OrderStep::Payment, state()).await.unwrap();

        // 3 x 19.99 must be exactly 59.97
        assert_eq!(after.total_paid, Some(Money::from_cents(5997)));
    }

    #[tokio::test]
    async fn test_process_order_flips_flag_and_timestamp() {
        let after = execute(OrderStep::ProcessOrder, state()).await.unwrap();

        assert!(after.is_order_processed);
        assert!(!after.is_order_sent);
        assert!(after.last_update.is_some());
    }

    #[tokio::test]
    async fn test_send_order_flips_flag_and_timestamp() {
        let after = execute(OrderStep::SendOrder, state()).await.unwrap();

        assert!(after.is_order_sent);
        assert!(after.last_update.is_some());
    }

    #[tokio::test]
    async fn test_approval_has_no_handler() {
        let result = execute(OrderStep::Approval, state()).await;
        assert_eq!(result, Err(ActivityError::NoHandler(OrderStep::Approval)));
    }
}
