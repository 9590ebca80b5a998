//! Processing state mutated once per step, in step order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InputOrder, Money};

/// One named unit of the fixed five-stage pipeline
///
/// The canonical order lives in
/// [`STEP_SEQUENCE`](crate::engine::STEP_SEQUENCE); this enum only names
/// the steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    #[default]
    OrderRequest,
    Payment,
    Approval,
    ProcessOrder,
    SendOrder,
}

impl std::fmt::Display for OrderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderRequest => write!(f, "OrderRequest"),
            Self::Payment => write!(f, "Payment"),
            Self::Approval => write!(f, "Approval"),
            Self::ProcessOrder => write!(f, "ProcessOrder"),
            Self::SendOrder => write!(f, "SendOrder"),
        }
    }
}

/// The mutable record threaded through every step of one run
///
/// The input fields are copied once from [`InputOrder`] and never touched
/// again. Every other field is populated by exactly one step, and no field
/// is ever reset once set. The state has a single mutator at a time: the
/// engine, applying a handler's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,

    /// Assigned by the OrderRequest step, random in [1000, 9999]
    pub order_number: Option<i32>,

    /// Assigned by the Payment step, quantity x unit price
    pub total_paid: Option<Money>,

    /// Assigned by the Approval step
    pub is_approved: bool,

    /// Flipped by the ProcessOrder step
    pub is_order_processed: bool,

    /// Flipped by the SendOrder step
    pub is_order_sent: bool,

    /// Refreshed by the ProcessOrder and SendOrder steps
    pub last_update: Option<DateTime<Utc>>,

    /// The step currently executing, for external observability only;
    /// control order comes from the fixed sequence, never from this field
    pub current_step: OrderStep,
}

impl ProcessingState {
    /// Create the initial state from a validated input order
    pub fn new(input: &InputOrder) -> Self {
        Self {
            product_name: input.product_name.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            order_number: None,
            total_paid: None,
            is_approved: false,
            is_order_processed: false,
            is_order_sent: false,
            last_update: None,
            current_step: OrderStep::default(),
        }
    }

    /// Render the final human-readable report
    pub fn report(&self) -> String {
        format!(
            "Order {} has finished processing with the following details: \
             ProductName: {}, Quantity: {}, TotalPaid: {}, IsApproved: {}, \
             IsOrderProcessed: {}, IsOrderSent: {}, Step: {}",
            self.order_number.unwrap_or(0),
            self.product_name,
            self.quantity,
            self.total_paid.unwrap_or(Money::ZERO),
            self.is_approved,
            self.is_order_processed,
            self.is_order_sent,
            self.current_step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputOrder {
        InputOrder {
            product_name: "Widget".to_string(),
            quantity: 5,
            unit_price: Money::from_cents(1000),
        }
    }

    #[test]
    fn test_initial_state_copies_input() {
        let state = ProcessingState::new(&input());

        assert_eq!(state.product_name, "Widget");
        assert_eq!(state.quantity, 5);
        assert_eq!(state.unit_price, Money::from_cents(1000));
        assert_eq!(state.order_number, None);
        assert_eq!(state.total_paid, None);
        assert!(!state.is_approved);
        assert!(!state.is_order_processed);
        assert!(!state.is_order_sent);
        assert_eq!(state.last_update, None);
    }

    #[test]
    fn test_report_rendering() {
        let mut state = ProcessingState::new(&input());
        state.order_number = Some(4242);
        state.total_paid = Some(Money::from_cents(5000));
        state.is_approved = true;
        state.is_order_processed = true;
        state.is_order_sent = true;
        state.current_step = OrderStep::SendOrder;

        let report = state.report();
        assert!(report.starts_with("Order 4242 has finished processing"));
        assert!(report.contains("ProductName: Widget"));
        assert!(report.contains("Quantity: 5"));
        assert!(report.contains("TotalPaid: 50.00"));
        assert!(report.contains("IsApproved: true"));
        assert!(report.contains("IsOrderProcessed: true"));
        assert!(report.contains("IsOrderSent: true"));
        assert!(report.contains("Step: SendOrder"));
    }

    #[test]
    fn test_state_serialization_round_trip() {
        let mut state = ProcessingState::new(&input());
        state.order_number = Some(1234);
        state.total_paid = Some(Money::from_cents(5000));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: ProcessingState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, parsed);
    }

    #[test]
    fn test_step_display_matches_report_names() {
        assert_eq!(OrderStep::OrderRequest.to_string(), "OrderRequest");
        assert_eq!(OrderStep::SendOrder.to_string(), "SendOrder");
    }
}
