//! Order input model and the state threaded through the pipeline

mod input;
mod state;

pub use input::{InputOrder, Money, REJECTION_REPORT};
pub use state::{OrderStep, ProcessingState};
