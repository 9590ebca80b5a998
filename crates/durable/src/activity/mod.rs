//! Activity handlers for the non-approval steps
//!
//! Each handler is a function of ProcessingState. All side effects the
//! pipeline needs (the random order number, clock reads) are confined
//! here; the engine checkpoints each handler's result, so replay never
//! re-executes a handler and the orchestration itself stays deterministic.

mod handlers;

pub use handlers::{execute, ActivityError};
