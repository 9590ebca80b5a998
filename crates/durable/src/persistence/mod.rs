//! Run event persistence
//!
//! The store is the checkpoint seam: everything the engine must survive a
//! restart goes through [`RunEventStore`]. Only an in-memory
//! implementation ships today; a SQL-backed store can slot in behind the
//! same trait.

mod memory;
mod store;

pub use memory::InMemoryRunEventStore;
pub use store::{RunEventStore, RunInfo, RunStatus, StoreError};
