//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The orchestration layer depends on these traits, not concrete implementations.

mod processor;
mod repository;

pub use processor::PaymentProcessor;
pub use repository::{ColumnValue, Filter, Record, Repository};
