//! # Payments Types
//!
//! Domain types and port traits for the payment orchestration service.
//! This crate has no IO of its own: data structures, status rules and the
//! contracts that provider and storage adapters implement.
//!
//! ## Architecture
//!
//! This crate is the **innermost core** of the hexagonal architecture:
//! - `domain/` - Transactions, payment methods, provider events
//! - `ports/` - `PaymentProcessor` and `Repository<R>` traits
//! - `dto/` - Provider-agnostic request and response shapes
//! - `error/` - Layered error taxonomy

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    CurrencyCode, EventPayload, PaymentEvent, PaymentEventKind, PaymentMethod,
    PaymentMethodStatus, ProviderId, Transaction, TransactionId, TxStatus,
};
pub use dto::*;
pub use error::{AppError, DomainError, ProviderError, RepoError};
pub use ports::{ColumnValue, Filter, PaymentProcessor, Record, Repository};
