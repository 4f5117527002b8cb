//! # Payments Hex
//!
//! Application layer and HTTP adapter for the payment orchestration service.
//!
//! ## Architecture
//!
//! - `registry` - Provider and repository lookup tables, filled once at startup
//! - `service` - Orchestration of provider calls and local persistence
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service never names a concrete provider or database. It resolves
//! `Arc<dyn PaymentProcessor>` and `Arc<dyn Repository<R>>` from the
//! registries per call.

pub mod inbound;
pub mod openapi;
pub mod registry;
pub mod service;


pub use registry::{ProviderRegistry, RepositoryRegistry};
pub use service::{OrphanIntentPolicy, PaymentService, Timeouts};
