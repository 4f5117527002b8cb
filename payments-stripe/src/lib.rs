//! # Payments Stripe
//!
//! Stripe implementation of the `PaymentProcessor` port: intents, direct
//! charges with on-the-fly customer association, cancellation, and
//! verification of signed webhook deliveries.
//!
//! # Example
//! ```no_run
//! use payments_stripe::{StripeConfig, StripeProcessor};
//!
//! let config = StripeConfig::new("sk_test_...", "whsec_...");
//! let stripe = StripeProcessor::new(config).unwrap();
//! ```

mod processor;
pub mod signature;
mod wire;

pub use processor::{StripeConfig, StripeProcessor};

/// Identifier the adapter registers under.
pub const PROVIDER: &str = "stripe";
