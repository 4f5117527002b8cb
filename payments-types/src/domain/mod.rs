//! Domain models for the payment orchestration service.

pub mod currency;
pub mod event;
pub mod payment_method;
pub mod provider;
pub mod transaction;

pub use currency::CurrencyCode;
pub use event::{EventPayload, PaymentEvent, PaymentEventKind};
pub use payment_method::{PaymentMethod, PaymentMethodStatus};
pub use provider::ProviderId;
pub use transaction::{Transaction, TransactionId, TxStatus};
