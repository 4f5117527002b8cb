//! Payment provider port.
//!
//! One implementation per external provider. Implementations own the
//! provider's wire protocol and signature scheme and normalize everything
//! into the provider-agnostic shapes of this crate.

use http::HeaderMap;

use crate::domain::{PaymentEvent, ProviderId};
use crate::dto::{PaymentIntentRequest, ProcessorResponse};
use crate::error::ProviderError;

/// Capability interface of an external payment provider.
#[async_trait::async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Canonical identifier the provider is registered under.
    fn id(&self) -> ProviderId;

    /// Reserves a future charge of `amount`/`currency`.
    async fn create_intent(
        &self,
        req: &PaymentIntentRequest,
    ) -> Result<ProcessorResponse, ProviderError>;

    /// Charges `req.token` directly, associating it with a provider-side
    /// customer first when needed. Each remote step fails with its own code.
    async fn charge(&self, req: &PaymentIntentRequest) -> Result<ProcessorResponse, ProviderError>;

    /// Fetches the current provider-side state of an intent.
    async fn get_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError>;

    /// Cancels an intent that has not been confirmed yet.
    async fn cancel_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError>;

    /// Verifies and decodes a webhook delivery. Fails closed with
    /// `InvalidSignature` when the signature header is absent or wrong.
    fn parse_webhook(&self, raw: &[u8], headers: &HeaderMap) -> Result<PaymentEvent, ProviderError>;
}
