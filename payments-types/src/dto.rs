//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::domain::{CurrencyCode, PaymentMethod, PaymentMethodStatus, TxStatus};
use crate::error::DomainError;

// ─────────────────────────────────────────────────────────────────────────────
// Intent DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic request to create an intent or charge a customer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentRequest {
    /// Amount in the currency's minor unit (e.g. cents)
    #[schema(example = 1000)]
    pub amount: i64,
    pub currency: CurrencyCode,
    #[schema(example = "cust_1")]
    pub customer_id: String,
    /// Provider payment-method reference; required for direct charges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "pm_card_visa")]
    pub token: Option<String>,
    /// Remember the payment method for later use. Absent means no.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Payment method type hint forwarded to the provider (e.g. `card`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Caller's own reference, stored with the transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_reference: Option<String>,
}

impl PaymentIntentRequest {
    /// Checks the fields every provider operation relies on.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.amount <= 0 {
            return Err(DomainError::NonPositiveAmount(self.amount));
        }
        if self.customer_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "customer_id cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Validates a direct-charge request, which also needs a token.
    pub fn validate_charge(&self) -> Result<&str, DomainError> {
        self.validate()?;
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DomainError::ValidationError("token is required for a charge".into()))
    }

    pub fn remember(&self) -> bool {
        self.remember_me.unwrap_or(false)
    }
}

/// Normalized intent as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentResponse {
    #[schema(example = "pi_3MtwBwLkdIwHu7ix28a3tqPa")]
    pub id: String,
    pub amount: i64,
    pub currency: CurrencyCode,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Identifies an existing intent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfoRequest {
    pub id: String,
}

/// What a provider adapter reports after a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorResponse {
    pub id: String,
    pub amount: i64,
    pub currency: CurrencyCode,
    pub status: TxStatus,
    /// Status string exactly as the provider sent it
    pub provider_status: String,
    pub client_secret: Option<String>,
    pub payment_method_id: Option<String>,
    pub payment_method_type: Option<String>,
}

impl From<ProcessorResponse> for PaymentIntentResponse {
    fn from(res: ProcessorResponse) -> Self {
        Self {
            id: res.id,
            amount: res.amount,
            currency: res.currency,
            status: res.status,
            client_secret: res.client_secret,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment method DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Public view of a remembered payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodResponse {
    pub client_id: String,
    pub payment_method_id: String,
    #[schema(example = "stripe")]
    pub payment_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_type: Option<String>,
    pub payment_method_status: PaymentMethodStatus,
}

impl From<PaymentMethod> for PaymentMethodResponse {
    fn from(pm: PaymentMethod) -> Self {
        Self {
            client_id: pm.customer_id,
            payment_method_id: pm.payment_method_id,
            payment_provider: pm.provider.to_string(),
            payment_method_type: pm.method_type,
            payment_method_status: pm.status,
        }
    }
}
