//! Stripe REST object shapes (only the fields the adapter reads).

use serde::Deserialize;

use payments_types::{ProcessorResponse, ProviderError, TxStatus};

/// A field Stripe returns either as an id or as the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub payment_method: Option<Expandable>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub payment_method: Option<Expandable>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type", default)]
    pub method_type: Option<String>,
    #[serde(default)]
    pub customer: Option<Expandable>,
}

#[derive(Debug, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Maps Stripe's intent status onto the local status vocabulary.
///
/// Every `requires_*` state and `processing` are still open from the
/// local point of view.
pub fn normalize_status(status: &str) -> TxStatus {
    match status {
        "succeeded" => TxStatus::Succeeded,
        "canceled" => TxStatus::Canceled,
        _ => TxStatus::Pending,
    }
}

impl PaymentIntent {
    /// Payment method of the intent, falling back to the one that failed.
    pub fn payment_method_id(&self) -> Option<String> {
        self.payment_method
            .clone()
            .or_else(|| {
                self.last_payment_error
                    .as_ref()
                    .and_then(|e| e.payment_method.clone())
            })
            .map(Expandable::into_id)
    }

    pub fn into_response(self) -> Result<ProcessorResponse, ProviderError> {
        let payment_method_id = self.payment_method_id();
        let currency = self
            .currency
            .parse()
            .map_err(|e| ProviderError::Malformed(format!("intent {}: {}", self.id, e)))?;

        Ok(ProcessorResponse {
            status: normalize_status(&self.status),
            provider_status: self.status,
            id: self.id,
            amount: self.amount,
            currency,
            client_secret: self.client_secret,
            payment_method_id,
            payment_method_type: None,
        })
    }
}
