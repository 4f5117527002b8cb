//! Normalized provider notifications.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::transaction::TxStatus;
use crate::dto::PaymentIntentResponse;

/// Normalized kind of a provider webhook event.
///
/// Kinds the reconciliation logic understands map to a fixed vocabulary;
/// anything else keeps the provider's own type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl PaymentEventKind {
    pub const SUCCEEDED: &'static str = "payment_succeeded";
    pub const FAILED: &'static str = "payment_failed";
    pub const CANCELED: &'static str = "payment_canceled";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => Self::SUCCEEDED,
            Self::Failed => Self::FAILED,
            Self::Canceled => Self::CANCELED,
            Self::Other(kind) => kind,
        }
    }

    /// Transaction status this event drives, if any.
    pub fn target_status(&self) -> Option<TxStatus> {
        match self {
            Self::Succeeded => Some(TxStatus::Succeeded),
            Self::Failed => Some(TxStatus::Failed),
            Self::Canceled => Some(TxStatus::Canceled),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for PaymentEventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::SUCCEEDED => Self::Succeeded,
            Self::FAILED => Self::Failed,
            Self::CANCELED => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<PaymentEventKind> for String {
    fn from(kind: PaymentEventKind) -> Self {
        match kind {
            PaymentEventKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for PaymentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event body: the normalized intent for known kinds, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Intent(PaymentIntentResponse),
    Opaque {
        #[serde(skip)]
        raw: Vec<u8>,
    },
}

/// A verified and decoded provider webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "payment_succeeded")]
    pub kind: PaymentEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[schema(value_type = Object)]
    pub payload: EventPayload,
}

impl PaymentEvent {
    /// Event for a kind the reconciliation logic acts on.
    pub fn intent(
        kind: PaymentEventKind,
        intent: PaymentIntentResponse,
        payment_method: Option<String>,
    ) -> Self {
        Self {
            kind,
            payment_intent: Some(intent.id.clone()),
            payment_method,
            payload: EventPayload::Intent(intent),
        }
    }

    /// Pass-through event for a provider type with no local effect.
    pub fn opaque(provider_type: impl Into<String>, raw: Vec<u8>) -> Self {
        Self {
            kind: PaymentEventKind::Other(provider_type.into()),
            payment_intent: None,
            payment_method: None,
            payload: EventPayload::Opaque { raw },
        }
    }
}
