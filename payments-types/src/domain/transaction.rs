//! Transaction domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use super::currency::CurrencyCode;
use super::payment_method::PaymentMethodStatus;
use crate::error::DomainError;

/// Unique identifier for a Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a transaction.
///
/// The only valid transitions are from `Pending` to one of the three
/// terminal states. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if a transaction in this status may move to `next`.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        *self == Self::Pending && next.is_terminal()
    }
}

impl AsRef<str> for TxStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction
// ─────────────────────────────────────────────────────────────────────────────

/// A locally recorded payment, keyed by the provider's intent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: TransactionId,
    /// Caller-supplied reference (order number, invoice, ...)
    pub internal_reference: Option<String>,
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: CurrencyCode,
    /// Provider-assigned intent id, unique once assigned
    pub payment_intent_id: String,
    pub status: TxStatus,
    pub customer_id: String,
    pub payment_method_id: Option<String>,
    pub payment_method_type: Option<String>,
    pub payment_method_status: Option<PaymentMethodStatus>,
    /// Whether the caller asked for the payment method to be remembered
    pub save_payment_method: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl Transaction {
    /// Creates a new transaction for a provider intent.
    pub fn new(
        payment_intent_id: impl Into<String>,
        amount: i64,
        currency: CurrencyCode,
        customer_id: impl Into<String>,
        status: TxStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            internal_reference: None,
            amount,
            currency,
            payment_intent_id: payment_intent_id.into(),
            status,
            customer_id: customer_id.into(),
            payment_method_id: None,
            payment_method_type: None,
            payment_method_status: None,
            save_payment_method: None,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.internal_reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn remember_method(mut self, remember: bool) -> Self {
        self.save_payment_method = Some(remember);
        self
    }

    pub fn with_payment_method(mut self, id: Option<String>, method_type: Option<String>) -> Self {
        if id.is_some() {
            self.payment_method_status = Some(PaymentMethodStatus::Active);
        }
        self.payment_method_id = id;
        self.payment_method_type = method_type;
        self
    }

    /// True when the caller asked to keep the payment method on file.
    pub fn wants_method_saved(&self) -> bool {
        self.save_payment_method.unwrap_or(false)
    }
}
