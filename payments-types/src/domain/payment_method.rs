//! Remembered payment methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::provider::ProviderId;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodStatus {
    #[default]
    Active,
    Inactive,
}

impl PaymentMethodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl AsRef<str> for PaymentMethodStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for PaymentMethodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethodStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// A provider-held, reusable funding source remembered for a customer.
///
/// Identity is the `(customer_id, payment_method_id)` pair; storage enforces
/// it as a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub customer_id: String,
    pub payment_method_id: String,
    pub provider: ProviderId,
    pub method_type: Option<String>,
    pub status: PaymentMethodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Creates an active payment method record.
    pub fn active(
        customer_id: impl Into<String>,
        payment_method_id: impl Into<String>,
        provider: ProviderId,
        method_type: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            customer_id: customer_id.into(),
            payment_method_id: payment_method_id.into(),
            provider,
            method_type,
            status: PaymentMethodStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_payment_method() {
        let pm = PaymentMethod::active("cust_1", "pm_1", ProviderId::new("stripe"), None);
        assert_eq!(pm.status, PaymentMethodStatus::Active);
        assert_eq!(pm.status.to_string(), "active");
    }
}
