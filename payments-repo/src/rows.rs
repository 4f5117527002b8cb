//! Database row structs shared by both backends.
//!
//! Field types are chosen so the same struct decodes from PostgreSQL
//! (`UUID`, `TIMESTAMPTZ`, `JSONB`) and SQLite (`BLOB`, `TEXT`, `TEXT`).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use payments_types::{
    PaymentMethod, PaymentMethodStatus, ProviderId, RepoError, Transaction, TransactionId,
};

use crate::columns::{Column, PaymentMethodColumn, SqlValue, TransactionColumn};

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a driver error, keeping pool exhaustion and uniqueness conflicts
/// distinguishable from other failures.
pub(crate) fn db_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            RepoError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        other => RepoError::Database(other.to_string()),
    }
}

pub(crate) fn tx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            RepoError::Unavailable(err.to_string())
        }
        other => RepoError::Transaction(other.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// transactions
// ─────────────────────────────────────────────────────────────────────────────

/// Transaction row from database.
#[derive(FromRow)]
pub struct DbTransaction {
    pub id: Uuid,
    pub internal_reference: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub tx_status: String,
    pub customer_id: String,
    pub payment_method_id: Option<String>,
    pub payment_method_type: Option<String>,
    pub payment_method_status: Option<String>,
    pub save_payment_method: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Json<BTreeMap<String, String>>,
}

impl DbTransaction {
    /// Convert database row to domain Transaction.
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        Ok(Transaction {
            id: TransactionId::from_uuid(self.id),
            internal_reference: self.internal_reference,
            amount: self.amount,
            currency: self.currency.parse()?,
            payment_intent_id: self.payment_intent_id,
            status: self.tx_status.parse()?,
            customer_id: self.customer_id,
            payment_method_id: self.payment_method_id,
            payment_method_type: self.payment_method_type,
            payment_method_status: self
                .payment_method_status
                .map(|s| s.parse::<PaymentMethodStatus>())
                .transpose()?,
            save_payment_method: self.save_payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata.0,
        })
    }
}

/// Columns and values for an insert. Unset optional fields are omitted
/// so the column default applies.
pub(crate) fn transaction_fields(tx: &Transaction) -> Vec<(TransactionColumn, SqlValue)> {
    use TransactionColumn as C;

    let mut fields = vec![
        (C::Id, SqlValue::Uuid(tx.id.into_uuid())),
        (C::Amount, SqlValue::Int(tx.amount)),
        (C::Currency, SqlValue::Text(tx.currency.to_string())),
        (C::PaymentIntentId, SqlValue::Text(tx.payment_intent_id.clone())),
        (C::TxStatus, SqlValue::Text(tx.status.as_str().to_string())),
        (C::CustomerId, SqlValue::Text(tx.customer_id.clone())),
        (C::CreatedAt, SqlValue::Timestamp(tx.created_at)),
        (C::UpdatedAt, SqlValue::Timestamp(tx.updated_at)),
    ];

    let optional_text = [
        (C::InternalReference, &tx.internal_reference),
        (C::PaymentMethodId, &tx.payment_method_id),
        (C::PaymentMethodType, &tx.payment_method_type),
    ];
    for (column, value) in optional_text {
        if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
            fields.push((column, SqlValue::Text(v.clone())));
        }
    }
    if let Some(status) = tx.payment_method_status {
        fields.push((C::PaymentMethodStatus, SqlValue::Text(status.to_string())));
    }
    if let Some(save) = tx.save_payment_method {
        fields.push((C::SavePaymentMethod, SqlValue::Bool(save)));
    }
    if !tx.metadata.is_empty() {
        fields.push((C::Metadata, SqlValue::Json(Json(tx.metadata.clone()))));
    }

    fields
}

// ─────────────────────────────────────────────────────────────────────────────
// payment_methods
// ─────────────────────────────────────────────────────────────────────────────

/// Payment method row from database.
#[derive(FromRow)]
pub struct DbPaymentMethod {
    pub customer_id: String,
    pub payment_method_id: String,
    pub pm_provider: String,
    pub method_type: Option<String>,
    pub pm_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbPaymentMethod {
    pub fn into_domain(self) -> Result<PaymentMethod, RepoError> {
        Ok(PaymentMethod {
            customer_id: self.customer_id,
            payment_method_id: self.payment_method_id,
            provider: ProviderId::new(&self.pm_provider),
            method_type: self.method_type,
            status: self.pm_status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn payment_method_fields(pm: &PaymentMethod) -> Vec<(PaymentMethodColumn, SqlValue)> {
    use PaymentMethodColumn as C;

    let mut fields = vec![
        (C::CustomerId, SqlValue::Text(pm.customer_id.clone())),
        (C::PaymentMethodId, SqlValue::Text(pm.payment_method_id.clone())),
        (C::Provider, SqlValue::Text(pm.provider.to_string())),
        (C::Status, SqlValue::Text(pm.status.to_string())),
        (C::CreatedAt, SqlValue::Timestamp(pm.created_at)),
        (C::UpdatedAt, SqlValue::Timestamp(pm.updated_at)),
    ];
    if let Some(kind) = pm.method_type.as_ref().filter(|k| !k.is_empty()) {
        fields.push((C::MethodType, SqlValue::Text(kind.clone())));
    }
    fields
}

/// Statement suffix that turns an insert into an idempotent one.
pub(crate) trait ConflictTarget: Column {
    const CONFLICT_TARGET: &'static str;
}

impl ConflictTarget for TransactionColumn {
    const CONFLICT_TARGET: &'static str = "payment_intent_id";
}

impl ConflictTarget for PaymentMethodColumn {
    const CONFLICT_TARGET: &'static str = "customer_id, payment_method_id";
}

#[cfg(test)]
mod tests {
    use super::*;
    use payments_types::TxStatus;

    #[test]
    fn test_unset_optionals_are_omitted() {
        let tx = Transaction::new(
            "pi_1",
            1000,
            "usd".parse().unwrap(),
            "cust_1",
            TxStatus::Pending,
        );
        let columns: Vec<_> = transaction_fields(&tx).into_iter().map(|(c, _)| c).collect();

        assert!(!columns.contains(&TransactionColumn::InternalReference));
        assert!(!columns.contains(&TransactionColumn::SavePaymentMethod));
        assert!(!columns.contains(&TransactionColumn::Metadata));
        assert!(columns.contains(&TransactionColumn::TxStatus));
    }

    #[test]
    fn test_set_optionals_are_included() {
        let tx = Transaction::new(
            "pi_1",
            1000,
            "usd".parse().unwrap(),
            "cust_1",
            TxStatus::Succeeded,
        )
        .with_reference(Some("order-9".into()))
        .remember_method(false)
        .with_metadata(BTreeMap::from([("k".to_string(), "v".to_string())]));
        let columns: Vec<_> = transaction_fields(&tx).into_iter().map(|(c, _)| c).collect();

        assert!(columns.contains(&TransactionColumn::InternalReference));
        assert!(columns.contains(&TransactionColumn::SavePaymentMethod));
        assert!(columns.contains(&TransactionColumn::Metadata));
    }
}
