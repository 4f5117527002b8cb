//! Column allow-lists and value coercion.
//!
//! Every column name that ends up in SQL text comes from one of the enums
//! below, so identifiers are always compile-time constants. Runtime names
//! (from `find_by_column` or update filters) are looked up here and
//! rejected with `InvalidColumn` when unknown.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use payments_types::{ColumnValue, Filter, RepoError};

/// Storage type of a column, used to coerce filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Int,
    Bool,
    Timestamp,
    /// Stored but never filterable.
    Json,
}

/// A value ready to be bound to a statement.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Json(Json<BTreeMap<String, String>>),
}

/// Comparison used in a WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    AtOrAfter,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => " = ",
            Op::AtOrAfter => " >= ",
        }
    }
}

/// One `column <op> value` term of a WHERE clause.
#[derive(Debug, Clone)]
pub struct Condition<C> {
    pub column: C,
    pub op: Op,
    pub value: SqlValue,
}

impl<C> Condition<C> {
    pub fn eq(column: C, value: SqlValue) -> Self {
        Self {
            column,
            op: Op::Eq,
            value,
        }
    }
}

/// A table's closed set of columns.
pub trait Column: Copy + Send + Sync + 'static {
    const TABLE: &'static str;
    const ALL: &'static [Self];
    const ID: Self;
    const STATUS: Self;
    const CREATED_AT: Self;
    const UPDATED_AT: Self;

    fn as_str(self) -> &'static str;

    fn kind(self) -> ColumnKind;

    /// Resolves a runtime column name against the allow-list.
    fn parse(name: &str) -> Result<Self, RepoError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| RepoError::InvalidColumn(name.to_string()))
    }

    /// Comma-separated column list for SELECT statements.
    fn select_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validates a caller filter and coerces its value to the column type.
    fn condition(filter: &Filter) -> Result<Condition<Self>, RepoError> {
        let column = Self::parse(&filter.column)?;
        let value = coerce(column.as_str(), column.kind(), &filter.value)?;
        Ok(Condition::eq(column, value))
    }
}

fn coerce(name: &str, kind: ColumnKind, value: &ColumnValue) -> Result<SqlValue, RepoError> {
    let invalid = |reason: &str| RepoError::InvalidValue {
        column: name.to_string(),
        reason: reason.to_string(),
    };

    match (kind, value) {
        (ColumnKind::Uuid, ColumnValue::Text(s)) => Uuid::parse_str(s.trim())
            .map(SqlValue::Uuid)
            .map_err(|_| invalid("expected a UUID")),
        (ColumnKind::Text, ColumnValue::Text(s)) => Ok(SqlValue::Text(s.clone())),
        (ColumnKind::Int, ColumnValue::Int(i)) => Ok(SqlValue::Int(*i)),
        (ColumnKind::Int, ColumnValue::Text(s)) => s
            .trim()
            .parse()
            .map(SqlValue::Int)
            .map_err(|_| invalid("expected an integer")),
        (ColumnKind::Bool, ColumnValue::Bool(b)) => Ok(SqlValue::Bool(*b)),
        (ColumnKind::Bool, ColumnValue::Text(s)) => s
            .trim()
            .parse()
            .map(SqlValue::Bool)
            .map_err(|_| invalid("expected true or false")),
        (ColumnKind::Timestamp, ColumnValue::Timestamp(t)) => Ok(SqlValue::Timestamp(*t)),
        (ColumnKind::Timestamp, ColumnValue::Text(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| SqlValue::Timestamp(t.with_timezone(&Utc)))
            .map_err(|_| invalid("expected an RFC 3339 timestamp")),
        (ColumnKind::Json, _) => Err(invalid("column cannot be filtered")),
        _ => Err(invalid("value type does not match column")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// transactions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionColumn {
    Id,
    InternalReference,
    Amount,
    Currency,
    PaymentIntentId,
    TxStatus,
    CustomerId,
    PaymentMethodId,
    PaymentMethodType,
    PaymentMethodStatus,
    SavePaymentMethod,
    CreatedAt,
    UpdatedAt,
    Metadata,
}

impl Column for TransactionColumn {
    const TABLE: &'static str = "transactions";
    const ALL: &'static [Self] = &[
        Self::Id,
        Self::InternalReference,
        Self::Amount,
        Self::Currency,
        Self::PaymentIntentId,
        Self::TxStatus,
        Self::CustomerId,
        Self::PaymentMethodId,
        Self::PaymentMethodType,
        Self::PaymentMethodStatus,
        Self::SavePaymentMethod,
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::Metadata,
    ];
    const ID: Self = Self::Id;
    const STATUS: Self = Self::TxStatus;
    const CREATED_AT: Self = Self::CreatedAt;
    const UPDATED_AT: Self = Self::UpdatedAt;

    fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::InternalReference => "internal_reference",
            Self::Amount => "amount",
            Self::Currency => "currency",
            Self::PaymentIntentId => "payment_intent_id",
            Self::TxStatus => "tx_status",
            Self::CustomerId => "customer_id",
            Self::PaymentMethodId => "payment_method_id",
            Self::PaymentMethodType => "payment_method_type",
            Self::PaymentMethodStatus => "payment_method_status",
            Self::SavePaymentMethod => "save_payment_method",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Metadata => "metadata",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            Self::Id => ColumnKind::Uuid,
            Self::Amount => ColumnKind::Int,
            Self::SavePaymentMethod => ColumnKind::Bool,
            Self::CreatedAt | Self::UpdatedAt => ColumnKind::Timestamp,
            Self::Metadata => ColumnKind::Json,
            _ => ColumnKind::Text,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// payment_methods
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethodColumn {
    CustomerId,
    PaymentMethodId,
    Provider,
    MethodType,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl Column for PaymentMethodColumn {
    const TABLE: &'static str = "payment_methods";
    const ALL: &'static [Self] = &[
        Self::CustomerId,
        Self::PaymentMethodId,
        Self::Provider,
        Self::MethodType,
        Self::Status,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];
    const ID: Self = Self::PaymentMethodId;
    const STATUS: Self = Self::Status;
    const CREATED_AT: Self = Self::CreatedAt;
    const UPDATED_AT: Self = Self::UpdatedAt;

    fn as_str(self) -> &'static str {
        match self {
            Self::CustomerId => "customer_id",
            Self::PaymentMethodId => "payment_method_id",
            Self::Provider => "pm_provider",
            Self::MethodType => "method_type",
            Self::Status => "pm_status",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            Self::CreatedAt | Self::UpdatedAt => ColumnKind::Timestamp,
            _ => ColumnKind::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_columns_resolve() {
        assert_eq!(
            TransactionColumn::parse("tx_status").unwrap(),
            TransactionColumn::TxStatus
        );
        assert_eq!(
            PaymentMethodColumn::parse("customer_id").unwrap(),
            PaymentMethodColumn::CustomerId
        );
    }

    #[test]
    fn test_injected_names_rejected() {
        for name in [
            "id; DROP TABLE transactions",
            "tx_status = 'x' OR 1=1 --",
            "\"id\"",
            "ID",
            "status",
            "",
        ] {
            assert!(matches!(
                TransactionColumn::parse(name),
                Err(RepoError::InvalidColumn(_))
            ));
        }
    }

    #[test]
    fn test_payment_method_table_has_no_intent_column() {
        assert!(matches!(
            PaymentMethodColumn::parse("payment_intent_id"),
            Err(RepoError::InvalidColumn(_))
        ));
    }

    #[test]
    fn test_id_filter_must_be_uuid() {
        let err = TransactionColumn::condition(&Filter::eq("id", "not-a-uuid")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidValue { .. }));

        let id = Uuid::new_v4();
        let cond = TransactionColumn::condition(&Filter::eq("id", id.to_string())).unwrap();
        assert!(matches!(cond.value, SqlValue::Uuid(v) if v == id));
    }

    #[test]
    fn test_text_values_coerced_to_column_type() {
        let cond = TransactionColumn::condition(&Filter::eq("amount", "1000")).unwrap();
        assert!(matches!(cond.value, SqlValue::Int(1000)));

        let cond = TransactionColumn::condition(&Filter::eq("save_payment_method", "true")).unwrap();
        assert!(matches!(cond.value, SqlValue::Bool(true)));

        assert!(TransactionColumn::condition(&Filter::eq("customer_id", 7i64)).is_err());
    }

    #[test]
    fn test_metadata_not_filterable() {
        assert!(matches!(
            TransactionColumn::condition(&Filter::eq("metadata", "{}")),
            Err(RepoError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_select_list_matches_allow_list() {
        assert_eq!(
            PaymentMethodColumn::select_list(),
            "customer_id, payment_method_id, pm_provider, method_type, pm_status, created_at, updated_at"
        );
    }
}
