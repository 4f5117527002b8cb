//! Repository port trait.
//!
//! One generic contract serves both stored record kinds (transactions and
//! payment methods). Column names passed in at runtime are validated by the
//! adapter against a closed allow-list for the record's table.

use chrono::{DateTime, Utc};

use crate::domain::{PaymentMethod, PaymentMethodStatus, Transaction, TxStatus};
use crate::error::RepoError;

/// A record kind with its own table and status vocabulary.
pub trait Record: Clone + Send + Sync + 'static {
    type Status: AsRef<str> + Copy + Send + Sync + 'static;

    /// Registry tag the repository for this record is stored under.
    const TAG: &'static str;
}

impl Record for Transaction {
    type Status = TxStatus;
    const TAG: &'static str = "transactions";
}

impl Record for PaymentMethod {
    type Status = PaymentMethodStatus;
    const TAG: &'static str = "payment_methods";
}

/// A value compared against a column. The adapter coerces it to the
/// column's storage type and rejects mismatches.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<Utc>> for ColumnValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<TxStatus> for ColumnValue {
    fn from(v: TxStatus) -> Self {
        Self::Text(v.as_str().to_string())
    }
}

impl From<PaymentMethodStatus> for ColumnValue {
    fn from(v: PaymentMethodStatus) -> Self {
        Self::Text(v.as_str().to_string())
    }
}

/// Equality filter `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: ColumnValue,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Persistence contract shared by every stored record kind.
#[async_trait::async_trait]
pub trait Repository<R: Record>: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts the record. Optional fields that are unset are left to the
    /// column default.
    async fn create(&self, record: &R) -> Result<(), RepoError>;

    /// Inserts the record unless one with the same identity already exists.
    /// Returns `true` when a row was written. Safe under concurrent callers.
    async fn create_if_absent(&self, record: &R) -> Result<bool, RepoError>;

    /// Sets the status of every row matching all `filters` and returns the
    /// number of rows changed. Fails with `FiltersRequired` for an empty
    /// filter list and `NoMatch` when nothing changed.
    async fn update_status(&self, status: R::Status, filters: &[Filter]) -> Result<u64, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    async fn find_by_id(&self, id: &str) -> Result<R, RepoError>;

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<R, RepoError>;

    /// Rows in `status` created at or after `since`, newest first.
    async fn find_by_status(
        &self,
        status: R::Status,
        since: DateTime<Utc>,
    ) -> Result<Vec<R>, RepoError>;

    /// Rows where `column` equals `value`, newest first.
    async fn find_by_column(&self, column: &str, value: ColumnValue) -> Result<Vec<R>, RepoError>;
}
