//! Error types for the payment orchestration service.

/// Domain-level errors (request and business-rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures and contract misuse).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Entity not found")]
    NotFound,

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid value for column {column}: {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("At least one filter is required for an update")]
    FiltersRequired,

    #[error("No rows matched the update filters")]
    NoMatch,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Errors raised by a provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected or failed the call. `code` is stable per call site.
    #[error("{reason} #{code}")]
    Rejected { code: &'static str, reason: String },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed provider payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn rejected(code: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            reason: reason.into(),
        }
    }
}

/// Application-level errors surfaced to callers.
///
/// Every variant carries a message; the HTTP adapter renders all of them as
/// client errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("At least one filter is required for an update")]
    FiltersRequired,

    #[error("No rows matched the update filters")]
    NoMatch,

    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::Validation(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::InvalidColumn(c) => AppError::InvalidColumn(c),
            RepoError::InvalidValue { .. } => AppError::Validation(err.to_string()),
            RepoError::FiltersRequired => AppError::FiltersRequired,
            RepoError::NoMatch => AppError::NoMatch,
            RepoError::Conflict(e) => AppError::Storage(format!("Conflict: {}", e)),
            RepoError::Unavailable(e) => AppError::Unavailable(e),
            RepoError::Database(e) => AppError::Storage(e),
            RepoError::Transaction(e) => AppError::Storage(e),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidSignature(e) => AppError::InvalidSignature(e),
            other => AppError::Provider(other.to_string()),
        }
    }
}
