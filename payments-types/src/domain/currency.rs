//! ISO 4217 currency code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Three-letter currency code, normalized to lowercase as providers expect.
///
/// The orchestration layer does not convert between currencies, so the code
/// is only validated for shape, not against a fixed list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "usd")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::InvalidCurrency(s.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_is_lowercased() {
        let code: CurrencyCode = "USD".parse().unwrap();
        assert_eq!(code.as_str(), "usd");
    }

    #[test]
    fn test_invalid_currency_rejected() {
        assert!(matches!(
            "US".parse::<CurrencyCode>(),
            Err(DomainError::InvalidCurrency(_))
        ));
        assert!("us1".parse::<CurrencyCode>().is_err());
        assert!("dollars".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_deserializes_from_json() {
        let code: CurrencyCode = serde_json::from_str("\"Eur\"").unwrap();
        assert_eq!(code.to_string(), "eur");
        assert!(serde_json::from_str::<CurrencyCode>("\"euro\"").is_err());
    }
}
