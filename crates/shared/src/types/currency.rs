//! Currency codes.
//!
//! Groups are currency-agnostic: any three-letter alphabetic code is accepted
//! and normalized to upper case. No conversion between currencies happens.

use serde::{Deserialize, Serialize};

/// A validated three-letter currency code such as `USD` or `IDR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

/// Error returned when a currency code is not three ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid currency code: {0:?}")]
pub struct InvalidCurrencyCode(pub String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurrencyCode` unless the trimmed input is exactly three
    /// ASCII letters.
    pub fn parse(raw: &str) -> Result<Self, InvalidCurrencyCode> {
        let trimmed = raw.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidCurrencyCode(raw.to_string()))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrencyCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}
