//! Postal code type (Swedish five-digit format).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PostalCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PostalCodeError {
    /// The code is not exactly five digits once spaces are removed.
    #[error("postal code must be exactly 5 digits")]
    InvalidFormat,
}

/// A postal code stored as five digits without the customary space.
///
/// ```
/// use foodbank_core::PostalCode;
///
/// let code = PostalCode::parse("123 45").unwrap();
/// assert_eq!(code.as_str(), "12345");
/// assert_eq!(code.formatted(), "123 45");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Parse a postal code, ignoring whitespace.
    ///
    /// # Errors
    ///
    /// Returns `PostalCodeError::InvalidFormat` unless exactly five ASCII
    /// digits remain.
    pub fn parse(s: &str) -> Result<Self, PostalCodeError> {
        let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(digits))
        } else {
            Err(PostalCodeError::InvalidFormat)
        }
    }

    /// The five digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form with a space after the third digit.
    #[must_use]
    pub fn formatted(&self) -> String {
        let (head, tail) = self.0.split_at(3);
        format!("{head} {tail}")
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = PostalCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_length_and_letters() {
        assert!(PostalCode::parse("1234").is_err());
        assert!(PostalCode::parse("123456").is_err());
        assert!(PostalCode::parse("12a45").is_err());
    }

    #[test]
    fn test_accepts_compact_form() {
        assert_eq!(PostalCode::parse("41101").map(|c| c.formatted()), Ok("411 01".to_string()));
    }
}
