//! Phone number type.
//!
//! Household phone numbers are normalized to E.164 on input so that SMS
//! delivery and duplicate detection always see the same representation.
//! National numbers (leading `0`) are assumed to be Swedish.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Country calling code applied to national-format numbers.
const DEFAULT_COUNTRY_CODE: &str = "46";

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits and separators.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The number has too few or too many digits.
    #[error("phone number must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A phone number in E.164 form (`+` followed by 8 to 15 digits).
///
/// ## Examples
///
/// ```
/// use foodbank_core::PhoneNumber;
///
/// assert_eq!(PhoneNumber::parse("070-123 45 67").unwrap().as_str(), "+46701234567");
/// assert_eq!(PhoneNumber::parse("+46 70 123 45 67").unwrap().as_str(), "+46701234567");
/// assert_eq!(PhoneNumber::parse("0046701234567").unwrap().as_str(), "+46701234567");
/// assert!(PhoneNumber::parse("070-abc").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum digits after the `+`.
    pub const MIN_DIGITS: usize = 8;
    /// Maximum digits after the `+` (E.164 limit).
    pub const MAX_DIGITS: usize = 15;

    /// Parse and normalize a phone number.
    ///
    /// Spaces, dashes, dots and parentheses are ignored. A leading `00` is
    /// treated as an international prefix and a single leading `0` as a
    /// national number.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, unexpected characters, or a digit
    /// count outside 8..=15.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let (international, rest) = trimmed
            .strip_prefix('+')
            .map_or((false, trimmed), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let normalized = if international {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            rest.to_owned()
        } else if let Some(rest) = digits.strip_prefix('0') {
            format!("{DEFAULT_COUNTRY_CODE}{rest}")
        } else {
            digits
        };

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&normalized.len()) {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(format!("+{normalized}")))
    }

    /// Returns the E.164 representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_national_number_gets_country_code() {
        assert_eq!(
            PhoneNumber::parse("0701234567").unwrap().as_str(),
            "+46701234567"
        );
    }

    #[test]
    fn test_foreign_international_number_kept() {
        assert_eq!(
            PhoneNumber::parse("+47 912 34 567").unwrap().as_str(),
            "+4791234567"
        );
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(
            PhoneNumber::parse("070/1234567"),
            Err(PhoneError::InvalidCharacter('/'))
        );
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            PhoneNumber::parse("070"),
            Err(PhoneError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_empty() {
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
    }
}
