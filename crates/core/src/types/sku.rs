//! Stock keeping unit type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The input is shorter than the minimum length.
    #[error("SKU must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// The input is longer than the maximum length.
    #[error("SKU must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `A-Z`, `0-9`, `-` and `_`.
    #[error("SKU contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A product SKU, unique across the catalog.
///
/// SKUs are normalized to uppercase so `ip15-blk` and `IP15-BLK` collide on
/// the unique index.
///
/// ```
/// use lotus_core::Sku;
///
/// assert_eq!(Sku::parse(" ip15-blk-128 ").unwrap().as_str(), "IP15-BLK-128");
/// assert!(Sku::parse("ab").is_err());
/// assert!(Sku::parse("has space").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Minimum SKU length.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum SKU length.
    pub const MAX_LENGTH: usize = 64;

    /// Parse and normalize a SKU.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is too short, too long, or
    /// contains characters other than ASCII letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        let s = s.trim();
        if s.len() < Self::MIN_LENGTH {
            return Err(SkuError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SkuError::InvalidCharacter(c));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases() {
        assert_eq!(Sku::parse("tv-55-oled").unwrap().as_str(), "TV-55-OLED");
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert_eq!(Sku::parse("TV/55"), Err(SkuError::InvalidCharacter('/')));
        assert_eq!(Sku::parse("ÁO-01"), Err(SkuError::InvalidCharacter('Á')));
    }

    #[test]
    fn test_parse_length_bounds() {
        assert_eq!(Sku::parse(" a1 "), Err(SkuError::TooShort { min: 3 }));
        assert_eq!(
            Sku::parse(&"A".repeat(65)),
            Err(SkuError::TooLong { max: 64 })
        );
        assert!(Sku::parse(&"A".repeat(64)).is_ok());
    }
}
