//! URL slug type used by categories and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing usable was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is longer than the maximum length.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The slug contains characters outside `a-z`, `0-9` and single dashes.
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    Malformed,
}

/// Characters folded to their ASCII base letter when building slugs.
const FOLDS: &[(&str, char)] = &[
    ("àáảãạăằắẳẵặâầấẩẫậäåā", 'a'),
    ("èéẻẽẹêềếểễệëē", 'e'),
    ("ìíỉĩịïī", 'i'),
    ("òóỏõọôồốổỗộơờớởỡợöøō", 'o'),
    ("ùúủũụưừứửữựüū", 'u'),
    ("ỳýỷỹỵÿ", 'y'),
    ("đ", 'd'),
    ("ç", 'c'),
    ("ñ", 'n'),
];

fn fold(c: char) -> char {
    FOLDS
        .iter()
        .find(|(set, _)| set.contains(c))
        .map_or(c, |(_, base)| *base)
}

/// A URL-safe identifier such as `dien-thoai-thong-minh`.
///
/// ```
/// use lotus_core::Slug;
///
/// assert_eq!(Slug::from_title("Điện thoại & Máy tính bảng").unwrap().as_str(),
///            "dien-thoai-may-tinh-bang");
/// assert!(Slug::parse("Not A Slug").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Parse an already-formed slug without rewriting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not made of
    /// lowercase ASCII letters and digits separated by single dashes.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let well_formed = s
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        if !well_formed {
            return Err(SlugError::Malformed);
        }
        Ok(Self(s.to_owned()))
    }

    /// Build a slug from a human-readable title.
    ///
    /// Diacritics are folded, everything is lowercased, and every run of
    /// other characters becomes a single dash. Output longer than
    /// [`Self::MAX_LENGTH`] is cut at a dash boundary where possible.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the title has no letters or digits.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars().flat_map(char::to_lowercase).map(fold) {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            if let Some(cut) = out.rfind('-') {
                out.truncate(cut);
            }
            while out.ends_with('-') {
                out.pop();
            }
        }

        Ok(Self(out))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title_folds_vietnamese() {
        let slug = Slug::from_title("Áo Thun Nữ Cổ Tròn").unwrap();
        assert_eq!(slug.as_str(), "ao-thun-nu-co-tron");

        let slug = Slug::from_title("Đồ gia dụng").unwrap();
        assert_eq!(slug.as_str(), "do-gia-dung");
    }

    #[test]
    fn test_from_title_collapses_separators() {
        let slug = Slug::from_title("  iPhone 15 -- Pro / Max!! ").unwrap();
        assert_eq!(slug.as_str(), "iphone-15-pro-max");
    }

    #[test]
    fn test_from_title_empty() {
        assert_eq!(Slug::from_title("!!! ---"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates_on_dash() {
        let title = "word ".repeat(40);
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
        assert!(slug.as_str().split('-').all(|p| p == "word"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Slug::parse("a--b"), Err(SlugError::Malformed));
        assert_eq!(Slug::parse("-ab"), Err(SlugError::Malformed));
        assert_eq!(Slug::parse("Ab"), Err(SlugError::Malformed));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert!(Slug::parse("tai-nghe-2024").is_ok());
    }
}
