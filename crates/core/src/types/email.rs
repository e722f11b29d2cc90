//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,
    #[error("email must be at most {max} characters", max = Email::MAX_LENGTH)]
    TooLong,
    /// Anything that isn't `mailbox@host.tld` with no spaces.
    #[error("email must look like name@domain.vn")]
    Malformed,
}

/// A lowercased, trimmed email address. Login and registration both go
/// through [`Email::parse`], so `An@Lotus.VN` and `an@lotus.vn` are one account.
///
/// ```
/// use lotus_core::Email;
///
/// assert_eq!(Email::parse(" An@LotusMart.VN ").unwrap().as_str(), "an@lotusmart.vn");
/// assert!(Email::parse("an@localhost").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Normalize and validate an address.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] for blank, overlong or malformed input.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }
        let (mailbox, host) = trimmed.split_once('@').ok_or(EmailError::Malformed)?;
        let host_ok = host
            .split_once('.')
            .is_some_and(|(name, _)| !name.is_empty())
            && !host.ends_with('.')
            && !host.contains("..");
        if mailbox.is_empty()
            || !host_ok
            || host.contains('@')
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(EmailError::Malformed);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0.as_str(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_one_account_per_mailbox() {
        let email = Email::parse("  Nguyen.Van.A@Gmail.COM ").unwrap();
        assert_eq!(email.as_str(), "nguyen.van.a@gmail.com");
        assert_eq!(email, "nguyen.van.a@gmail.com".parse().unwrap());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        let long = format!("{}@lotusmart.vn", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
        for bad in [
            "khong-co-a-cong",
            "@lotusmart.vn",
            "an@",
            "an@localhost",
            "an@.vn",
            "an@lotusmart.",
            "an@lotus..vn",
            "a@b@c.vn",
            "an binh@lotusmart.vn",
        ] {
            assert_eq!(Email::parse(bad), Err(EmailError::Malformed), "{bad}");
        }
    }

    #[test]
    fn test_json_validates_and_normalizes() {
        let email: Email = serde_json::from_str("\"Thu@LotusMart.vn\"").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"thu@lotusmart.vn\"");
        assert!(serde_json::from_str::<Email>("\"thu\"").is_err());
    }
}
