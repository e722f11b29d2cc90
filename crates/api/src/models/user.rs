//! User and address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lotus_core::{AddressId, Email, UserId, UserRole};

/// A shop account (domain type). Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[schema(value_type = i32)]
    pub id: UserId,
    #[schema(value_type = String, format = "email")]
    pub email: Email,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    /// Spendable point balance.
    pub loyalty_points: i32,
    /// All points ever earned, used for tiering.
    pub lifetime_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[schema(value_type = i32)]
    pub id: AddressId,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Self-service profile update.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// New address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressInput {
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: String,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial address update.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAddressInput {
    pub recipient_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

/// Admin update of another account.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserInput {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub full_name: Option<String>,
}

/// Admin user listing filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Matches email, name or phone.
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl CreateAddressInput {
    /// Name of the first blank required field, if any.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        for (name, value) in [
            ("recipientName", &self.recipient_name),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address_validation() {
        let input: CreateAddressInput = serde_json::from_str(
            r#"{"recipientName":"Lan","phone":"0901234567","street":"12 Lê Lợi","city":"  "}"#,
        )
        .unwrap();
        assert_eq!(input.validate(), Err("city"));
        assert!(!input.is_default);
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let user = User {
            id: UserId::new(1),
            email: Email::parse("lan@lotusmart.vn").unwrap(),
            full_name: "Nguyễn Lan".to_string(),
            phone: None,
            avatar_url: None,
            role: UserRole::Customer,
            is_active: true,
            loyalty_points: 120,
            lifetime_points: 300,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["fullName"], "Nguyễn Lan");
        assert_eq!(json["loyaltyPoints"], 120);
        assert_eq!(json["role"], "customer");
        assert!(json.get("passwordHash").is_none());
    }
}
