//! Profile, address book and admin account management.

use sqlx::PgPool;
use tracing::instrument;

use lotus_core::{AddressId, UserId};

use crate::db::{PageRequest, Paged, RepositoryError, UserRepository};
use crate::error::{AppError, Message, Result};
use crate::models::user::{
    Address, AdminUpdateUserInput, CreateAddressInput, UpdateAddressInput, UpdateProfileInput,
    User, UserFilter,
};

/// User account operations.
pub struct UserService<'a> {
    users: UserRepository<'a>,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// A user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user doesn't exist.
    pub async fn get(&self, id: UserId) -> Result<User> {
        self.users.get_by_id(id).await?.ok_or_else(user_not_found)
    }

    /// Update the caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the name is set to blank.
    #[instrument(skip(self, input))]
    pub async fn update_profile(&self, id: UserId, input: &UpdateProfileInput) -> Result<User> {
        if input.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::bad_request(
                "Full name cannot be blank",
                "Họ tên không được để trống",
            ));
        }
        let input = UpdateProfileInput {
            full_name: input.full_name.as_deref().map(|n| n.trim().to_owned()),
            phone: input.phone.as_deref().map(|p| p.trim().to_owned()),
            avatar_url: input.avatar_url.clone(),
        };
        self.users
            .update_profile(id, &input)
            .await
            .map_err(not_found_as_user)
    }

    /// Page through accounts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, filter: &UserFilter) -> Result<Paged<User>> {
        Ok(self
            .users
            .list(
                filter.search.as_deref(),
                filter.role,
                filter.is_active,
                PageRequest::new(filter.page, filter.limit),
            )
            .await?)
    }

    /// Change another account's role, status or name. Admins can't demote or
    /// deactivate themselves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a self-demotion or self-deactivation
    /// and `AppError::NotFound` for an unknown user.
    #[instrument(skip(self, input))]
    pub async fn admin_update(
        &self,
        acting_admin: UserId,
        id: UserId,
        input: &AdminUpdateUserInput,
    ) -> Result<User> {
        if id == acting_admin
            && (input.is_active == Some(false)
                || input.role.is_some_and(|role| !role.is_admin()))
        {
            return Err(AppError::bad_request(
                "You cannot demote or deactivate your own account",
                "Bạn không thể tự hạ quyền hoặc vô hiệu hóa tài khoản của mình",
            ));
        }
        if input.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::bad_request(
                "Full name cannot be blank",
                "Họ tên không được để trống",
            ));
        }

        let user = self
            .users
            .admin_update(id, input)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(user_id = %id, role = %user.role, is_active = user.is_active, "User updated by admin");
        Ok(user)
    }

    /// Delete an account that has never ordered.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when an admin targets themself,
    /// `AppError::NotFound` for an unknown user and `AppError::Conflict` if
    /// the user has orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, acting_admin: UserId, id: UserId) -> Result<()> {
        if id == acting_admin {
            return Err(AppError::bad_request(
                "You cannot delete your own account",
                "Bạn không thể xóa tài khoản của chính mình",
            ));
        }
        self.users.delete(id).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::conflict(
                "User has orders and cannot be deleted; deactivate the account instead",
                "Người dùng đã có đơn hàng nên không thể xóa, hãy vô hiệu hóa tài khoản",
            ),
            other => not_found_as_user(other),
        })?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// The caller's saved addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>> {
        Ok(self.users.list_addresses(user_id).await?)
    }

    /// Save an address. The first one becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if a required field is blank.
    #[instrument(skip(self, input))]
    pub async fn add_address(&self, user_id: UserId, input: &CreateAddressInput) -> Result<Address> {
        input.validate().map_err(required_field)?;
        Ok(self.users.create_address(user_id, input).await?)
    }

    /// Update one of the caller's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address isn't theirs and
    /// `AppError::BadRequest` if a required field is set to blank.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &UpdateAddressInput,
    ) -> Result<Address> {
        for (name, value) in [
            ("recipientName", &input.recipient_name),
            ("phone", &input.phone),
            ("street", &input.street),
            ("city", &input.city),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(required_field(name));
            }
        }
        self.users
            .update_address(user_id, id, input)
            .await
            .map_err(not_found_as_address)
    }

    /// Delete one of the caller's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address isn't theirs.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, user_id: UserId, id: AddressId) -> Result<()> {
        self.users
            .delete_address(user_id, id)
            .await
            .map_err(not_found_as_address)
    }
}

fn required_field(name: &str) -> AppError {
    AppError::BadRequest(Message::owned(
        format!("{name} is required"),
        format!("Vui lòng nhập {name}"),
    ))
}

fn not_found_as_user(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => user_not_found(),
        other => AppError::Database(other),
    }
}

fn not_found_as_address(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => {
            AppError::not_found("Address not found", "Không tìm thấy địa chỉ")
        }
        other => AppError::Database(other),
    }
}

const fn user_not_found() -> AppError {
    AppError::not_found("User not found", "Không tìm thấy người dùng")
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_required_field_message() {
        let err = required_field("city");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message().en, "city is required");
    }

    #[test]
    fn test_repository_not_found_maps_to_address() {
        let err = not_found_as_address(RepositoryError::NotFound);
        assert_eq!(err.message().en, "Address not found");
    }
}
