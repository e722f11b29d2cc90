//! User repository for database operations.
//!
//! Accounts and their saved addresses. Password hashes only leave this module
//! through [`UserRepository::get_password_hash`].

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, QueryBuilder};
use tracing::instrument;

use lotus_core::{AddressId, Email, UserId, UserRole};

use super::{PageRequest, Paged, RepositoryError, like_pattern};
use crate::models::user::{
    Address, AdminUpdateUserInput, CreateAddressInput, UpdateAddressInput, UpdateProfileInput,
    User,
};

const USER_COLUMNS: &str = "id, email, full_name, phone, avatar_url, role, is_active, \
                            loyalty_points, lifetime_points, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, recipient_name, phone, street, ward, district, city, \
                               country, is_default, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    full_name: String,
    phone: Option<String>,
    avatar_url: Option<String>,
    role: UserRole,
    is_active: bool,
    loyalty_points: i32,
    lifetime_points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            email,
            full_name: row.full_name,
            phone: row.phone,
            avatar_url: row.avatar_url,
            role: row.role,
            is_active: row.is_active,
            loyalty_points: row.loyalty_points,
            lifetime_points: row.lifetime_points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    recipient_name: String,
    phone: String,
    street: String,
    ward: Option<String>,
    district: Option<String>,
    city: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            recipient_name: row.recipient_name,
            phone: row.phone,
            street: row.street,
            ward: row.ward,
            district: row.district,
            city: row.city,
            country: row.country,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Password hash of a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn get_password_hash_by_id(&self, id: UserId) -> Result<String, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM shop.user WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(hash,)| hash).ok_or(RepositoryError::NotFound)
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        full_name: &str,
        phone: Option<&str>,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.user (email, password_hash, full_name, phone, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(password_hash)
        .bind(full_name)
        .bind(phone)
        .bind(role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "email"))?;

        User::try_from(row)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Update the caller's own profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfileInput,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.user SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(input.phone.as_deref())
        .bind(input.avatar_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Admin update of role, active flag or name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    #[instrument(skip(self, input))]
    pub async fn admin_update(
        &self,
        id: UserId,
        input: &AdminUpdateUserInput,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.user SET
                role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                full_name = COALESCE($4, full_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.role)
        .bind(input.is_active)
        .bind(input.full_name.as_deref().map(str::trim))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Delete a user. Orders keep the account from being removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the user has orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict("orders for this user".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Page through users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<&str>,
        role: Option<UserRole>,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<Paged<User>, RepositoryError> {
        fn push_filters<'q>(
            qb: &mut QueryBuilder<'q, sqlx::Postgres>,
            search: Option<&str>,
            role: Option<UserRole>,
            is_active: Option<bool>,
        ) {
            qb.push(" WHERE TRUE");
            if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(term);
                qb.push(" AND (email ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR full_name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR phone ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if let Some(role) = role {
                qb.push(" AND role = ").push_bind(role);
            }
            if let Some(active) = is_active {
                qb.push(" AND is_active = ").push_bind(active);
            }
        }

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM shop.user");
        push_filters(&mut count, search, role, is_active);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM shop.user"));
        push_filters(&mut qb, search, role, is_active);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<UserRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paged { items, total, page })
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// All addresses of a user, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM shop.user_address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at ASC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// One of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.user_address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Add an address. The first address always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        user_id: UserId,
        input: &CreateAddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.user_address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default_address(&mut tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO shop.user_address
                (user_id, recipient_name, phone, street, ward, district, city, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'Vietnam'), $9)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.recipient_name.trim())
        .bind(input.phone.trim())
        .bind(input.street.trim())
        .bind(input.ward.as_deref())
        .bind(input.district.as_deref())
        .bind(input.city.trim())
        .bind(input.country.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Update an address. Setting `isDefault` clears the other defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &UpdateAddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default == Some(true) {
            clear_default_address(&mut tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.user_address SET
                recipient_name = COALESCE($3, recipient_name),
                phone = COALESCE($4, phone),
                street = COALESCE($5, street),
                ward = COALESCE($6, ward),
                district = COALESCE($7, district),
                city = COALESCE($8, city),
                country = COALESCE($9, country),
                is_default = COALESCE($10, is_default),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.recipient_name.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.street.as_deref())
        .bind(input.ward.as_deref())
        .bind(input.district.as_deref())
        .bind(input.city.as_deref())
        .bind(input.country.as_deref())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete an address. If it was the default, the oldest remaining one
    /// takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(bool,)> = sqlx::query_as(
            "DELETE FROM shop.user_address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((was_default,)) = deleted else {
            return Err(RepositoryError::NotFound);
        };

        if was_default {
            sqlx::query(
                r"
                UPDATE shop.user_address SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM shop.user_address WHERE user_id = $1
                    ORDER BY created_at ASC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default_address(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shop.user_address SET is_default = FALSE, updated_at = NOW() \
         WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}
