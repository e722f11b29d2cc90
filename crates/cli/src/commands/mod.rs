//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod smoke;

use secrecy::SecretString;

/// Read `DATABASE_URL`, loading `.env` first.
///
/// # Errors
///
/// Returns an error message if the variable is not set.
pub fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| "DATABASE_URL not set")
}
