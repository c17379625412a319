//! Staff authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during staff authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// A staff account with this email already exists.
    #[error("staff user already exists")]
    UserAlreadyExists,

    /// Password does not meet the minimum length.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Argon2 failed to produce a hash.
    #[error("failed to hash password")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
