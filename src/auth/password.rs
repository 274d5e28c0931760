//! Password rules and bcrypt hashing.
//!
//! Hashing and verification run on the blocking pool; bcrypt is
//! deliberately slow.

use crate::error::AppError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt ignores input past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Work factor used when none is configured.
pub const DEFAULT_HASH_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// Checks password strength rules.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] if the password is too short,
/// longer than bcrypt can hash, or consists only of whitespace.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.trim().is_empty() || password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::InvalidRequest(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Hashes a password with a fresh salt at the given bcrypt cost.
///
/// # Errors
///
/// Returns [`AppError::Internal`] for an out-of-range cost or a failed
/// blocking task.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("hashing password: {e}")))
}

/// Verifies a password against a stored bcrypt hash. Malformed hashes
/// never verify.
pub async fn verify_password(password: &str, stored: &str) -> bool {
    let password = password.to_string();
    let stored = stored.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored).unwrap_or(false))
        .await
        .unwrap_or(false)
}
