use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    users::model::User,
};

pub const MIN_PASSWORD_LEN: usize = 6;
/// Bounds the work a single login or registration can ask argon2 to do.
pub const MAX_PASSWORD_LEN: usize = 128;

pub fn check_new_password(plain: &str) -> AppResult<()> {
    let len = plain.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password cannot exceed {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Argon2 PHC string with a fresh salt.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash failed");
            anyhow::anyhow!("hash password: {e}")
        })?;
    Ok(hash.to_string())
}

/// A stored hash that cannot be parsed is an internal error, not a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        anyhow::anyhow!("parse password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Replaces the user's hash once `current` checks out.
pub fn change_password(user: &mut User, current: &str, new: &str) -> AppResult<()> {
    if current.is_empty() || new.is_empty() {
        return Err(AppError::validation(
            "Current and new password are required",
        ));
    }
    if !verify_password(current, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AppError::Unauthorized(
            "Current password is incorrect".into(),
        ));
    }
    check_new_password(new)?;
    if current == new {
        return Err(AppError::validation(
            "New password must differ from the current one",
        ));
    }
    user.password_hash = hash_password(new)?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}
