use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use once_cell::sync::Lazy;

use crate::errors::{AppError, AppResult};

/// Hash checked when a login names no known account, so both failure paths
/// pay for one argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("not-a-real-account-password").ok());

pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(format!("argon2 hash: {e}")))?
        .to_string();
    Ok(hash)
}

/// A malformed stored hash never authenticates anyone.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Runs a verification that can never succeed. Always returns `false`.
pub fn verify_dummy_password(plain: &str) -> bool {
    match DUMMY_HASH.as_deref() {
        Some(hash) => {
            verify_password(plain, hash);
        }
        None => log::error!("Dummy password hash could not be generated"),
    }
    false
}
